//! Convert recording use case
//!
//! Checks the preconditions of a conversion request (client configured,
//! packets selected) before any I/O, then hands a registry-backed packet
//! source to the conversion client.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tracing::debug;

use crate::domain::capture::SpeakerId;
use crate::domain::conversion::ConvertResult;
use crate::domain::multipart::{Boundary, MultipartBody};

use super::capture::SharedRegistry;
use super::cancel::CancellationToken;
use super::conversion::{close_sink, ConversionClient, ConvertError, PacketSource};
use super::ports::HttpTransport;

/// Which packets to convert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertRequest {
    /// Speakers in upload order
    pub speakers: Vec<SpeakerId>,
    /// Only packets that arrived at or after this timestamp
    pub since: Option<f64>,
}

impl ConvertRequest {
    pub fn new(speakers: Vec<SpeakerId>) -> Self {
        Self {
            speakers,
            since: None,
        }
    }

    /// Restrict the request to packets newer than `timestamp`
    pub fn since(mut self, timestamp: f64) -> Self {
        self.since = Some(timestamp);
        self
    }
}

/// Packet source that re-reads the shared registry on every attempt
struct RegistrySelection {
    registry: SharedRegistry,
    request: ConvertRequest,
}

impl PacketSource for RegistrySelection {
    fn snapshot(&self, boundary: Boundary) -> MultipartBody {
        self.registry
            .lock()
            .select(&self.request.speakers, self.request.since, boundary)
    }
}

/// Converts captured speakers' packets through the conversion service
pub struct RecordingConverter<T: HttpTransport> {
    client: Arc<ConversionClient<T>>,
    registry: SharedRegistry,
}

impl<T: HttpTransport> RecordingConverter<T> {
    pub fn new(client: Arc<ConversionClient<T>>, registry: SharedRegistry) -> Self {
        Self { client, registry }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn client(&self) -> &Arc<ConversionClient<T>> {
        &self.client
    }

    /// Convert the requested packets into `output`.
    ///
    /// Returns `Disabled` or `NoData` without touching the network when the
    /// client is not configured or nothing matches the request. The sink is
    /// closed unless `leave_open` is set, on these paths too.
    pub async fn convert<W>(
        &self,
        request: ConvertRequest,
        output: &mut W,
        leave_open: bool,
        cancel: &CancellationToken,
    ) -> Result<ConvertResult, ConvertError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let precondition = if !self.client.is_enabled() {
            Some(ConvertResult::Disabled)
        } else if self
            .registry
            .lock()
            .selected_packet_count(&request.speakers, request.since)
            == 0
        {
            Some(ConvertResult::NoData)
        } else {
            None
        };

        if let Some(result) = precondition {
            debug!(%result, speakers = request.speakers.len(), "conversion skipped");
            if !leave_open {
                close_sink(output).await;
            }
            return Ok(result);
        }

        let source = RegistrySelection {
            registry: Arc::clone(&self.registry),
            request,
        };
        self.client.convert(output, leave_open, &source, cancel).await
    }
}

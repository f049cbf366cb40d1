//! HTTP transport port interface

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use thiserror::Error;

/// Transport errors
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server could not be reached (refused, DNS, timeout)
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request failed for any other reason
    #[error("Request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether the failure happened while reaching the server
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

/// Response body delivered chunk by chunk
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Status code and streaming body of an HTTP response
pub struct HttpResponse {
    pub status: u16,
    pub body: BodyStream,
}

impl HttpResponse {
    pub fn new(status: u16, body: BodyStream) -> Self {
        Self { status, body }
    }

    /// Response with a body that is already in memory
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            body: Box::pin(stream::once(async move { Ok(body) })),
        }
    }

    /// Read the whole body into memory
    pub async fn collect(mut self) -> Result<Vec<u8>, TransportError> {
        let mut data = Vec::new();
        while let Some(chunk) = self.body.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Port for sending HTTP requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a GET request.
    ///
    /// # Returns
    /// The response for any status code; errors only when no response arrived
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;

    /// Send a POST request with the given headers and body.
    ///
    /// # Arguments
    /// * `url` - Target URL
    /// * `headers` - Header name/value pairs
    /// * `body` - Raw request body
    async fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<HttpResponse, TransportError>;
}

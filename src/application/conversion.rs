//! Remote conversion client
//!
//! Uploads captured voice packets to the conversion service and streams the
//! converted audio back into a caller-supplied sink. Owns the process-wide
//! bearer token: it is fetched on demand, reused for
//! [`TOKEN_LIFETIME`](crate::domain::conversion::TOKEN_LIFETIME) and refreshed
//! once when the service answers 401.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::domain::config::{AppConfig, Credentials};
use crate::domain::conversion::{AuthState, ConversionSession, ConvertResult, InvalidAuthTransition};
use crate::domain::multipart::{Boundary, MultipartBody};

use super::cancel::CancellationToken;
use super::ports::{BodyStream, HttpTransport};

/// Authentication requests made before giving up on an unreachable service
pub const AUTH_ATTEMPTS: usize = 3;

/// Pause between authentication attempts after a connection failure
pub const AUTH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Longest response body excerpt written to the log
const LOG_BODY_LIMIT: usize = 4096;

/// Conversion errors.
///
/// Service outcomes are reported as [`ConvertResult`]; these errors cover
/// authentication failures, cancellation and a failing output sink.
#[derive(Debug, Clone, Error)]
pub enum ConvertError {
    #[error("Conversion is disabled: base_uri, username and password must be configured")]
    Disabled,

    #[error("Authentication was rejected by the conversion service")]
    Unauthorized,

    #[error("Could not reach the conversion service: {0}")]
    Connection(String),

    #[error("Conversion was cancelled")]
    Cancelled,

    #[error("Failed to write converted audio: {0}")]
    Output(String),
}

impl ConvertError {
    /// The conversion outcome this error stands for, if it is one
    pub fn as_result(&self) -> Option<ConvertResult> {
        match self {
            Self::Disabled => Some(ConvertResult::Disabled),
            Self::Unauthorized => Some(ConvertResult::Unauthorized),
            Self::Connection(_) => Some(ConvertResult::ConnectionError),
            Self::Cancelled | Self::Output(_) => None,
        }
    }
}

impl From<InvalidAuthTransition> for ConvertError {
    fn from(err: InvalidAuthTransition) -> Self {
        warn!(error = %err, "authentication state out of sync");
        Self::Unauthorized
    }
}

/// Produces the multipart body for one upload attempt.
///
/// Called again on every attempt so packets that arrived in the meantime
/// are included. Implementations must copy the packet bytes: the body is
/// uploaded after the source may have changed.
pub trait PacketSource: Send + Sync {
    fn snapshot(&self, boundary: Boundary) -> MultipartBody;
}

impl<F> PacketSource for F
where
    F: Fn(Boundary) -> MultipartBody + Send + Sync,
{
    fn snapshot(&self, boundary: Boundary) -> MultipartBody {
        self(boundary)
    }
}

/// Client for the remote conversion service
pub struct ConversionClient<T: HttpTransport> {
    transport: T,
    credentials: Option<Credentials>,
    /// Held for the whole authentication round trip so concurrent
    /// conversions share one token request.
    session: tokio::sync::Mutex<ConversionSession>,
    rng: Mutex<StdRng>,
}

impl<T: HttpTransport> ConversionClient<T> {
    /// Create a client. Without credentials every conversion is `Disabled`.
    pub fn new(transport: T, credentials: Option<Credentials>) -> Self {
        Self {
            transport,
            credentials,
            session: tokio::sync::Mutex::new(ConversionSession::new()),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Create a client from configuration
    pub fn from_config(transport: T, config: &AppConfig) -> Self {
        let credentials = config.credentials();
        if credentials.is_none() {
            info!("conversion service not configured; conversions are disabled");
        }
        Self::new(transport, credentials)
    }

    /// Use `rng` for boundary generation
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current authentication state
    pub async fn auth_state(&self) -> AuthState {
        self.session.lock().await.state().clone()
    }

    /// Fetch and store a new bearer token.
    ///
    /// Connection failures are retried up to [`AUTH_ATTEMPTS`] times with
    /// [`AUTH_RETRY_DELAY`] in between; any other failure is final.
    pub async fn authenticate(&self, cancel: &CancellationToken) -> Result<(), ConvertError> {
        let credentials = self.credentials.as_ref().ok_or(ConvertError::Disabled)?;
        let mut session = self.session.lock().await;
        self.authenticate_locked(&mut session, credentials, cancel)
            .await
            .map(drop)
    }

    /// Upload the packets from `packets` and stream the converted audio into
    /// `output`.
    ///
    /// Unless `leave_open` is set, `output` is flushed and shut down on every
    /// exit path. Returns `Err` only on cancellation or when writing to
    /// `output` fails.
    pub async fn convert<W, S>(
        &self,
        output: &mut W,
        leave_open: bool,
        packets: &S,
        cancel: &CancellationToken,
    ) -> Result<ConvertResult, ConvertError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
        S: PacketSource + ?Sized,
    {
        let result = self.convert_inner(output, packets, cancel).await;
        if !leave_open {
            close_sink(output).await;
        }
        result
    }

    async fn convert_inner<W, S>(
        &self,
        output: &mut W,
        packets: &S,
        cancel: &CancellationToken,
    ) -> Result<ConvertResult, ConvertError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
        S: PacketSource + ?Sized,
    {
        let Some(credentials) = self.credentials.as_ref() else {
            return Ok(ConvertResult::Disabled);
        };
        let url = decoder_url(credentials);
        let mut rejected = false;

        loop {
            let token = match self.current_token(credentials, cancel).await {
                Ok(token) => token,
                Err(err) => return err.as_result().ok_or(err),
            };

            let boundary = Boundary::generate(&mut *self.rng.lock());
            let body = packets.snapshot(boundary);
            if body.is_empty() {
                debug!("selection emptied before upload");
                return Ok(ConvertResult::NoData);
            }
            let content_type = body.content_type();
            debug!(packets = body.packet_count(), bytes = body.len(), "uploading voice packets");

            let headers = [
                ("Authorization", token.as_str()),
                ("Content-Type", content_type.as_str()),
            ];
            let sent = cancel
                .run_until_cancelled(self.transport.post(&url, &headers, body.into_bytes()))
                .await
                .ok_or(ConvertError::Cancelled)?;

            let response = match sent {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, "conversion upload failed");
                    return Ok(ConvertResult::ConnectionError);
                }
            };

            match response.status {
                200 => {
                    return match stream_into(response.body, output, cancel).await {
                        Ok(written) => {
                            debug!(bytes = written, "conversion succeeded");
                            Ok(ConvertResult::Success)
                        }
                        Err(ConvertError::Connection(reason)) => {
                            warn!(%reason, "conversion response interrupted");
                            Ok(ConvertResult::ConnectionError)
                        }
                        Err(err) => Err(err),
                    };
                }
                400 => {
                    let excerpt = body_excerpt(response.body, cancel).await?;
                    warn!(body = %excerpt, "conversion service rejected the packet format");
                    return Ok(ConvertResult::InvalidFormat);
                }
                401 => {
                    self.session.lock().await.invalidate(&token);
                    if rejected {
                        warn!("conversion service rejected a freshly issued token");
                        return Ok(ConvertResult::Unauthorized);
                    }
                    debug!("bearer token rejected; re-authenticating");
                    rejected = true;
                }
                status => {
                    let excerpt = body_excerpt(response.body, cancel).await?;
                    warn!(status, body = %excerpt, "unexpected conversion response");
                    return Ok(ConvertResult::UnknownError);
                }
            }
        }
    }

    /// The held token, authenticating first when it is missing or expired
    async fn current_token(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<String, ConvertError> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.valid_token(Instant::now()) {
            return Ok(token.to_string());
        }
        self.authenticate_locked(&mut session, credentials, cancel).await
    }

    async fn authenticate_locked(
        &self,
        session: &mut ConversionSession,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<String, ConvertError> {
        let attempt = AuthAttempt::begin(session)?;
        let token = self.request_token(credentials, cancel).await?;
        attempt.complete(token.clone())?;
        info!("obtained bearer token from conversion service");
        Ok(token)
    }

    async fn request_token(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<String, ConvertError> {
        let url = authentication_url(credentials);
        let mut last_error = String::new();

        for attempt in 1..=AUTH_ATTEMPTS {
            debug!(attempt, "requesting bearer token");
            let sent = cancel
                .run_until_cancelled(self.transport.get(&url))
                .await
                .ok_or(ConvertError::Cancelled)?;

            let response = match sent {
                Ok(response) => response,
                Err(err) if err.is_connect() => {
                    warn!(attempt, error = %err, "authentication endpoint unreachable");
                    last_error = err.to_string();
                    if attempt < AUTH_ATTEMPTS {
                        cancel
                            .run_until_cancelled(tokio::time::sleep(AUTH_RETRY_DELAY))
                            .await
                            .ok_or(ConvertError::Cancelled)?;
                    }
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "authentication request failed");
                    return Err(ConvertError::Unauthorized);
                }
            };

            if !(200..300).contains(&response.status) {
                warn!(status = response.status, "authentication rejected");
                return Err(ConvertError::Unauthorized);
            }

            let body = cancel
                .run_until_cancelled(response.collect())
                .await
                .ok_or(ConvertError::Cancelled)?
                .map_err(|err| {
                    warn!(error = %err, "failed to read authentication response");
                    ConvertError::Unauthorized
                })?;

            return parse_token(&body).ok_or_else(|| {
                warn!("authentication response did not contain a token");
                ConvertError::Unauthorized
            });
        }

        Err(ConvertError::Connection(last_error))
    }
}

/// Marks the session as authenticating until completed.
///
/// Dropping it without completing (error, cancellation, or the future being
/// dropped) puts the session back to unauthenticated.
struct AuthAttempt<'a> {
    session: &'a mut ConversionSession,
}

impl<'a> AuthAttempt<'a> {
    fn begin(session: &'a mut ConversionSession) -> Result<Self, InvalidAuthTransition> {
        session.begin_authentication()?;
        Ok(Self { session })
    }

    fn complete(self, token: String) -> Result<(), InvalidAuthTransition> {
        self.session.complete_authentication(token, Instant::now())
    }
}

impl Drop for AuthAttempt<'_> {
    fn drop(&mut self) {
        self.session.abort_authentication();
    }
}

fn authentication_url(credentials: &Credentials) -> String {
    format!(
        "{}/authentication?username={}&key={}",
        credentials.base_uri,
        urlencoding::encode(&credentials.username),
        urlencoding::encode(&credentials.password)
    )
}

fn decoder_url(credentials: &Credentials) -> String {
    format!("{}/decoder/form", credentials.base_uri)
}

/// Turn an authentication response into an `Authorization` header value.
///
/// The body is either the raw token or a JSON object with a `token`
/// property (matched case-insensitively).
fn parse_token(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?.trim();
    let token = if text.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        value
            .as_object()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("token"))?
            .1
            .as_str()?
            .trim()
            .to_string()
    } else {
        text.to_string()
    };

    (!token.is_empty()).then(|| format!("Bearer {token}"))
}

/// Copy a response body into `output`, returning the number of bytes written
async fn stream_into<W>(
    mut body: BodyStream,
    output: &mut W,
    cancel: &CancellationToken,
) -> Result<u64, ConvertError>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let mut written = 0u64;
    loop {
        let next = cancel
            .run_until_cancelled(body.next())
            .await
            .ok_or(ConvertError::Cancelled)?;
        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(err)) => return Err(ConvertError::Connection(err.to_string())),
            None => return Ok(written),
        };
        cancel
            .run_until_cancelled(output.write_all(&chunk))
            .await
            .ok_or(ConvertError::Cancelled)?
            .map_err(|err| ConvertError::Output(err.to_string()))?;
        written += chunk.len() as u64;
    }
}

/// Read up to [`LOG_BODY_LIMIT`] bytes of a body for diagnostics
async fn body_excerpt(mut body: BodyStream, cancel: &CancellationToken) -> Result<String, ConvertError> {
    let mut data = Vec::new();
    while data.len() < LOG_BODY_LIMIT {
        let next = cancel
            .run_until_cancelled(body.next())
            .await
            .ok_or(ConvertError::Cancelled)?;
        match next {
            Some(Ok(chunk)) => data.extend_from_slice(&chunk),
            Some(Err(_)) | None => break,
        }
    }
    data.truncate(LOG_BODY_LIMIT);
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Flush and shut down a sink, logging failures
pub(crate) async fn close_sink<W>(output: &mut W)
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    if let Err(err) = output.flush().await {
        debug!(error = %err, "failed to flush output");
    }
    if let Err(err) = output.shutdown().await {
        debug!(error = %err, "failed to close output");
    }
}

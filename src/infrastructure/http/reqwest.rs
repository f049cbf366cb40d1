//! reqwest HTTP transport adapter

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::application::ports::{HttpResponse, HttpTransport, TransportError};

/// Default timeout for establishing a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with default settings
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(map_error)?;
        Ok(Self { client })
    }

    /// Create a transport around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn into_response(response: reqwest::Response) -> HttpResponse {
        let status = response.status().as_u16();
        let body = response.bytes_stream().map(|chunk| chunk.map_err(map_error));
        HttpResponse::new(status, Box::pin(body))
    }
}

/// Connection-level failures are reported separately so callers can retry them
fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() || err.is_timeout() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(map_error)?;
        Ok(Self::into_response(response))
    }

    async fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<HttpResponse, TransportError> {
        let request = headers
            .iter()
            .fold(self.client.post(url), |request, (name, value)| {
                request.header(*name, *value)
            });

        let response = request.body(body).send().await.map_err(map_error)?;
        Ok(Self::into_response(response))
    }
}

//! Batch transport.
//!
//! The server is polled with a POST carrying an opaque JSON acknowledgment;
//! the response body is the next batch. The caller decides when to poll —
//! transport itself holds no scheduling state.

use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8585";
/// Opaque acknowledgment payload sent with every poll.
pub const ACK_PAYLOAD: &str = "{}";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One request/response exchange with the simulation process. Futures need
/// not be `Send`: the whole client runs on a single cooperative thread.
pub trait BatchSource {
    fn fetch(
        &self,
        ack: &str,
    ) -> impl std::future::Future<Output = Result<String, TransportError>>;
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl BatchSource for HttpSource {
    async fn fetch(&self, ack: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(ack.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

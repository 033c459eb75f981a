//! HTTP adapter for the media fetch port.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::MediaFetchPort;

/// Fetches remote media over HTTPS with reqwest.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    /// Creates a fetcher with the given request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::DownloadFailed(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetchPort for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> MediaResult<Bytes> {
        debug!(url = %url, "Downloading media from network");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::DownloadFailed(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MediaError::DownloadFailed(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| MediaError::DownloadFailed(format!("Failed to read body: {e}")))
    }
}

//! Media fetch port definition.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::MediaResult;

/// Port for fetching remote media bytes.
///
/// The file cache is the only caller; it guarantees at most one in-flight
/// fetch per URL, so implementations do not need their own deduplication.
#[async_trait]
pub trait MediaFetchPort: Send + Sync {
    /// Downloads the full byte stream for a remote URL.
    async fn fetch(&self, url: &str) -> MediaResult<Bytes>;
}

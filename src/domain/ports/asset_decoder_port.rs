//! Asset decoder port definition.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::MediaResult;

/// An in-memory media object ready for playback.
///
/// Expensive to construct, safe to share read-only across every engine
/// currently playing the same content. Disposal happens when the last
/// `Arc` is dropped by the registry.
pub trait DecodedMedia: Send + Sync + std::fmt::Debug {
    /// The local file this object was decoded from.
    fn source_path(&self) -> &Path;

    /// Size of the backing file in bytes.
    fn byte_len(&self) -> u64;
}

/// Port for turning a local file into a decoded media object.
#[async_trait]
pub trait AssetDecoderPort: Send + Sync {
    /// Parses and initializes a media object from a local file.
    async fn build(&self, path: &Path) -> MediaResult<Arc<dyn DecodedMedia>>;
}

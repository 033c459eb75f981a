//! Error taxonomy for the media subsystem.

/// Result type for media operations.
pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// Errors that can occur while acquiring playback resources.
///
/// None of these should ever escalate past the owning cell: download and
/// build failures degrade to "show thumbnail, no video", and `Cancelled`
/// is ordinary control flow during fast scrolling.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MediaError {
    /// Network or filesystem failure while fetching remote content.
    #[error("download failed: {0}")]
    DownloadFailed(String),
    /// The local file is present but could not be parsed as media.
    #[error("asset build failed: {0}")]
    AssetBuildFailed(String),
    /// No playback engine available and none could be created.
    #[error("player pool exhausted")]
    PoolExhausted,
    /// The acquisition was abandoned because its cell left the viewport.
    #[error("acquisition cancelled")]
    Cancelled,
    /// I/O error in cache bookkeeping.
    #[error("io error: {0}")]
    Io(String),
}

impl MediaError {
    /// True for the one variant that is normal control flow, not a fault.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

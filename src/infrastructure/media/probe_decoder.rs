//! File-probing adapter for the asset decoder port.
//!
//! The real rendering engine is platform-supplied by the embedding app;
//! this adapter performs the portable half of asset construction: it
//! validates the downloaded file and sniffs its container so broken
//! payloads fail here, at `AssetBuildFailed`, instead of inside a native
//! player.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::{AssetDecoderPort, DecodedMedia};

/// Container format detected from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// ISO base media (`ftyp` box).
    Mp4,
    /// EBML header (WebM/Matroska).
    WebM,
    /// Anything else; the native engine may still accept it.
    Unknown,
}

/// A probed, playback-ready media file.
#[derive(Debug)]
pub struct ProbedMedia {
    path: PathBuf,
    len: u64,
    container: Container,
}

impl ProbedMedia {
    /// Detected container format.
    #[must_use]
    pub const fn container(&self) -> Container {
        self.container
    }
}

impl DecodedMedia for ProbedMedia {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn byte_len(&self) -> u64 {
        self.len
    }
}

/// Builds [`ProbedMedia`] objects by reading file headers off the async
/// runtime's blocking pool.
#[derive(Debug, Default, Clone)]
pub struct FileProbeDecoder;

impl FileProbeDecoder {
    /// Creates a probe decoder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn sniff_container(header: &[u8]) -> Container {
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        Container::Mp4
    } else if header.len() >= 4 && header[..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        Container::WebM
    } else {
        Container::Unknown
    }
}

#[async_trait]
impl AssetDecoderPort for FileProbeDecoder {
    async fn build(&self, path: &Path) -> MediaResult<Arc<dyn DecodedMedia>> {
        let path = path.to_path_buf();

        let probed = tokio::task::spawn_blocking(move || -> MediaResult<ProbedMedia> {
            let meta = std::fs::metadata(&path)
                .map_err(|e| MediaError::AssetBuildFailed(format!("Cannot stat media: {e}")))?;
            if meta.len() == 0 {
                return Err(MediaError::AssetBuildFailed("empty media file".into()));
            }

            let mut file = std::fs::File::open(&path)
                .map_err(|e| MediaError::AssetBuildFailed(format!("Cannot open media: {e}")))?;
            let mut header = [0u8; 12];
            let read = file
                .read(&mut header)
                .map_err(|e| MediaError::AssetBuildFailed(format!("Cannot read media: {e}")))?;

            Ok(ProbedMedia {
                container: sniff_container(&header[..read]),
                len: meta.len(),
                path,
            })
        })
        .await
        .map_err(|e| MediaError::AssetBuildFailed(format!("Probe task panicked: {e}")))??;

        debug!(
            path = %probed.path.display(),
            len = probed.len,
            container = ?probed.container,
            "Probed media file"
        );
        Ok(Arc::new(probed))
    }
}

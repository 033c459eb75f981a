//! Identity and playback context for feed cells.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identity of one video cell in the UI.
///
/// A cell keeps its identity while it is recycled for different content,
/// which is exactly the situation the activation glue must guard against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(uuid::Uuid);

impl CellId {
    /// Creates a fresh cell identity.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of screen requesting playback.
///
/// Collapses per-screen behavior (feed card, masonry grid, full-screen
/// pager, detail view) into a small configuration: whether playback is
/// muted by default, how many neighbors to preload, and how long the
/// thumbnail cross-fade waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackContext {
    /// Background playback in a feed card or grid tile. Always muted.
    Ambient,
    /// Full-screen, single-video-at-a-time playback. Unmuted.
    Immersive,
}

impl PlaybackContext {
    /// Whether sessions in this context start (and stay) muted.
    #[must_use]
    pub const fn muted(self) -> bool {
        matches!(self, Self::Ambient)
    }

    /// How many neighboring cells to pre-activate around the focused one.
    #[must_use]
    pub const fn preload_radius(self) -> usize {
        match self {
            Self::Ambient => 0,
            Self::Immersive => 1,
        }
    }

    /// Delay before cross-fading from the thumbnail to live video.
    #[must_use]
    pub const fn crossfade_delay(self) -> Duration {
        match self {
            Self::Ambient => Duration::from_millis(200),
            Self::Immersive => Duration::from_millis(100),
        }
    }
}

/// Observable playback state of one cell, published over a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellPlayback {
    /// No session and no acquisition in flight.
    #[default]
    Idle,
    /// Resources are being acquired; the thumbnail stays visible.
    Acquiring,
    /// A session is live and the cell renders video.
    Playing,
    /// Acquisition failed; the thumbnail stays up with no retry loop.
    Failed,
}

impl CellPlayback {
    /// Whether the cell currently has work in flight or on screen.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Playing)
    }
}

impl std::fmt::Display for CellPlayback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Acquiring => write!(f, "Acquiring"),
            Self::Playing => write!(f, "Playing"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_cell_ids_are_unique() {
        assert_ne!(CellId::new(), CellId::new());
    }

    #[test_case(PlaybackContext::Ambient, true; "ambient is muted")]
    #[test_case(PlaybackContext::Immersive, false; "immersive is unmuted")]
    fn test_context_mute_policy(ctx: PlaybackContext, expected: bool) {
        assert_eq!(ctx.muted(), expected);
    }

    #[test]
    fn test_immersive_preloads_neighbors() {
        assert_eq!(PlaybackContext::Immersive.preload_radius(), 1);
        assert_eq!(PlaybackContext::Ambient.preload_radius(), 0);
    }

    #[test]
    fn test_playback_activity() {
        assert!(CellPlayback::Acquiring.is_active());
        assert!(CellPlayback::Playing.is_active());
        assert!(!CellPlayback::Idle.is_active());
        assert!(!CellPlayback::Failed.is_active());
    }
}

//! Reelkit - media cache and player pool for short-video feeds.
//!
//! This crate provides the playback core behind a scrolling video feed:
//! a single-flight disk cache for remote media, a reference-counted
//! registry of decoded assets, a bounded pool of reusable playback
//! engines, and the activation glue that wires them to visible cells.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing playback services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for caching and fetching.
pub mod infrastructure;

pub use application::services::{LoopSession, PlaybackService};
pub use domain::entities::{CellId, CellPlayback, MediaId, PlaybackContext};
pub use domain::errors::{MediaError, MediaResult};
pub use infrastructure::MediaConfig;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "reelkit";

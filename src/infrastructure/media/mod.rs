//! Media infrastructure.
//!
//! This module provides:
//! - Disk caching of remote media with single-flight downloads
//! - A reference-counted registry of shared decoded assets
//! - A bounded pool of reusable playback engines
//! - HTTP fetch and file-probe adapters for the domain ports

pub mod asset_registry;
pub mod file_cache;
pub mod http_fetcher;
pub mod player_pool;
pub mod probe_decoder;

pub use asset_registry::{AssetHandle, AssetRegistry};
pub use file_cache::{DownloadState, MediaFileCache};
pub use http_fetcher::HttpMediaFetcher;
pub use player_pool::{EngineLease, PlayerPool, PoolStats};
pub use probe_decoder::{Container, FileProbeDecoder, ProbedMedia};

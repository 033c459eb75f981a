//! Infrastructure layer with cache, pool, and fetch adapters.

/// Subsystem configuration.
pub mod config;
/// Media cache, asset registry, player pool, and adapters.
pub mod media;

pub use config::MediaConfig;
pub use media::{
    AssetHandle, AssetRegistry, EngineLease, FileProbeDecoder, HttpMediaFetcher, MediaFileCache,
    PlayerPool, PoolStats,
};

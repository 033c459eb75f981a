//! Subsystem configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "reelkit";
const APP_QUALIFIER: &str = "io";
const APP_ORGANIZATION: &str = "reelkit";

/// Default maximum disk cache size in bytes (500 MB).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 500 * 1024 * 1024;

/// Configuration for the media subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Maximum number of live playback engines.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// How many neighboring cells to pre-fetch around the focused one in
    /// an immersive pager.
    #[serde(default = "default_preload_radius")]
    pub preload_radius: usize,

    /// How long a decoded asset at refcount zero survives before disposal,
    /// in milliseconds. Absorbs visibility flapping during fast scroll.
    #[serde(default = "default_release_grace_ms")]
    pub release_grace_ms: u64,

    /// Delay before re-asserting mute on ambient sessions, in milliseconds.
    /// Some engines reset mute state once content begins buffering.
    #[serde(default = "default_mute_reassert_ms")]
    pub mute_reassert_delay_ms: u64,

    /// Media cache directory. Defaults to the platform cache location.
    #[serde(skip)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum disk cache size in bytes.
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_pool_capacity() -> usize {
    3
}

const fn default_preload_radius() -> usize {
    1
}

const fn default_release_grace_ms() -> u64 {
    250
}

const fn default_mute_reassert_ms() -> u64 {
    500
}

const fn default_max_cache_size() -> u64 {
    DEFAULT_MAX_CACHE_SIZE
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            pool_capacity: default_pool_capacity(),
            preload_radius: default_preload_radius(),
            release_grace_ms: default_release_grace_ms(),
            mute_reassert_delay_ms: default_mute_reassert_ms(),
            cache_dir: None,
            max_cache_size: default_max_cache_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MediaConfig {
    /// Resolves the cache directory, falling back to the platform default.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Grace period before disposing an unreferenced decoded asset.
    #[must_use]
    pub const fn release_grace(&self) -> Duration {
        Duration::from_millis(self.release_grace_ms)
    }

    /// Delay before the defensive mute re-assertion.
    #[must_use]
    pub const fn mute_reassert_delay(&self) -> Duration {
        Duration::from_millis(self.mute_reassert_delay_ms)
    }
}

/// Returns the default media cache directory path.
fn default_cache_dir() -> PathBuf {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
        || std::env::temp_dir().join(APP_NAME).join("cache").join("media"),
        |dirs| dirs.cache_dir().join("media"),
    )
}

//! Reference-counted registry of shared decoded media objects.
//!
//! Turns a local file path into a shared decoded-media handle, amortizing
//! the parse/initialization cost across every concurrent viewer of the
//! same content. Construction is single-flight per path; disposal waits
//! for a short grace period so a cell flapping in and out of view during
//! fast scroll does not rebuild the asset.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, trace, warn};

use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::{AssetDecoderPort, DecodedMedia};

/// One consumer's reference to a shared decoded asset. Must be given back
/// via [`AssetRegistry::release`] when the consumer stops displaying the
/// content.
pub struct AssetHandle {
    path: PathBuf,
    media: Arc<dyn DecodedMedia>,
}

impl AssetHandle {
    /// The local file this asset was decoded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The shared decoded media object.
    #[must_use]
    pub fn media(&self) -> Arc<dyn DecodedMedia> {
        self.media.clone()
    }
}

impl std::fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

enum AssetEntry {
    Building {
        tx: broadcast::Sender<MediaResult<Arc<dyn DecodedMedia>>>,
    },
    Live {
        media: Arc<dyn DecodedMedia>,
        refcount: usize,
        // Bumped on every acquire so a stale grace-period reap can tell
        // the entry has been touched since it was scheduled.
        epoch: u64,
    },
}

type EntryMap = Arc<Mutex<HashMap<PathBuf, AssetEntry>>>;

/// Registry of decoded media objects keyed by local file path.
pub struct AssetRegistry {
    decoder: Arc<dyn AssetDecoderPort>,
    grace: Duration,
    entries: EntryMap,
}

impl AssetRegistry {
    /// Creates a registry that builds assets with the given decoder and
    /// holds unreferenced assets for `grace` before disposing them.
    #[must_use]
    pub fn new(decoder: Arc<dyn AssetDecoderPort>, grace: Duration) -> Self {
        Self {
            decoder,
            grace,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns a handle to the shared asset for `path`, building it if no
    /// other consumer holds one. Concurrent acquires for the same path
    /// construct exactly one decoded object.
    ///
    /// # Errors
    /// Returns `AssetBuildFailed` if the file cannot be parsed as media.
    pub async fn acquire(&self, path: &Path) -> MediaResult<AssetHandle> {
        let mut rx = {
            let mut entries = self.entries.lock().await;
            match entries.get_mut(path) {
                Some(AssetEntry::Live {
                    media,
                    refcount,
                    epoch,
                }) => {
                    *refcount += 1;
                    *epoch += 1;
                    trace!(path = %path.display(), refcount, "Asset registry hit");
                    return Ok(AssetHandle {
                        path: path.to_path_buf(),
                        media: media.clone(),
                    });
                }
                Some(AssetEntry::Building { tx }) => {
                    trace!(path = %path.display(), "Joining in-flight asset build");
                    tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    entries.insert(path.to_path_buf(), AssetEntry::Building { tx: tx.clone() });
                    debug!(path = %path.display(), "Building decoded asset");
                    tokio::spawn(run_build(
                        self.entries.clone(),
                        self.decoder.clone(),
                        path.to_path_buf(),
                        tx,
                        self.grace,
                    ));
                    rx
                }
            }
        };

        let media = match rx.recv().await {
            Ok(outcome) => outcome?,
            Err(_) => {
                return Err(MediaError::AssetBuildFailed(
                    "build task dropped without a result".into(),
                ));
            }
        };

        let mut entries = self.entries.lock().await;
        match entries.get_mut(path) {
            Some(AssetEntry::Live {
                refcount, epoch, ..
            }) => {
                *refcount += 1;
                *epoch += 1;
            }
            // The grace reap won the race against this waiter; the Arc we
            // already received stays valid, so revive the entry from it.
            _ => {
                entries.insert(
                    path.to_path_buf(),
                    AssetEntry::Live {
                        media: media.clone(),
                        refcount: 1,
                        epoch: 0,
                    },
                );
            }
        }

        Ok(AssetHandle {
            path: path.to_path_buf(),
            media,
        })
    }

    /// Gives back one reference. When the count reaches zero the asset is
    /// disposed, after the grace period if one is configured.
    pub async fn release(&self, handle: AssetHandle) {
        let AssetHandle { path, media } = handle;
        let mut entries = self.entries.lock().await;
        if let Some(AssetEntry::Live {
            refcount, epoch, ..
        }) = entries.get_mut(&path)
        {
            *refcount = refcount.saturating_sub(1);
            trace!(path = %path.display(), refcount, "Asset reference released");
            if *refcount == 0 {
                if self.grace.is_zero() {
                    entries.remove(&path);
                    debug!(path = %path.display(), "Disposed decoded asset");
                } else {
                    tokio::spawn(reap_after_grace(
                        self.entries.clone(),
                        path,
                        *epoch,
                        self.grace,
                    ));
                }
            }
        }
        drop(media);
    }

    /// Current reference count for a path (zero if not registered).
    pub async fn refcount(&self, path: &Path) -> usize {
        let entries = self.entries.lock().await;
        match entries.get(path) {
            Some(AssetEntry::Live { refcount, .. }) => *refcount,
            _ => 0,
        }
    }

    /// Number of registered assets, including those in their grace period.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if no assets are registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetRegistry")
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

async fn run_build(
    entries: EntryMap,
    decoder: Arc<dyn AssetDecoderPort>,
    path: PathBuf,
    tx: broadcast::Sender<MediaResult<Arc<dyn DecodedMedia>>>,
    grace: Duration,
) {
    let result = decoder.build(&path).await;

    {
        let mut map = entries.lock().await;
        match &result {
            Ok(media) => {
                map.insert(
                    path.clone(),
                    AssetEntry::Live {
                        media: media.clone(),
                        refcount: 0,
                        epoch: 0,
                    },
                );
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Asset build failed");
                map.remove(&path);
            }
        }
    }

    let settled_ok = result.is_ok();
    let _ = tx.send(result);

    // If every waiter was cancelled before claiming its reference, the
    // entry would linger at refcount zero; sweep it like a release would.
    if settled_ok {
        tokio::spawn(reap_after_grace(entries, path, 0, grace));
    }
}

async fn reap_after_grace(entries: EntryMap, path: PathBuf, epoch_snapshot: u64, grace: Duration) {
    tokio::time::sleep(grace).await;
    let mut map = entries.lock().await;
    if let Some(AssetEntry::Live {
        refcount: 0, epoch, ..
    }) = map.get(&path)
        && *epoch == epoch_snapshot
    {
        map.remove(&path);
        debug!(path = %path.display(), "Disposed decoded asset after grace period");
    }
}

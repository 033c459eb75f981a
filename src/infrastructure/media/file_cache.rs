//! Disk-backed media file cache with single-flight downloads.
//!
//! Maps a remote URL to a persisted local file, downloading at most once
//! per URL regardless of how many cells request it concurrently. All
//! callers for an in-flight URL join the same download and receive the
//! same result. Failed entries are retried on the next request.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, trace, warn};

use crate::domain::entities::MediaId;
use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::MediaFetchPort;

/// File extension for cached media payloads.
const CACHE_EXT: &str = "media";

/// Download state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    /// A download task is in flight; callers join it.
    Downloading,
    /// The file is fully persisted on disk.
    Ready,
    /// The last download attempt failed; the next request retries.
    Failed,
}

enum Entry {
    Downloading {
        tx: broadcast::Sender<MediaResult<PathBuf>>,
    },
    Ready {
        path: PathBuf,
        size: u64,
        last_access: SystemTime,
        pins: u32,
    },
    Failed,
}

struct CacheState {
    cache_dir: PathBuf,
    max_size: u64,
    fetcher: Arc<dyn MediaFetchPort>,
    entries: Mutex<HashMap<MediaId, Entry>>,
    current_size: AtomicU64,
    item_count: AtomicUsize,
}

/// Disk cache mapping remote URLs to local media files.
pub struct MediaFileCache {
    state: Arc<CacheState>,
}

impl MediaFileCache {
    /// Creates a cache in the given directory, rescanning any files left
    /// over from a previous run.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created or read.
    pub async fn new(
        cache_dir: PathBuf,
        max_size: u64,
        fetcher: Arc<dyn MediaFetchPort>,
    ) -> MediaResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| MediaError::Io(format!("Failed to create cache dir: {e}")))?;

        let mut entries = HashMap::new();
        let mut total_size = 0u64;

        let mut dir = fs::read_dir(&cache_dir)
            .await
            .map_err(|e| MediaError::Io(format!("Failed to read cache dir: {e}")))?;

        while let Ok(Some(file)) = dir.next_entry().await {
            let path = file.path();
            if path.extension().is_none_or(|ext| ext != CACHE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(meta) = file.metadata().await {
                let last_access = meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH);
                total_size += meta.len();
                entries.insert(
                    MediaId::new(stem),
                    Entry::Ready {
                        path,
                        size: meta.len(),
                        last_access,
                        pins: 0,
                    },
                );
            }
        }

        let count = entries.len();
        debug!(count, total_size, "Media cache rescanned");

        let cache = Self {
            state: Arc::new(CacheState {
                cache_dir,
                max_size,
                fetcher,
                entries: Mutex::new(entries),
                current_size: AtomicU64::new(total_size),
                item_count: AtomicUsize::new(count),
            }),
        };

        cache.state.cleanup_if_needed().await;

        Ok(cache)
    }

    /// Returns a path to a local, fully-downloaded copy of `url`.
    ///
    /// A ready entry returns immediately. If a download is already in
    /// flight for the URL, this call joins it and receives its result,
    /// success or failure. Otherwise a new download starts.
    ///
    /// # Errors
    /// Returns `DownloadFailed` if the transfer or the file write fails.
    pub async fn local_file(&self, url: &str) -> MediaResult<PathBuf> {
        Self::resolve(self.state.clone(), url.to_string()).await
    }

    /// Warms the cache for a URL without waiting for the result. Used by
    /// the preload radius in immersive pagers.
    pub fn prefetch(&self, url: &str) {
        let state = self.state.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = Self::resolve(state, url.clone()).await {
                debug!(url = %url, error = %e, "Prefetch failed");
            }
        });
    }

    async fn resolve(state: Arc<CacheState>, url: String) -> MediaResult<PathBuf> {
        let id = MediaId::from_url(&url);

        let mut rx = {
            let mut entries = state.entries.lock().await;
            match entries.get_mut(&id) {
                Some(Entry::Ready {
                    path, last_access, ..
                }) => {
                    *last_access = SystemTime::now();
                    trace!(id = %id, "Media cache hit");
                    return Ok(path.clone());
                }
                Some(Entry::Downloading { tx }) => {
                    trace!(id = %id, "Joining in-flight download");
                    tx.subscribe()
                }
                Some(Entry::Failed) | None => {
                    let (tx, rx) = broadcast::channel(1);
                    entries.insert(id.clone(), Entry::Downloading { tx: tx.clone() });
                    debug!(id = %id, url = %url, "Starting media download");
                    tokio::spawn(run_download(state.clone(), id.clone(), url, tx));
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(MediaError::DownloadFailed(
                "download task dropped without a result".into(),
            )),
        }
    }

    /// Marks an entry as in active use so cleanup will not evict it.
    pub async fn pin(&self, id: &MediaId) {
        let mut entries = self.state.entries.lock().await;
        if let Some(Entry::Ready { pins, .. }) = entries.get_mut(id) {
            *pins += 1;
        }
    }

    /// Releases one pin on an entry.
    pub async fn unpin(&self, id: &MediaId) {
        let mut entries = self.state.entries.lock().await;
        if let Some(Entry::Ready { pins, .. }) = entries.get_mut(id) {
            *pins = pins.saturating_sub(1);
        }
    }

    /// Current download state of an entry, if one exists.
    pub async fn download_state(&self, id: &MediaId) -> Option<DownloadState> {
        let entries = self.state.entries.lock().await;
        entries.get(id).map(|e| match e {
            Entry::Downloading { .. } => DownloadState::Downloading,
            Entry::Ready { .. } => DownloadState::Ready,
            Entry::Failed => DownloadState::Failed,
        })
    }

    /// Checks whether a ready file exists for the id.
    pub async fn contains(&self, id: &MediaId) -> bool {
        let entries = self.state.entries.lock().await;
        matches!(entries.get(id), Some(Entry::Ready { .. }))
    }

    /// Returns the current cache size in bytes.
    pub fn current_size(&self) -> u64 {
        self.state.current_size.load(Ordering::Relaxed)
    }

    /// Returns the number of ready cached files.
    pub fn len(&self) -> usize {
        self.state.item_count.load(Ordering::Relaxed)
    }

    /// Returns true if the cache holds no ready files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every ready file from the cache. In-flight downloads are
    /// left alone and will re-insert their entries on completion.
    ///
    /// # Errors
    /// Returns error if a cache file cannot be deleted.
    pub async fn clear(&self) -> MediaResult<()> {
        let victims = {
            let mut entries = self.state.entries.lock().await;
            let ids: Vec<MediaId> = entries
                .iter()
                .filter(|(_, e)| matches!(e, Entry::Ready { .. }))
                .map(|(id, _)| id.clone())
                .collect();
            let mut victims = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(Entry::Ready { path, size, .. }) = entries.remove(&id) {
                    self.state.current_size.fetch_sub(size, Ordering::Relaxed);
                    self.state.item_count.fetch_sub(1, Ordering::Relaxed);
                    victims.push(path);
                }
            }
            victims
        };

        for path in victims {
            fs::remove_file(&path)
                .await
                .map_err(|e| MediaError::Io(format!("Failed to remove cache file: {e}")))?;
        }
        debug!("Cleared media cache");
        Ok(())
    }
}

impl std::fmt::Debug for MediaFileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFileCache")
            .field("dir", &self.state.cache_dir)
            .field("size", &self.current_size())
            .field("items", &self.len())
            .finish_non_exhaustive()
    }
}

impl CacheState {
    fn file_path(&self, id: &MediaId) -> PathBuf {
        self.cache_dir.join(format!("{}.{CACHE_EXT}", id.as_str()))
    }

    /// Evicts least-recently-accessed, unpinned files when over budget.
    /// Frees down to budget minus 10% headroom. Victim selection and
    /// bookkeeping happen under the lock; file deletion happens outside it.
    async fn cleanup_if_needed(&self) {
        let current = self.current_size.load(Ordering::Relaxed);
        if current <= self.max_size {
            return;
        }

        debug!(
            current_size = current,
            max_size = self.max_size,
            "Media cache over limit, cleaning up"
        );

        let target = current - self.max_size + self.max_size / 10;
        let victims = {
            let mut entries = self.entries.lock().await;
            let mut candidates: Vec<(MediaId, SystemTime, u64)> = entries
                .iter()
                .filter_map(|(id, e)| match e {
                    Entry::Ready {
                        pins: 0,
                        last_access,
                        size,
                        ..
                    } => Some((id.clone(), *last_access, *size)),
                    _ => None,
                })
                .collect();
            candidates.sort_by_key(|(_, time, _)| *time);

            let mut freed = 0u64;
            let mut victims = Vec::new();
            for (id, _, size) in candidates {
                if freed >= target {
                    break;
                }
                if let Some(Entry::Ready { path, .. }) = entries.remove(&id) {
                    self.current_size.fetch_sub(size, Ordering::Relaxed);
                    self.item_count.fetch_sub(1, Ordering::Relaxed);
                    freed += size;
                    victims.push(path);
                }
            }
            debug!(
                freed_size = freed,
                freed_count = victims.len(),
                "Media cache cleanup complete"
            );
            victims
        };

        for path in victims {
            if let Err(e) = fs::remove_file(&path).await {
                // Orphaned files are picked up again by the next rescan.
                warn!(path = %path.display(), error = %e, "Failed to remove old cache file");
            }
        }
    }
}

async fn run_download(
    state: Arc<CacheState>,
    id: MediaId,
    url: String,
    tx: broadcast::Sender<MediaResult<PathBuf>>,
) {
    let result = perform_download(&state, &id, &url).await;

    {
        let mut entries = state.entries.lock().await;
        match &result {
            Ok(path) => {
                let size = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
                entries.insert(
                    id.clone(),
                    Entry::Ready {
                        path: path.clone(),
                        size,
                        last_access: SystemTime::now(),
                        pins: 0,
                    },
                );
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Media download failed");
                entries.insert(id.clone(), Entry::Failed);
            }
        }
    }

    let _ = tx.send(result);
    state.cleanup_if_needed().await;
}

async fn perform_download(state: &CacheState, id: &MediaId, url: &str) -> MediaResult<PathBuf> {
    let bytes = state.fetcher.fetch(url).await?;

    let path = state.file_path(id);
    let old_size = fs::metadata(&path).await.map(|m| m.len()).ok();

    let mut file = fs::File::create(&path)
        .await
        .map_err(|e| MediaError::DownloadFailed(format!("Failed to create cache file: {e}")))?;
    file.write_all(&bytes)
        .await
        .map_err(|e| MediaError::DownloadFailed(format!("Failed to write cache file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| MediaError::DownloadFailed(format!("Failed to flush cache file: {e}")))?;

    let new_size = bytes.len() as u64;
    if let Some(old) = old_size {
        if new_size > old {
            state
                .current_size
                .fetch_add(new_size - old, Ordering::Relaxed);
        } else {
            state
                .current_size
                .fetch_sub(old - new_size, Ordering::Relaxed);
        }
    } else {
        state.current_size.fetch_add(new_size, Ordering::Relaxed);
        state.item_count.fetch_add(1, Ordering::Relaxed);
    }

    debug!(id = %id, path = %path.display(), size = new_size, "Stored media in disk cache");
    Ok(path)
}

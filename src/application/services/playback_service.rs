//! Activation glue between cell visibility and playback resources.
//!
//! The UI calls [`PlaybackService::activate`] when a cell scrolls into
//! view and [`PlaybackService::deactivate`] when it scrolls out. Each
//! activation is a cancellable acquisition that walks the pipeline —
//! shared download, shared decoded asset, pooled engine — checking at
//! every suspension point whether the cell still wants this content, and
//! releasing exactly what it already holds when it does not.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, trace, warn};

use crate::domain::entities::{CellId, CellPlayback, MediaId, PlaybackContext};
use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::EngineFactoryPort;
use crate::infrastructure::MediaConfig;
use crate::infrastructure::media::{
    AssetRegistry, FileProbeDecoder, HttpMediaFetcher, MediaFileCache, PlayerPool,
};

use super::loop_controller::LoopSession;

struct CellState {
    // Bumped on every activate and deactivate; an acquisition that
    // observes a different value than it started with is stale and must
    // unwind. This is what keeps a slow acquisition for old content from
    // wiring its engine into a cell that has moved on.
    generation: u64,
    url: Option<String>,
    session: Option<LoopSession>,
    status_tx: watch::Sender<CellPlayback>,
}

impl CellState {
    fn new() -> Self {
        Self {
            generation: 0,
            url: None,
            session: None,
            status_tx: watch::Sender::new(CellPlayback::Idle),
        }
    }
}

/// Entry point of the media subsystem: owns the file cache, the asset
/// registry, and the player pool, and drives them from cell visibility
/// transitions.
#[derive(Clone)]
pub struct PlaybackService {
    config: MediaConfig,
    cache: Arc<MediaFileCache>,
    registry: Arc<AssetRegistry>,
    pool: Arc<PlayerPool>,
    cells: Arc<Mutex<HashMap<CellId, CellState>>>,
}

impl PlaybackService {
    /// Creates a service over explicitly-constructed components. Tests
    /// substitute fresh instances per case instead of sharing process
    /// globals.
    #[must_use]
    pub fn new(
        config: MediaConfig,
        cache: Arc<MediaFileCache>,
        registry: Arc<AssetRegistry>,
        pool: Arc<PlayerPool>,
    ) -> Self {
        Self {
            config,
            cache,
            registry,
            pool,
            cells: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a service with the default HTTP fetcher and file-probe
    /// decoder. The engine factory is platform-supplied.
    ///
    /// # Errors
    /// Returns error if the cache directory or HTTP client cannot be set up.
    pub async fn with_defaults(
        config: MediaConfig,
        factory: Arc<dyn EngineFactoryPort>,
    ) -> MediaResult<Self> {
        let fetcher = Arc::new(HttpMediaFetcher::new(Duration::from_secs(
            config.timeout_secs,
        ))?);
        let cache = Arc::new(
            MediaFileCache::new(config.effective_cache_dir(), config.max_cache_size, fetcher)
                .await?,
        );
        let registry = Arc::new(AssetRegistry::new(
            Arc::new(FileProbeDecoder::new()),
            config.release_grace(),
        ));
        let pool = Arc::new(PlayerPool::new(config.pool_capacity, factory));
        Ok(Self::new(config, cache, registry, pool))
    }

    /// Starts playback for a cell that became visible.
    ///
    /// Returns a watch channel carrying the cell's playback state; the UI
    /// keeps the thumbnail up until it reads `Playing`. Activating a cell
    /// that is already acquiring or playing the same URL is a no-op.
    /// Activating with a different URL supersedes the old content: any
    /// live session is torn down first and any in-flight acquisition is
    /// left to unwind against a stale generation.
    pub async fn activate(
        &self,
        cell: CellId,
        url: &str,
        context: PlaybackContext,
    ) -> watch::Receiver<CellPlayback> {
        let mut cells = self.cells.lock().await;
        let state = cells.entry(cell).or_insert_with(CellState::new);
        let rx = state.status_tx.subscribe();

        if state.url.as_deref() == Some(url) && state.status_tx.borrow().is_active() {
            trace!(cell = %cell, "Activate is a no-op, cell already active for this URL");
            return rx;
        }

        state.generation += 1;
        let generation = state.generation;
        state.url = Some(url.to_string());

        if let Some(session) = state.session.take() {
            self.teardown(session).await;
        }
        // send_replace, not send: the state must advance even when the UI
        // dropped its receiver, or borrow() would keep reporting stale
        // state to later activations.
        state.status_tx.send_replace(CellPlayback::Acquiring);
        drop(cells);

        debug!(cell = %cell, url = %url, "Activating cell");
        let service = self.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            service.run_acquisition(cell, generation, &url, context).await;
        });

        rx
    }

    /// Stops playback for a cell that left the viewport. Teardown is
    /// complete when this returns: the engine is back in the pool and the
    /// asset reference is released. Any in-flight acquisition for the
    /// cell unwinds at its next checkpoint.
    pub async fn deactivate(&self, cell: CellId) {
        let mut cells = self.cells.lock().await;
        let Some(state) = cells.get_mut(&cell) else {
            return;
        };

        state.generation += 1;
        state.url = None;
        if let Some(session) = state.session.take() {
            self.teardown(session).await;
        }
        state.status_tx.send_replace(CellPlayback::Idle);
        debug!(cell = %cell, "Deactivated cell");
    }

    /// Warms the file cache for neighbors of the focused item in an
    /// immersive pager, within the configured preload radius.
    pub fn prefetch_around(&self, urls: &[String], focused: usize) {
        let radius = self.config.preload_radius;
        let lo = focused.saturating_sub(radius);
        let hi = focused.saturating_add(radius);
        for (index, url) in urls.iter().enumerate() {
            if index >= lo && index <= hi && index != focused {
                self.cache.prefetch(url);
            }
        }
    }

    /// Current playback state of a cell.
    pub async fn playback_state(&self, cell: CellId) -> CellPlayback {
        let cells = self.cells.lock().await;
        cells
            .get(&cell)
            .map_or(CellPlayback::Idle, |state| *state.status_tx.borrow())
    }

    /// The local file the cell's live session is playing, if any.
    pub async fn current_media_path(&self, cell: CellId) -> Option<PathBuf> {
        let cells = self.cells.lock().await;
        cells
            .get(&cell)
            .and_then(|state| state.session.as_ref())
            .map(|session| session.asset_path().to_path_buf())
    }

    async fn run_acquisition(
        &self,
        cell: CellId,
        generation: u64,
        url: &str,
        context: PlaybackContext,
    ) {
        match self.acquire(cell, generation, url, context).await {
            Ok(()) => {}
            Err(e) if e.is_cancellation() => {
                debug!(cell = %cell, "Acquisition cancelled");
            }
            Err(e) => {
                warn!(cell = %cell, error = %e, "Playback acquisition failed");
                let mut cells = self.cells.lock().await;
                if let Some(state) = cells.get_mut(&cell)
                    && state.generation == generation
                {
                    state.status_tx.send_replace(CellPlayback::Failed);
                }
            }
        }
    }

    /// Walks the acquisition pipeline for one cell. Every step after a
    /// resource is acquired either hands the resource to the session or
    /// releases it on the way out.
    async fn acquire(
        &self,
        cell: CellId,
        generation: u64,
        url: &str,
        context: PlaybackContext,
    ) -> MediaResult<()> {
        let media_id = MediaId::from_url(url);

        let path = self.cache.local_file(url).await?;
        if !self.is_current(cell, generation).await {
            return Err(MediaError::Cancelled);
        }
        self.cache.pin(&media_id).await;

        let handle = match self.registry.acquire(&path).await {
            Ok(handle) => handle,
            Err(e) => {
                self.cache.unpin(&media_id).await;
                return Err(e);
            }
        };
        if !self.is_current(cell, generation).await {
            self.registry.release(handle).await;
            self.cache.unpin(&media_id).await;
            return Err(MediaError::Cancelled);
        }

        let lease = match self.pool.obtain() {
            Ok(lease) => lease,
            Err(e) => {
                self.registry.release(handle).await;
                self.cache.unpin(&media_id).await;
                return Err(e);
            }
        };

        // Commit point: the session is wired only while the cell still
        // wants this content, under the same lock a deactivate would take.
        let mut cells = self.cells.lock().await;
        match cells.get_mut(&cell) {
            Some(state) if state.generation == generation => {
                let session = LoopSession::start(
                    cell,
                    media_id,
                    lease,
                    handle,
                    context,
                    self.config.mute_reassert_delay(),
                );
                state.session = Some(session);
                state.status_tx.send_replace(CellPlayback::Playing);
                debug!(cell = %cell, "Playback session wired");
                Ok(())
            }
            _ => {
                drop(cells);
                self.pool.recycle(&lease);
                self.registry.release(handle).await;
                self.cache.unpin(&media_id).await;
                Err(MediaError::Cancelled)
            }
        }
    }

    async fn is_current(&self, cell: CellId, generation: u64) -> bool {
        let cells = self.cells.lock().await;
        cells
            .get(&cell)
            .is_some_and(|state| state.generation == generation)
    }

    async fn teardown(&self, session: LoopSession) {
        let cell = session.cell();
        let (lease, handle, media_id) = session.dismantle();
        self.pool.recycle(&lease);
        self.registry.release(handle).await;
        self.cache.unpin(&media_id).await;
        debug!(cell = %cell, "Playback session torn down");
    }
}

impl std::fmt::Debug for PlaybackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

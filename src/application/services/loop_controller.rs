//! Gap-free loop playback over one engine and one shared asset.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::domain::entities::{CellId, MediaId, PlaybackContext};
use crate::domain::ports::EnginePort;
use crate::infrastructure::media::{AssetHandle, EngineLease};

/// One active pairing of a pooled engine with a shared decoded asset for
/// one on-screen cell.
///
/// Holds the loop task that rewinds and restarts the engine every time
/// playback reaches the end, and (for ambient contexts) a one-shot task
/// that re-asserts mute after buffering starts. Ending the session always
/// returns the engine to the pool and releases the asset reference; the
/// owning service does both via [`LoopSession::dismantle`].
pub struct LoopSession {
    cell: CellId,
    media_id: MediaId,
    lease: EngineLease,
    handle: AssetHandle,
    loop_task: JoinHandle<()>,
    mute_task: Option<JoinHandle<()>>,
}

impl LoopSession {
    /// Wires the engine to the asset and starts looping playback.
    ///
    /// Ambient contexts start muted and schedule a defensive re-assertion
    /// after `mute_reassert_delay`, since some engines reset mute state
    /// once content begins buffering. Immersive contexts play unmuted.
    #[must_use]
    pub fn start(
        cell: CellId,
        media_id: MediaId,
        lease: EngineLease,
        handle: AssetHandle,
        context: PlaybackContext,
        mute_reassert_delay: Duration,
    ) -> Self {
        let engine = lease.engine().clone();

        engine.load(handle.media());
        engine.set_muted(context.muted());
        engine.seek_to_start();

        // Subscribe before play: a receiver only notices changes made
        // after it was created, so a completion racing the task spawn
        // would otherwise be lost and playback would stall at the end.
        let completions = engine.completions();
        engine.play();

        let loop_task = tokio::spawn(run_loop(engine.clone(), completions, cell));

        let mute_task = context.muted().then(|| {
            let engine = engine.clone();
            tokio::spawn(async move {
                tokio::time::sleep(mute_reassert_delay).await;
                engine.set_muted(true);
                trace!(cell = %cell, "Mute re-asserted");
            })
        });

        trace!(cell = %cell, media = %media_id, "Loop session started");
        Self {
            cell,
            media_id,
            lease,
            handle,
            loop_task,
            mute_task,
        }
    }

    /// The cell this session belongs to.
    #[must_use]
    pub const fn cell(&self) -> CellId {
        self.cell
    }

    /// The cached media this session plays.
    #[must_use]
    pub const fn media_id(&self) -> &MediaId {
        &self.media_id
    }

    /// The local file backing this session's asset.
    #[must_use]
    pub fn asset_path(&self) -> &Path {
        self.handle.path()
    }

    /// Becomes `true` once the engine has buffered enough to render.
    /// Drives the thumbnail cross-fade.
    #[must_use]
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.lease.engine().readiness()
    }

    /// Stops the session and hands its resources back to the owner for
    /// recycling and release.
    pub(crate) fn dismantle(self) -> (EngineLease, AssetHandle, MediaId) {
        self.loop_task.abort();
        if let Some(task) = self.mute_task {
            task.abort();
        }
        trace!(cell = %self.cell, "Loop session dismantled");
        (self.lease, self.handle, self.media_id)
    }
}

impl std::fmt::Debug for LoopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopSession")
            .field("cell", &self.cell)
            .field("media", &self.media_id)
            .finish_non_exhaustive()
    }
}

/// Restarts playback each time the engine reports reaching the end of the
/// attached media.
async fn run_loop(
    engine: Arc<dyn EnginePort>,
    mut completions: watch::Receiver<u64>,
    cell: CellId,
) {
    while completions.changed().await.is_ok() {
        engine.seek_to_start();
        engine.play();
        trace!(cell = %cell, "Looped playback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::{MockDecoder, MockEngineFactory};
    use crate::infrastructure::media::{AssetRegistry, PlayerPool};
    use std::path::PathBuf;

    struct Harness {
        pool: PlayerPool,
        registry: AssetRegistry,
        factory: Arc<MockEngineFactory>,
    }

    fn harness() -> Harness {
        let factory = Arc::new(MockEngineFactory::new());
        Harness {
            pool: PlayerPool::new(1, factory.clone()),
            registry: AssetRegistry::new(Arc::new(MockDecoder::new()), Duration::ZERO),
            factory,
        }
    }

    async fn start_session(h: &Harness, context: PlaybackContext, delay: Duration) -> LoopSession {
        let path = PathBuf::from("/cache/clip.media");
        let handle = h.registry.acquire(&path).await.unwrap();
        let lease = h.pool.obtain().unwrap();
        LoopSession::start(
            CellId::new(),
            MediaId::from_url("https://cdn.example.com/clip.mp4"),
            lease,
            handle,
            context,
            delay,
        )
    }

    #[tokio::test]
    async fn test_start_wires_engine_and_plays() {
        let h = harness();
        let session = start_session(&h, PlaybackContext::Ambient, Duration::from_secs(1)).await;

        let engine = h.factory.engine(0).unwrap();
        assert!(engine.is_playing());
        assert!(engine.is_muted());
        assert!(engine.current_media().is_some());
        assert!(*session.ready().borrow(), "readiness drives the cross-fade");
    }

    #[tokio::test]
    async fn test_completion_restarts_playback() {
        let h = harness();
        let _session = start_session(&h, PlaybackContext::Ambient, Duration::from_secs(1)).await;
        let engine = h.factory.engine(0).unwrap();

        let seeks_before = engine.seek_calls();
        engine.finish_playback();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(engine.seek_calls(), seeks_before + 1);
        assert!(engine.is_playing(), "playback must repeat without a gap");

        engine.finish_playback();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(engine.seek_calls(), seeks_before + 2);
    }

    #[tokio::test]
    async fn test_ambient_mute_survives_external_reset() {
        let h = harness();
        let _session =
            start_session(&h, PlaybackContext::Ambient, Duration::from_millis(30)).await;
        let engine = h.factory.engine(0).unwrap();

        assert!(engine.is_muted(), "muted at session start");
        engine.reset_mute_externally();
        assert!(!engine.is_muted());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(engine.is_muted(), "mute must be re-asserted after the delay");
    }

    #[tokio::test]
    async fn test_immersive_plays_unmuted() {
        let h = harness();
        let _session =
            start_session(&h, PlaybackContext::Immersive, Duration::from_millis(10)).await;
        let engine = h.factory.engine(0).unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!engine.is_muted(), "immersive sessions never force mute");
    }

    #[tokio::test]
    async fn test_dismantle_stops_looping() {
        let h = harness();
        let session = start_session(&h, PlaybackContext::Ambient, Duration::from_secs(1)).await;
        let engine = h.factory.engine(0).unwrap();

        let (lease, handle, _media_id) = session.dismantle();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let seeks_before = engine.seek_calls();
        engine.finish_playback();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            engine.seek_calls(),
            seeks_before,
            "a dismantled session must not restart playback"
        );

        h.pool.recycle(&lease);
        h.registry.release(handle).await;
        assert_eq!(h.pool.lent_count(), 0);
        assert!(h.registry.is_empty().await);
    }
}

//! Playback engine port definition.

use std::sync::Arc;

use tokio::sync::watch;

use super::asset_decoder_port::DecodedMedia;

/// Port for one native playback engine instance.
///
/// Engines render a decoded media object to a surface over time. They are
/// expensive to instantiate and cheap to reset, so the pool reuses a small
/// fixed set for the life of the process. All methods are cheap control
/// operations; none of them block.
pub trait EnginePort: Send + Sync {
    /// Attaches a decoded media object for playback.
    fn load(&self, media: Arc<dyn DecodedMedia>);

    /// Detaches the current media object, if any.
    fn detach(&self);

    /// Starts or resumes playback.
    fn play(&self);

    /// Pauses playback.
    fn pause(&self);

    /// Rewinds to position zero.
    fn seek_to_start(&self);

    /// Sets the mute flag.
    fn set_muted(&self, muted: bool);

    /// Current mute flag.
    fn is_muted(&self) -> bool;

    /// Whether playback is currently running.
    fn is_playing(&self) -> bool;

    /// Current playback position in milliseconds.
    fn position_ms(&self) -> u64;

    /// The media object currently attached, if any.
    fn current_media(&self) -> Option<Arc<dyn DecodedMedia>>;

    /// Counter that increments each time playback reaches the end of the
    /// attached media. The loop controller watches this to restart.
    fn completions(&self) -> watch::Receiver<u64>;

    /// Becomes `true` once enough is buffered to render; drives the
    /// thumbnail cross-fade.
    fn readiness(&self) -> watch::Receiver<bool>;
}

/// Port for constructing playback engines, called lazily by the pool up to
/// its capacity and never afterwards.
pub trait EngineFactoryPort: Send + Sync {
    /// Builds one engine instance.
    fn create(&self) -> Arc<dyn EnginePort>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    /// Mock engine for testing: records control calls and lets tests drive
    /// completion and readiness signals by hand.
    pub struct MockEngine {
        muted: AtomicBool,
        playing: AtomicBool,
        position: AtomicU64,
        media: parking_lot::Mutex<Option<Arc<dyn DecodedMedia>>>,
        completions_tx: watch::Sender<u64>,
        readiness_tx: watch::Sender<bool>,
        play_calls: AtomicUsize,
        seek_calls: AtomicUsize,
    }

    impl MockEngine {
        /// Creates an idle, unmuted engine with nothing attached.
        pub fn new() -> Self {
            Self {
                muted: AtomicBool::new(false),
                playing: AtomicBool::new(false),
                position: AtomicU64::new(0),
                media: parking_lot::Mutex::new(None),
                completions_tx: watch::Sender::new(0),
                readiness_tx: watch::Sender::new(false),
                play_calls: AtomicUsize::new(0),
                seek_calls: AtomicUsize::new(0),
            }
        }

        /// Simulates playback reaching the end of the media.
        pub fn finish_playback(&self) {
            self.position.store(0, Ordering::SeqCst);
            self.completions_tx.send_modify(|n| *n += 1);
        }

        /// Simulates buffering progress resetting the mute flag, which
        /// some native engines do mid-buffering.
        pub fn reset_mute_externally(&self) {
            self.muted.store(false, Ordering::SeqCst);
        }

        /// Simulates a position advance during playback.
        pub fn advance_position(&self, ms: u64) {
            self.position.fetch_add(ms, Ordering::SeqCst);
        }

        /// Number of `play` calls so far.
        pub fn play_calls(&self) -> usize {
            self.play_calls.load(Ordering::SeqCst)
        }

        /// Number of `seek_to_start` calls so far.
        pub fn seek_calls(&self) -> usize {
            self.seek_calls.load(Ordering::SeqCst)
        }
    }

    impl Default for MockEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EnginePort for MockEngine {
        fn load(&self, media: Arc<dyn DecodedMedia>) {
            *self.media.lock() = Some(media);
        }

        fn detach(&self) {
            *self.media.lock() = None;
            self.playing.store(false, Ordering::SeqCst);
            // send_replace so the value moves even with no subscribers.
            self.readiness_tx.send_replace(false);
        }

        fn play(&self) {
            self.play_calls.fetch_add(1, Ordering::SeqCst);
            self.playing.store(true, Ordering::SeqCst);
            self.readiness_tx.send_replace(true);
        }

        fn pause(&self) {
            self.playing.store(false, Ordering::SeqCst);
        }

        fn seek_to_start(&self) {
            self.seek_calls.fetch_add(1, Ordering::SeqCst);
            self.position.store(0, Ordering::SeqCst);
        }

        fn set_muted(&self, muted: bool) {
            self.muted.store(muted, Ordering::SeqCst);
        }

        fn is_muted(&self) -> bool {
            self.muted.load(Ordering::SeqCst)
        }

        fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }

        fn position_ms(&self) -> u64 {
            self.position.load(Ordering::SeqCst)
        }

        fn current_media(&self) -> Option<Arc<dyn DecodedMedia>> {
            self.media.lock().clone()
        }

        fn completions(&self) -> watch::Receiver<u64> {
            self.completions_tx.subscribe()
        }

        fn readiness(&self) -> watch::Receiver<bool> {
            self.readiness_tx.subscribe()
        }
    }

    /// Mock factory for testing: counts creations and keeps every engine
    /// it built so tests can inspect them afterwards.
    pub struct MockEngineFactory {
        created: parking_lot::Mutex<Vec<Arc<MockEngine>>>,
    }

    impl MockEngineFactory {
        /// Creates an empty factory.
        pub fn new() -> Self {
            Self {
                created: parking_lot::Mutex::new(Vec::new()),
            }
        }

        /// Number of engines constructed so far.
        pub fn created_count(&self) -> usize {
            self.created.lock().len()
        }

        /// Returns the n-th engine built, if any.
        pub fn engine(&self, index: usize) -> Option<Arc<MockEngine>> {
            self.created.lock().get(index).cloned()
        }
    }

    impl Default for MockEngineFactory {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EngineFactoryPort for MockEngineFactory {
        fn create(&self) -> Arc<dyn EnginePort> {
            let engine = Arc::new(MockEngine::new());
            self.created.lock().push(engine.clone());
            engine
        }
    }
}

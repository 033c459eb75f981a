//! Bounded pool of reusable playback engines.
//!
//! Engine construction is expensive and scrolling can mount dozens of
//! cells per second, so the number of live engines is capped at a small
//! constant. Engines are built lazily up to capacity and reused, never
//! destroyed, for the life of the pool.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::{EngineFactoryPort, EnginePort};

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Engines currently lent out.
    pub lent: usize,
    /// Remaining capacity (idle engines plus not-yet-created slots).
    pub free: usize,
    /// Hard maximum number of engines.
    pub capacity: usize,
    /// Engines constructed so far.
    pub created: usize,
}

struct Slot {
    engine: Arc<dyn EnginePort>,
    busy: bool,
    // Bumped on every lend; a recycle whose lease carries an older value
    // is stale and must not touch the slot.
    generation: u64,
}

/// A borrowed engine. Give it back with [`PlayerPool::recycle`]; the pool
/// resets it before lending it out again.
pub struct EngineLease {
    slot: usize,
    generation: u64,
    engine: Arc<dyn EnginePort>,
}

impl EngineLease {
    /// The borrowed engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn EnginePort> {
        &self.engine
    }
}

impl std::fmt::Debug for EngineLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLease")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Fixed-capacity pool of playback engines.
pub struct PlayerPool {
    factory: Arc<dyn EngineFactoryPort>,
    capacity: usize,
    slots: Mutex<Vec<Slot>>,
}

impl PlayerPool {
    /// Creates a pool that builds engines with `factory`, at most
    /// `capacity` of them.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize, factory: Arc<dyn EngineFactoryPort>) -> Self {
        assert!(capacity > 0, "pool capacity must be > 0");
        Self {
            factory,
            capacity,
            slots: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Borrows an engine: a free one if available, a newly-built one while
    /// under capacity.
    ///
    /// # Errors
    /// Returns `PoolExhausted` when every engine is busy. The UI's preload
    /// radius keeps concurrent demand below capacity, so this is rare.
    pub fn obtain(&self) -> MediaResult<EngineLease> {
        let mut slots = self.slots.lock();

        if let Some((index, slot)) = slots.iter_mut().enumerate().find(|(_, s)| !s.busy) {
            slot.busy = true;
            slot.generation += 1;
            trace!(slot = index, "Engine lent from free set");
            return Ok(EngineLease {
                slot: index,
                generation: slot.generation,
                engine: slot.engine.clone(),
            });
        }

        if slots.len() < self.capacity {
            let engine = self.factory.create();
            let index = slots.len();
            slots.push(Slot {
                engine: engine.clone(),
                busy: true,
                generation: 1,
            });
            debug!(slot = index, "Engine created and lent");
            return Ok(EngineLease {
                slot: index,
                generation: 1,
                engine,
            });
        }

        debug!(capacity = self.capacity, "Player pool exhausted");
        Err(MediaError::PoolExhausted)
    }

    /// Returns an engine to the free set, fully reset: stopped, detached,
    /// muted, position zeroed. Safe to call more than once for the same
    /// lease: repeat calls, and calls on a lease from an earlier lending
    /// of the slot, are no-ops.
    pub fn recycle(&self, lease: &EngineLease) {
        {
            let slots = self.slots.lock();
            let Some(slot) = slots.get(lease.slot) else {
                return;
            };
            if !slot.busy || slot.generation != lease.generation {
                trace!(slot = lease.slot, "Recycle on free or re-lent engine");
                return;
            }
        }

        // Reset while the slot is still marked busy so a concurrent obtain
        // cannot be handed a half-reset engine. The generation cannot move
        // while the slot stays busy.
        let engine = &lease.engine;
        engine.pause();
        engine.detach();
        engine.set_muted(true);
        engine.seek_to_start();

        if let Some(slot) = self.slots.lock().get_mut(lease.slot)
            && slot.generation == lease.generation
        {
            slot.busy = false;
        }
        debug!(slot = lease.slot, "Engine recycled");
    }

    /// Number of engines currently lent out.
    pub fn lent_count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.busy).count()
    }

    /// Remaining capacity: idle engines plus slots not yet created.
    pub fn free_count(&self) -> usize {
        self.capacity - self.lent_count()
    }

    /// The configured maximum number of engines.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let slots = self.slots.lock();
        let lent = slots.iter().filter(|s| s.busy).count();
        PoolStats {
            lent,
            free: self.capacity - lent,
            capacity: self.capacity,
            created: slots.len(),
        }
    }
}

impl std::fmt::Debug for PlayerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerPool")
            .field("capacity", &self.capacity)
            .field("lent", &self.lent_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::{MockDecodedMedia, MockEngineFactory};
    use std::path::PathBuf;

    fn test_pool(capacity: usize) -> (PlayerPool, Arc<MockEngineFactory>) {
        let factory = Arc::new(MockEngineFactory::new());
        (PlayerPool::new(capacity, factory.clone()), factory)
    }

    #[test]
    fn test_new_pool_is_empty() {
        let (pool, factory) = test_pool(3);
        assert_eq!(pool.lent_count(), 0);
        assert_eq!(pool.free_count(), 3);
        assert_eq!(factory.created_count(), 0, "engines are built lazily");
    }

    #[test]
    #[should_panic(expected = "pool capacity must be > 0")]
    fn test_zero_capacity_panics() {
        let factory = Arc::new(MockEngineFactory::new());
        let _ = PlayerPool::new(0, factory);
    }

    #[test]
    fn test_boundedness_under_burst() {
        let (pool, factory) = test_pool(2);

        let a = pool.obtain().unwrap();
        let b = pool.obtain().unwrap();
        assert!(matches!(pool.obtain(), Err(MediaError::PoolExhausted)));
        assert!(matches!(pool.obtain(), Err(MediaError::PoolExhausted)));

        assert_eq!(pool.lent_count(), 2);
        assert_eq!(factory.created_count(), 2, "burst must not exceed capacity");

        pool.recycle(&a);
        pool.recycle(&b);
        assert_eq!(pool.lent_count(), 0);
    }

    #[test]
    fn test_recycled_engine_is_reused_not_rebuilt() {
        let (pool, factory) = test_pool(2);

        let lease = pool.obtain().unwrap();
        pool.recycle(&lease);
        let again = pool.obtain().unwrap();

        assert_eq!(factory.created_count(), 1);
        assert!(Arc::ptr_eq(lease.engine(), again.engine()));
    }

    #[test]
    fn test_recycle_resets_engine() {
        let (pool, factory) = test_pool(1);

        let lease = pool.obtain().unwrap();
        let engine = lease.engine();
        engine.load(Arc::new(MockDecodedMedia::new(PathBuf::from("/cache/a"))));
        engine.set_muted(false);
        engine.play();
        let mock = factory.engine(0).unwrap();
        mock.advance_position(1500);

        pool.recycle(&lease);

        assert!(!mock.is_playing());
        assert!(mock.is_muted());
        assert_eq!(mock.position_ms(), 0);
        assert!(mock.current_media().is_none());
    }

    #[test]
    fn test_recycle_is_idempotent() {
        let (pool, _factory) = test_pool(2);

        let lease = pool.obtain().unwrap();
        pool.recycle(&lease);
        pool.recycle(&lease);
        pool.recycle(&lease);

        assert_eq!(pool.lent_count(), 0);
        assert_eq!(pool.free_count(), 2);

        // The slot must be lendable exactly once.
        let a = pool.obtain().unwrap();
        let b = pool.obtain().unwrap();
        assert_ne!(a.slot, b.slot);
        assert!(matches!(pool.obtain(), Err(MediaError::PoolExhausted)));
    }

    #[test]
    fn test_stale_recycle_does_not_free_relent_engine() {
        let (pool, factory) = test_pool(1);

        let a = pool.obtain().unwrap();
        pool.recycle(&a);
        let _b = pool.obtain().unwrap();
        let engine = factory.engine(0).unwrap();
        engine.play();

        // The first lease is long dead; its slot now belongs to the
        // second consumer and must stay untouched.
        pool.recycle(&a);
        assert_eq!(pool.lent_count(), 1);
        assert!(
            engine.is_playing(),
            "a stale recycle must not reset the re-lent engine"
        );
        assert!(matches!(pool.obtain(), Err(MediaError::PoolExhausted)));
    }

    #[test]
    fn test_stats() {
        let (pool, _factory) = test_pool(3);
        let lease = pool.obtain().unwrap();

        assert_eq!(
            pool.stats(),
            PoolStats {
                lent: 1,
                free: 2,
                capacity: 3,
                created: 1,
            }
        );

        pool.recycle(&lease);
        assert_eq!(
            pool.stats(),
            PoolStats {
                lent: 0,
                free: 3,
                capacity: 3,
                created: 1,
            }
        );
    }
}

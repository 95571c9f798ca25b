//! Temporary target pool
//!
//! Indirect and blur temporaries are borrowed for one frame. A
//! `PooledTarget` goes back to the pool when dropped, so every exit path of a
//! frame returns what it took.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Extent = (u32, u32);

struct PoolState<T> {
    free: HashMap<Extent, Vec<T>>,
}

/// Reusable targets keyed by extent
pub struct TargetPool<T> {
    state: Arc<Mutex<PoolState<T>>>,
    outstanding: Arc<AtomicUsize>,
}

impl<T> TargetPool<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState {
                free: HashMap::new(),
            })),
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reuse a free target of `extent` or build one with `create`
    pub fn acquire(&self, extent: Extent, create: impl FnOnce(Extent) -> T) -> PooledTarget<T> {
        let reused = self
            .state
            .lock()
            .free
            .get_mut(&extent)
            .and_then(|targets| targets.pop());
        let item = match reused {
            Some(item) => item,
            None => {
                log::debug!("[TargetPool] Creating {}x{} target", extent.0, extent.1);
                create(extent)
            }
        };

        self.outstanding.fetch_add(1, Ordering::AcqRel);
        PooledTarget {
            item: ManuallyDrop::new(item),
            extent,
            state: Arc::clone(&self.state),
            outstanding: Arc::clone(&self.outstanding),
        }
    }

    /// Targets currently borrowed
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Targets waiting for reuse
    pub fn idle(&self) -> usize {
        self.state.lock().free.values().map(Vec::len).sum()
    }

    /// Drop every idle target, e.g. after the screen size changed
    pub fn clear(&self) {
        self.state.lock().free.clear();
    }
}

impl<T> Default for TargetPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed target, returned to its pool on drop
pub struct PooledTarget<T> {
    item: ManuallyDrop<T>,
    extent: Extent,
    state: Arc<Mutex<PoolState<T>>>,
    outstanding: Arc<AtomicUsize>,
}

impl<T> PooledTarget<T> {
    pub fn extent(&self) -> Extent {
        self.extent
    }
}

impl<T> std::ops::Deref for PooledTarget<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> AsRef<T> for PooledTarget<T> {
    fn as_ref(&self) -> &T {
        &self.item
    }
}

impl<T> std::ops::DerefMut for PooledTarget<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T> Drop for PooledTarget<T> {
    fn drop(&mut self) {
        // SAFETY: `item` is taken exactly once, here, and never touched again
        let item = unsafe { ManuallyDrop::take(&mut self.item) };
        self.state
            .lock()
            .free
            .entry(self.extent)
            .or_default()
            .push(item);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_return_on_drop() {
        let pool: TargetPool<Vec<u8>> = TargetPool::new();
        {
            let a = pool.acquire((4, 4), |(w, h)| vec![0; (w * h) as usize]);
            let _b = pool.acquire((4, 4), |(w, h)| vec![0; (w * h) as usize]);
            assert_eq!(a.len(), 16);
            assert_eq!(pool.outstanding(), 2);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_reuse_matches_extent() {
        let pool: TargetPool<u32> = TargetPool::new();
        let mut created = 0;
        drop(pool.acquire((8, 8), |_| {
            created += 1;
            1
        }));
        drop(pool.acquire((8, 8), |_| {
            created += 1;
            2
        }));
        assert_eq!(created, 1);

        let other = pool.acquire((2, 2), |_| 3);
        assert_eq!(*other, 3);
    }

    #[test]
    fn test_mutations_survive_the_round_trip() {
        let pool: TargetPool<Vec<u8>> = TargetPool::new();
        {
            let mut target = pool.acquire((2, 1), |_| vec![0, 0]);
            target[1] = 7;
        }
        let target = pool.acquire((2, 1), |_| Vec::new());
        assert_eq!(*target, vec![0, 7]);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_release_on_early_return() {
        fn frame(pool: &TargetPool<u8>) -> Result<(), ()> {
            let _temp = pool.acquire((1, 1), |_| 0);
            Err(())
        }
        let pool = TargetPool::new();
        assert!(frame(&pool).is_err());
        assert_eq!(pool.outstanding(), 0);
        pool.clear();
        assert_eq!(pool.idle(), 0);
    }
}

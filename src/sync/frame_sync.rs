//! Frame permit
//!
//! A single permit serializes the engine writing a frame against consumers
//! reading it. Acquisition blocks until the permit is free and cannot be
//! interrupted or timed out: a stuck acquire means the protocol was broken
//! somewhere else, and giving up would expose a half-written frame.

use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct PermitState {
    held: bool,
    owner: Option<ThreadId>,
}

/// Binary semaphore guarding the current frame buffers.
#[derive(Debug, Default)]
pub struct FrameSync {
    state: Mutex<PermitState>,
    available: Condvar,
}

impl FrameSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the permit is free, then take it
    ///
    /// In debug builds a second acquire from the thread already holding the
    /// permit fails with `ReentrancyViolation` instead of deadlocking.
    pub fn acquire(&self) -> Result<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if cfg!(debug_assertions) && state.held && state.owner == Some(me) {
            error!("Frame permit acquired twice by {:?}", me);
            return Err(Error::ReentrancyViolation);
        }

        while state.held {
            self.available.wait(&mut state);
        }

        state.held = true;
        state.owner = Some(me);
        Ok(())
    }

    /// Take the permit if it is free, without blocking
    pub fn try_acquire(&self) -> Result<bool> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.held {
            if cfg!(debug_assertions) && state.owner == Some(me) {
                error!("Frame permit acquired twice by {:?}", me);
                return Err(Error::ReentrancyViolation);
            }
            return Ok(false);
        }

        state.held = true;
        state.owner = Some(me);
        Ok(true)
    }

    /// Return the permit and wake one waiter
    ///
    /// Exactly one release per acquire. The engine may unlock from another
    /// thread than the one that locked, so ownership is not checked here.
    pub fn release(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.held {
            error!("Frame permit released without being held");
            return Err(Error::NotHeld);
        }
        state.held = false;
        state.owner = None;
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Acquire the permit for the lifetime of the returned guard
    pub fn lock(&self) -> Result<SyncGuard<'_>> {
        self.acquire()?;
        Ok(SyncGuard { sync: self })
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }
}

/// Holds the frame permit; releases it on drop, including on early returns and panics.
#[must_use = "the permit is released as soon as the guard is dropped"]
pub struct SyncGuard<'a> {
    sync: &'a FrameSync,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        // The guard owns the permit, release cannot observe NotHeld.
        let _ = self.sync.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_acquire_release() {
        let sync = FrameSync::new();
        assert!(!sync.is_held());
        sync.acquire().unwrap();
        assert!(sync.is_held());
        sync.release().unwrap();
        assert!(!sync.is_held());
    }

    #[test]
    fn test_release_without_acquire() {
        let sync = FrameSync::new();
        assert!(matches!(sync.release(), Err(Error::NotHeld)));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_reentrant_acquire_fails_fast() {
        let sync = FrameSync::new();
        let _guard = sync.lock().unwrap();
        assert!(matches!(sync.acquire(), Err(Error::ReentrancyViolation)));
        assert!(matches!(sync.try_acquire(), Err(Error::ReentrancyViolation)));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let sync = FrameSync::new();
        {
            let _guard = sync.lock().unwrap();
            assert!(sync.is_held());
        }
        assert!(!sync.is_held());
    }

    #[test]
    fn test_try_acquire_from_other_thread() {
        let sync = Arc::new(FrameSync::new());
        let _guard = sync.lock().unwrap();

        let other = sync.clone();
        let got = std::thread::spawn(move || other.try_acquire().unwrap()).join().unwrap();
        assert!(!got);
    }

    #[test]
    fn test_waiter_blocks_until_release() {
        let sync = Arc::new(FrameSync::new());
        sync.acquire().unwrap();

        let acquired = Arc::new(AtomicUsize::new(0));
        let handle = {
            let sync = sync.clone();
            let acquired = acquired.clone();
            std::thread::spawn(move || {
                let _guard = sync.lock().unwrap();
                acquired.store(1, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(acquired.load(Ordering::SeqCst), 0);

        sync.release().unwrap();
        handle.join().unwrap();
        assert_eq!(acquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_holder_under_contention() {
        let sync = Arc::new(FrameSync::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sync = sync.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let _guard = sync.lock().unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::hint::spin_loop();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!sync.is_held());
    }
}

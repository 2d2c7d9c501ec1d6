//! One-shot readiness gate
//!
//! Lets a thread block until an asynchronous engine operation reports that it
//! finished, successfully or not. The first signal wins; later signals are
//! ignored. Clones share the same gate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{Error, Result};

/// Current state of a gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness<T, E> {
    Pending,
    Ready(T),
    Failed(E),
}

/// Terminal state observed by a waiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Ready(T),
    Failed(E),
}

impl<T, E> Outcome<T, E> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> std::result::Result<T, E> {
        match self {
            Outcome::Ready(value) => Ok(value),
            Outcome::Failed(err) => Err(err),
        }
    }
}

impl<T: Clone, E: Clone> Readiness<T, E> {
    fn outcome(&self) -> Option<Outcome<T, E>> {
        match self {
            Readiness::Pending => None,
            Readiness::Ready(value) => Some(Outcome::Ready(value.clone())),
            Readiness::Failed(err) => Some(Outcome::Failed(err.clone())),
        }
    }
}

struct Inner<T, E> {
    state: Mutex<Readiness<T, E>>,
    changed: Condvar,
}

/// Pending until signalled ready or failed, exactly once.
pub struct ReadinessGate<T = (), E = ()> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for ReadinessGate<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone, E: Clone> Default for ReadinessGate<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, E: Clone> ReadinessGate<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Readiness::Pending),
                changed: Condvar::new(),
            }),
        }
    }

    /// Move to Ready; returns false if the gate was already terminal
    pub fn signal_ready(&self, value: T) -> bool {
        self.transition(Readiness::Ready(value))
    }

    /// Move to Failed; returns false if the gate was already terminal
    pub fn signal_failed(&self, err: E) -> bool {
        self.transition(Readiness::Failed(err))
    }

    fn transition(&self, next: Readiness<T, E>) -> bool {
        let mut state = self.inner.state.lock();
        if !matches!(*state, Readiness::Pending) {
            debug!("Ignoring late readiness signal");
            return false;
        }
        *state = next;
        drop(state);

        self.inner.changed.notify_all();
        true
    }

    /// Block until the gate is terminal or `timeout` elapses
    ///
    /// A zero timeout checks the state once and returns immediately.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Outcome<T, E>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Ok(self.wait());
        };

        let mut state = self.inner.state.lock();
        loop {
            if let Some(outcome) = state.outcome() {
                return Ok(outcome);
            }
            if self.inner.changed.wait_until(&mut state, deadline).timed_out() {
                return state.outcome().ok_or(Error::TimedOut);
            }
        }
    }

    /// Block until the gate is terminal
    pub fn wait(&self) -> Outcome<T, E> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(outcome) = state.outcome() {
                return outcome;
            }
            self.inner.changed.wait(&mut state);
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> Readiness<T, E> {
        self.inner.state.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.state.lock(), Readiness::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn test_zero_timeout_on_pending() {
        let gate: ReadinessGate<(), ()> = ReadinessGate::new();
        let start = Instant::now();
        assert!(matches!(gate.wait_timeout(Duration::ZERO), Err(Error::TimedOut)));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(gate.is_pending());
    }

    #[test]
    fn test_signal_then_wait() {
        let gate: ReadinessGate<u32, String> = ReadinessGate::new();
        assert!(gate.signal_ready(7));
        assert_eq!(gate.wait_timeout(Duration::ZERO).unwrap(), Outcome::Ready(7));
        assert_eq!(gate.wait(), Outcome::Ready(7));
        assert_eq!(gate.state(), Readiness::Ready(7));
    }

    #[test]
    fn test_late_signal_is_noop() {
        let gate: ReadinessGate<(), &'static str> = ReadinessGate::new();
        assert!(gate.signal_failed("parse error"));
        assert!(!gate.signal_ready(()));
        assert!(!gate.signal_failed("again"));
        assert_eq!(gate.state(), Readiness::Failed("parse error"));
    }

    #[test]
    fn test_waiter_wakes_on_signal() {
        let gate: ReadinessGate<&'static str, ()> = ReadinessGate::new();
        let waiter = {
            let gate = gate.clone();
            std::thread::spawn(move || gate.wait_timeout(Duration::from_secs(10)))
        };

        std::thread::sleep(Duration::from_millis(20));
        gate.signal_ready("parsed");
        assert_eq!(waiter.join().unwrap().unwrap(), Outcome::Ready("parsed"));
    }

    #[test]
    fn test_first_signal_wins_race() {
        for _ in 0..50 {
            let gate: ReadinessGate<(), ()> = ReadinessGate::new();
            let barrier = Arc::new(Barrier::new(2));

            let ready = {
                let gate = gate.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    gate.signal_ready(())
                })
            };
            let failed = {
                let gate = gate.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    gate.signal_failed(())
                })
            };

            let waiters: Vec<_> = (0..3)
                .map(|_| {
                    let gate = gate.clone();
                    std::thread::spawn(move || gate.wait())
                })
                .collect();

            let ready_won = ready.join().unwrap();
            let failed_won = failed.join().unwrap();
            assert!(ready_won ^ failed_won);

            let expected = if ready_won { Outcome::Ready(()) } else { Outcome::Failed(()) };
            for waiter in waiters {
                assert_eq!(waiter.join().unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_timeout_elapses() {
        let gate: ReadinessGate<(), ()> = ReadinessGate::new();
        let start = Instant::now();
        assert!(matches!(gate.wait_timeout(Duration::from_millis(30)), Err(Error::TimedOut)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}

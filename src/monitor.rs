use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A level-triggered condition with a remembered signaled state.
///
/// Unlike a bare condition variable, a `Monitor` keeps a `signaled` bit: a
/// signal emitted before any thread is waiting is not lost. Waiters consume
/// the state explicitly with [`reset`](Monitor::reset) before sleeping, which
/// closes the missed-wake-up window between checking a predicate and going
/// to sleep on it.
#[derive(Debug, Default)]
pub struct Monitor {
    signaled: Mutex<bool>,
    condition: Condvar,
}

impl Monitor {
    /// Create a monitor in the unsignaled state
    pub fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            condition: Condvar::new(),
        }
    }

    /// Set the signaled state and wake all waiters. Idempotent.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condition.notify_all();
    }

    /// Clear the signaled state
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    /// Block until the monitor is signaled.
    ///
    /// Returns immediately if a signal is already pending. Spurious wake-ups
    /// are absorbed by re-checking the state in a loop.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.condition.wait(&mut signaled);
        }
    }

    /// Block until signaled or until `timeout` elapses.
    ///
    /// Returns `true` if the signal was observed, `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.condition.wait_until(&mut signaled, deadline).timed_out() {
                return *signaled;
            }
        }
        true
    }

    /// Whether a signal is currently pending
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }
}

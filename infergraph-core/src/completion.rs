//! Run-scoped completion signalling between the terminal stage and the driver

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Outcome of waiting on a [`CompletionSignal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The terminal stage raised the signal before the timeout elapsed
    Ready,

    /// The timeout elapsed without the signal being raised
    TimedOut,
}

/// One-shot completion flag, observable by any number of waiters
///
/// The terminal stage raises the signal at most once per run; every
/// concurrent waiter observes the same result. The signal is scoped to one
/// run: call [`CompletionSignal::reset`] before injecting the next run,
/// otherwise a stale ready flag would satisfy the wait immediately.
pub struct CompletionSignal {
    /// Whether the current run has completed
    ready: Mutex<bool>,

    /// Wakes waiters when the flag flips
    cond: Condvar,
}

impl CompletionSignal {
    /// Create an unraised signal
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Raise the signal and wake all waiters
    ///
    /// Raising an already-raised signal is a no-op, so a terminal stage
    /// that keeps delivering messages after completion never re-notifies.
    pub fn signal(&self) {
        let mut ready = self.ready.lock().unwrap();
        if !*ready {
            *ready = true;
            self.cond.notify_all();
        }
    }

    /// Whether the signal has been raised for the current run
    pub fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap()
    }

    /// Rearm the signal for a new run
    pub fn reset(&self) {
        let mut ready = self.ready.lock().unwrap();
        *ready = false;
    }

    /// Block until the signal is raised or `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> CompletionStatus {
        let ready = self.ready.lock().unwrap();
        let (ready, _) = self
            .cond
            .wait_timeout_while(ready, timeout, |ready| !*ready)
            .unwrap();

        if *ready {
            CompletionStatus::Ready
        } else {
            CompletionStatus::TimedOut
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_after_signal_returns_ready() {
        let signal = CompletionSignal::new();
        signal.signal();
        assert_eq!(
            signal.wait_timeout(Duration::from_millis(10)),
            CompletionStatus::Ready
        );
    }

    #[test]
    fn test_wait_without_signal_times_out() {
        let signal = CompletionSignal::new();
        assert_eq!(
            signal.wait_timeout(Duration::from_millis(20)),
            CompletionStatus::TimedOut
        );
    }

    #[test]
    fn test_concurrent_waiters_observe_one_signal() {
        let signal = Arc::new(CompletionSignal::new());

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let signal = Arc::clone(&signal);
                thread::spawn(move || signal.wait_timeout(Duration::from_secs(5)))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        signal.signal();
        signal.signal();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), CompletionStatus::Ready);
        }
    }

    #[test]
    fn test_concurrent_waiters_time_out_together() {
        let signal = Arc::new(CompletionSignal::new());

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let signal = Arc::clone(&signal);
                thread::spawn(move || signal.wait_timeout(Duration::from_millis(30)))
            })
            .collect();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), CompletionStatus::TimedOut);
        }
    }

    #[test]
    fn test_reset_rearms_for_next_run() {
        let signal = CompletionSignal::new();

        signal.signal();
        assert!(signal.is_ready());

        signal.reset();
        assert!(!signal.is_ready());
        assert_eq!(
            signal.wait_timeout(Duration::from_millis(10)),
            CompletionStatus::TimedOut
        );
    }
}

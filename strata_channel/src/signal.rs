// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Auto-reset wakeup flag for the two-thread ring protocol.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A latching, auto-reset wakeup flag.
///
/// [`set`](Self::set) raises the flag and wakes one waiter. A raised flag
/// stays raised until a [`wait`](Self::wait) consumes it, so a set that
/// lands before the wait is never lost. Each ring direction owns two of
/// these: one raised by the producer when data arrives, one raised by the
/// consumer when space frees up.
#[derive(Debug, Default)]
pub struct Signal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    /// Creates a lowered signal.
    pub const fn new() -> Self {
        Self {
            raised: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Raises the flag and wakes one waiter.
    pub fn set(&self) {
        let mut raised = self.raised.lock().unwrap();
        *raised = true;
        self.cond.notify_one();
    }

    /// Blocks until the flag is raised, then lowers it.
    ///
    /// Returns `false` if `timeout` elapsed with the flag still lowered.
    /// With `timeout == None` this always returns `true`.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let raised = self.raised.lock().unwrap();
        match timeout {
            None => {
                let mut raised = self
                    .cond
                    .wait_while(raised, |raised| !*raised)
                    .unwrap();
                *raised = false;
                true
            }
            Some(timeout) => {
                let (mut raised, result) = self
                    .cond
                    .wait_timeout_while(raised, timeout, |raised| !*raised)
                    .unwrap();
                if result.timed_out() && !*raised {
                    false
                } else {
                    *raised = false;
                    true
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn set_before_wait_returns_immediately() {
        let signal = Signal::new();
        signal.set();
        assert!(signal.wait(Some(Duration::ZERO)));
    }

    #[test]
    fn wait_times_out_without_a_set() {
        let signal = Signal::new();
        assert!(!signal.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn set_wakes_a_blocked_waiter() {
        let signal = Arc::new(Signal::new());
        let setter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                signal.set();
            })
        };
        assert!(signal.wait(None));
        setter.join().unwrap();
    }

    #[test]
    fn flag_resets_after_each_wait() {
        let signal = Signal::new();
        signal.set();
        assert!(signal.wait(None));
        assert!(!signal.wait(Some(Duration::from_millis(5))));
    }
}

// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Liveness bookkeeping for the worker thread.
//!
//! The worker brackets every command dispatch with [`Watchdog::begin`]
//! and [`Watchdog::end`] and ticks a frame counter after each presented
//! frame. Any other thread can take a [`WatchdogReport`] snapshot to
//! see whether the worker is stuck inside a dispatch and for how long,
//! without stopping or locking the worker.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Shared dispatch-liveness state.
///
/// All fields are atomics; readers may observe a report torn across a
/// dispatch boundary, which at worst misattributes one command.
#[derive(Debug, Default)]
pub struct Watchdog {
    command: AtomicU32,
    started_nanos: AtomicU64,
    in_dispatch: AtomicBool,
    frames: AtomicU64,
}

/// A point-in-time snapshot of the worker's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchdogReport {
    /// The command id last entered, 0 before the first dispatch.
    pub command: u32,
    /// Whether the worker is currently inside that dispatch.
    pub in_dispatch: bool,
    /// Nanoseconds spent in the current dispatch, 0 when idle.
    pub elapsed_nanos: u64,
    /// Frames presented since startup.
    pub frames: u64,
}

impl Watchdog {
    /// Creates an idle watchdog.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            command: AtomicU32::new(0),
            started_nanos: AtomicU64::new(0),
            in_dispatch: AtomicBool::new(false),
            frames: AtomicU64::new(0),
        }
    }

    /// Marks dispatch entry for `command` at `now_nanos` since the
    /// runtime epoch.
    pub fn begin(&self, command: u32, now_nanos: u64) {
        self.command.store(command, Ordering::Relaxed);
        self.started_nanos.store(now_nanos, Ordering::Relaxed);
        self.in_dispatch.store(true, Ordering::Release);
    }

    /// Marks dispatch exit.
    pub fn end(&self) {
        self.in_dispatch.store(false, Ordering::Release);
    }

    /// Counts one presented frame.
    pub fn frame_tick(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot at `now_nanos` since the runtime epoch.
    #[must_use]
    pub fn report(&self, now_nanos: u64) -> WatchdogReport {
        let in_dispatch = self.in_dispatch.load(Ordering::Acquire);
        let started = self.started_nanos.load(Ordering::Relaxed);
        WatchdogReport {
            command: self.command.load(Ordering::Relaxed),
            in_dispatch,
            elapsed_nanos: if in_dispatch {
                now_nanos.saturating_sub(started)
            } else {
                0
            },
            frames: self.frames.load(Ordering::Relaxed),
        }
    }
}

/// Converts a duration to whole nanoseconds, saturating at `u64::MAX`.
pub(crate) fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_reports_carry_no_elapsed_time() {
        let dog = Watchdog::new();
        let report = dog.report(1_000);
        assert!(!report.in_dispatch);
        assert_eq!(report.elapsed_nanos, 0);
        assert_eq!(report.frames, 0);
    }

    #[test]
    fn a_dispatch_in_flight_is_visible_with_its_age() {
        let dog = Watchdog::new();
        dog.begin(7, 500);
        let report = dog.report(2_500);
        assert!(report.in_dispatch);
        assert_eq!(report.command, 7);
        assert_eq!(report.elapsed_nanos, 2_000);

        dog.end();
        let report = dog.report(9_999);
        assert!(!report.in_dispatch);
        assert_eq!(report.command, 7, "last command id survives");
        assert_eq!(report.elapsed_nanos, 0);
    }

    #[test]
    fn frame_ticks_accumulate() {
        let dog = Watchdog::new();
        dog.frame_tick();
        dog.frame_tick();
        dog.frame_tick();
        assert_eq!(dog.report(0).frames, 3);
    }

    #[test]
    fn clock_skew_saturates_instead_of_wrapping() {
        let dog = Watchdog::new();
        dog.begin(1, 5_000);
        assert_eq!(dog.report(4_000).elapsed_nanos, 0);
    }

    #[test]
    fn durations_convert_to_saturating_nanos() {
        assert_eq!(duration_nanos(Duration::from_micros(3)), 3_000);
        assert_eq!(duration_nanos(Duration::MAX), u64::MAX);
    }
}

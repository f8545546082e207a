// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame summaries synthesized from the live event stream.
//!
//! The core pipeline emits phase begin/end markers but never reads a
//! clock, so it cannot produce a [`FrameSummary`] itself. [`SummarySink`]
//! wraps any sink, stamps the phase markers on arrival, and inserts a
//! summary for each frame into the forwarded stream: at the next
//! frame's begin event, or when the sink is dropped.

use std::fmt;
use std::time::Instant;

use strata_core::geometry::Rect;
use strata_core::trace::{
    DriverFallbackEvent, DroppedCommandEvent, FrameBeginEvent, FrameSummary, FrameSummaryBuilder,
    FreezeTimeoutEvent, PageFlipEvent, PhaseBeginEvent, PhaseEndEvent, PresentEvent, RepaintEvent,
    TraceSink, TransactionEvent, VisibleChangeEvent, WatchdogStallEvent,
};

/// Wraps a sink and inserts one [`FrameSummary`] per observed frame.
pub struct SummarySink<S: TraceSink> {
    inner: S,
    epoch: Instant,
    pending: Option<Pending>,
}

struct Pending {
    builder: FrameSummaryBuilder,
    presented: bool,
    flips: u32,
    damage: Rect,
}

impl<S: TraceSink> fmt::Debug for SummarySink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarySink").finish_non_exhaustive()
    }
}

impl<S: TraceSink> SummarySink<S> {
    /// Wraps `inner`; phase durations count from this moment's clock.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            epoch: Instant::now(),
            pending: None,
        }
    }

    fn nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Finishes the pending frame, if any, and hands its summary to the
    /// inner sink.
    fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            let Pending {
                mut builder,
                presented,
                flips,
                damage,
            } = pending;
            builder.set_outcome(presented, flips, damage);
            self.inner.on_frame_summary(&builder.finish());
        }
    }
}

impl<S: TraceSink> Drop for SummarySink<S> {
    fn drop(&mut self) {
        self.flush();
    }
}

impl<S: TraceSink> TraceSink for SummarySink<S> {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        self.flush();
        self.pending = Some(Pending {
            builder: FrameSummaryBuilder::new(e.frame_index),
            presented: false,
            flips: 0,
            damage: Rect::EMPTY,
        });
        self.inner.on_frame_begin(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let nanos = self.nanos();
        if let Some(pending) = &mut self.pending {
            pending.builder.phase_begin(e.phase, nanos);
        }
        self.inner.on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let nanos = self.nanos();
        if let Some(pending) = &mut self.pending {
            pending.builder.phase_end(e.phase, nanos);
        }
        self.inner.on_phase_end(e);
    }

    fn on_transaction(&mut self, e: &TransactionEvent) {
        self.inner.on_transaction(e);
    }

    fn on_page_flip(&mut self, e: &PageFlipEvent) {
        if let Some(pending) = &mut self.pending {
            pending.flips += 1;
        }
        self.inner.on_page_flip(e);
    }

    fn on_repaint(&mut self, e: &RepaintEvent) {
        if let Some(pending) = &mut self.pending {
            pending.damage = e.damage_bounds;
        }
        self.inner.on_repaint(e);
    }

    fn on_present(&mut self, e: &PresentEvent) {
        if let Some(pending) = &mut self.pending {
            pending.presented = true;
        }
        self.inner.on_present(e);
    }

    fn on_dropped_command(&mut self, e: &DroppedCommandEvent) {
        self.inner.on_dropped_command(e);
    }

    fn on_driver_fallback(&mut self, e: &DriverFallbackEvent) {
        self.inner.on_driver_fallback(e);
    }

    fn on_watchdog_stall(&mut self, e: &WatchdogStallEvent) {
        self.inner.on_watchdog_stall(e);
    }

    fn on_freeze_timeout(&mut self, e: &FreezeTimeoutEvent) {
        self.inner.on_freeze_timeout(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.inner.on_frame_summary(s);
    }

    fn on_visible_change(&mut self, e: &VisibleChangeEvent) {
        self.inner.on_visible_change(e);
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[Rect]) {
        self.inner.on_damage_rects(frame_index, rects);
    }
}

// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A sink that fans every event out to two inner sinks.

use std::fmt;

use strata_core::geometry::Rect;
use strata_core::trace::{
    DriverFallbackEvent, DroppedCommandEvent, FrameBeginEvent, FrameSummary, FreezeTimeoutEvent,
    PageFlipEvent, PhaseBeginEvent, PhaseEndEvent, PresentEvent, RepaintEvent, TraceSink,
    TransactionEvent, VisibleChangeEvent, WatchdogStallEvent,
};

/// Forwards every event to two sinks in order.
///
/// Useful when one recipient wants the live stream and another wants a
/// recording, for example a [`PrettyPrintSink`](crate::pretty::PrettyPrintSink)
/// on stderr alongside a [`RecorderSink`](crate::recorder::RecorderSink).
/// Nest tees to fan out further.
pub struct TeeSink<A, B> {
    a: A,
    b: B,
}

impl<A, B> TeeSink<A, B> {
    /// Creates a tee over the two sinks. `a` sees each event first.
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<A, B> fmt::Debug for TeeSink<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeeSink").finish_non_exhaustive()
    }
}

impl<A: TraceSink, B: TraceSink> TraceSink for TeeSink<A, B> {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        self.a.on_frame_begin(e);
        self.b.on_frame_begin(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.a.on_phase_begin(e);
        self.b.on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.a.on_phase_end(e);
        self.b.on_phase_end(e);
    }

    fn on_transaction(&mut self, e: &TransactionEvent) {
        self.a.on_transaction(e);
        self.b.on_transaction(e);
    }

    fn on_page_flip(&mut self, e: &PageFlipEvent) {
        self.a.on_page_flip(e);
        self.b.on_page_flip(e);
    }

    fn on_repaint(&mut self, e: &RepaintEvent) {
        self.a.on_repaint(e);
        self.b.on_repaint(e);
    }

    fn on_present(&mut self, e: &PresentEvent) {
        self.a.on_present(e);
        self.b.on_present(e);
    }

    fn on_dropped_command(&mut self, e: &DroppedCommandEvent) {
        self.a.on_dropped_command(e);
        self.b.on_dropped_command(e);
    }

    fn on_driver_fallback(&mut self, e: &DriverFallbackEvent) {
        self.a.on_driver_fallback(e);
        self.b.on_driver_fallback(e);
    }

    fn on_watchdog_stall(&mut self, e: &WatchdogStallEvent) {
        self.a.on_watchdog_stall(e);
        self.b.on_watchdog_stall(e);
    }

    fn on_freeze_timeout(&mut self, e: &FreezeTimeoutEvent) {
        self.a.on_freeze_timeout(e);
        self.b.on_freeze_timeout(e);
    }

    fn on_frame_summary(&mut self, e: &FrameSummary) {
        self.a.on_frame_summary(e);
        self.b.on_frame_summary(e);
    }

    fn on_visible_change(&mut self, e: &VisibleChangeEvent) {
        self.a.on_visible_change(e);
        self.b.on_visible_change(e);
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[Rect]) {
        self.a.on_damage_rects(frame_index, rects);
        self.b.on_damage_rects(frame_index, rects);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{RecordedEvent, RecorderSink, decode};

    #[test]
    fn both_sinks_see_every_event() {
        let left = RecorderSink::new();
        let right = RecorderSink::new();
        let mut tee = TeeSink::new(left.clone(), right.clone());

        tee.on_frame_begin(&FrameBeginEvent { frame_index: 9 });
        tee.on_page_flip(&PageFlipEvent {
            frame_index: 9,
            layer: 2,
            slot: 1,
        });

        for bytes in [left.bytes(), right.bytes()] {
            let events: Vec<_> = decode(&bytes).map(|r| r.event).collect();
            assert_eq!(events.len(), 2);
            assert!(matches!(
                events[0],
                RecordedEvent::FrameBegin(FrameBeginEvent { frame_index: 9 })
            ));
            assert!(matches!(
                events[1],
                RecordedEvent::PageFlip(PageFlipEvent {
                    frame_index: 9,
                    layer: 2,
                    slot: 1,
                })
            ));
        }
    }
}

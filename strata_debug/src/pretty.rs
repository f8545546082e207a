// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per
//! event to a [`Write`](std::io::Write) destination (default: stderr).
//! Lines are stamped with microseconds since the sink was created.

use std::io::Write;
use std::time::Instant;

use strata_core::geometry::Rect;
use strata_core::trace::{
    DriverFallbackEvent, DroppedCommandEvent, FrameBeginEvent, FrameSummary, FreezeTimeoutEvent,
    PageFlipEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, PresentEvent, RepaintEvent,
    TraceSink, TransactionEvent, VisibleChangeEvent, WatchdogStallEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write)
/// destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
    epoch: Instant,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            epoch: Instant::now(),
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            epoch: Instant::now(),
        }
    }

    fn now_us(&self) -> f64 {
        self.epoch.elapsed().as_nanos() as f64 / 1000.0
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Transaction => "txn",
        PhaseKind::PageFlip => "flip",
        PhaseKind::Visibility => "visibility",
        PhaseKind::Repaint => "repaint",
        PhaseKind::Present => "present",
    }
}

fn us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[frame] index={} at {:.1}µs",
            e.frame_index,
            self.now_us(),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            phase_name(e.phase),
            self.now_us(),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            phase_name(e.phase),
            self.now_us(),
        );
    }

    fn on_transaction(&mut self, e: &TransactionEvent) {
        let _ = writeln!(
            self.writer,
            "[txn] frame={} committed={} geometry={}",
            e.frame_index, e.committed, e.geometry_changed,
        );
    }

    fn on_page_flip(&mut self, e: &PageFlipEvent) {
        let _ = writeln!(
            self.writer,
            "[flip] frame={} layer={} slot={}",
            e.frame_index, e.layer, e.slot,
        );
    }

    fn on_repaint(&mut self, e: &RepaintEvent) {
        let _ = writeln!(
            self.writer,
            "[repaint] frame={} damage={:?} items={}",
            e.frame_index, e.damage_bounds, e.items,
        );
    }

    fn on_present(&mut self, e: &PresentEvent) {
        let _ = writeln!(
            self.writer,
            "[present] frame={} overlay={} framebuffer={} fallback={}",
            e.frame_index, e.overlay_items, e.framebuffer_items, e.fallback,
        );
    }

    fn on_dropped_command(&mut self, e: &DroppedCommandEvent) {
        let _ = writeln!(
            self.writer,
            "[drop] command={} reason={}",
            e.command, e.reason,
        );
    }

    fn on_driver_fallback(&mut self, e: &DriverFallbackEvent) {
        let _ = writeln!(
            self.writer,
            "[fallback] frame={} reason={}",
            e.frame_index, e.reason,
        );
    }

    fn on_watchdog_stall(&mut self, e: &WatchdogStallEvent) {
        let _ = writeln!(
            self.writer,
            "[stall] command={} running for {:.1}µs",
            e.command,
            us(e.nanos),
        );
    }

    fn on_freeze_timeout(&mut self, e: &FreezeTimeoutEvent) {
        let _ = writeln!(
            self.writer,
            "[thaw] display frozen for {:.1}µs, forcing unfreeze",
            us(e.nanos),
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} presented={} flips={} txn={:.1}µs flip={:.1}µs \
             visibility={:.1}µs repaint={:.1}µs present={:.1}µs",
            s.frame_index,
            s.presented,
            s.flips,
            us(s.transaction_nanos),
            us(s.page_flip_nanos),
            us(s.visibility_nanos),
            us(s.repaint_nanos),
            us(s.present_nanos),
        );
    }

    fn on_visible_change(&mut self, e: &VisibleChangeEvent) {
        let _ = writeln!(
            self.writer,
            "[visible] frame={} layer={} bounds={:?}",
            e.frame_index, e.layer, e.visible_bounds,
        );
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[Rect]) {
        let _ = writeln!(
            self.writer,
            "[damage] frame={frame_index} rects={}",
            rects.len(),
        );
    }
}

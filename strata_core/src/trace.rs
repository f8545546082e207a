// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the composition loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! frame pipeline and the command dispatcher call at each stage. All method
//! bodies default to no-ops, so implementing only the events you care about
//! is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace`
//! feature is **off**, every `Tracer` method compiles to nothing (zero
//! overhead). When **on**, each method performs a single `Option` branch
//! before dispatching.
//!
//! Core code never reads a clock; events carry counters and identities only.
//! [`FrameSummaryBuilder`] collects caller-supplied phase timestamps (the
//! service thread's monotonic clock, plain integers in tests) and produces a
//! [`FrameSummary`] at the end of a frame.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) — gates [`VisibleChangeEvent`] and
//!   per-frame damage-rect reporting plus the corresponding `TraceSink`
//!   methods.

use crate::geometry::Rect;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of the frame pipeline is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Committing pending layer transactions.
    Transaction,
    /// Retiring queued client buffers.
    PageFlip,
    /// The visible-region sweep.
    Visibility,
    /// Building the composition list and drawing fallback layers.
    Repaint,
    /// Handing the frame to the display.
    Present,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Marks the start of one compositor frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameBeginEvent {
    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Marks the beginning of a frame phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
}

/// Marks the end of a frame phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
}

/// Emitted after pending transactions are committed.
#[derive(Clone, Copy, Debug)]
pub struct TransactionEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// How many layers had state committed.
    pub committed: u32,
    /// Whether visible regions must be recomputed.
    pub geometry_changed: bool,
}

/// Emitted when a layer's queued buffer is retired to front.
#[derive(Clone, Copy, Debug)]
pub struct PageFlipEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Slot index of the layer in the store.
    pub layer: u32,
    /// Which buffer slot became the front buffer.
    pub slot: u32,
}

/// Emitted when a frame has non-empty damage to redraw.
#[derive(Clone, Copy, Debug)]
pub struct RepaintEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Bounding box of the screen damage.
    pub damage_bounds: Rect,
    /// Number of entries in the composition list.
    pub items: u32,
}

/// Emitted when a frame reaches the display.
#[derive(Clone, Copy, Debug)]
pub struct PresentEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Items the driver composed directly.
    pub overlay_items: u32,
    /// Items drawn on the GPU path.
    pub framebuffer_items: u32,
    /// Whether presentation used the swap-buffers fallback.
    pub fallback: bool,
}

/// Emitted when a malformed or stale command is dropped instead of applied.
#[derive(Clone, Copy, Debug)]
pub struct DroppedCommandEvent {
    /// Wire id of the offending command.
    pub command: u32,
    /// Why it was dropped.
    pub reason: &'static str,
}

/// Emitted when overlay composition is unavailable and the frame reverts to
/// the GPU path.
#[derive(Clone, Copy, Debug)]
pub struct DriverFallbackEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Driver-reported reason.
    pub reason: &'static str,
}

/// Emitted when a dispatched command exceeds its deadline but the runtime
/// proceeds anyway.
#[derive(Clone, Copy, Debug)]
pub struct WatchdogStallEvent {
    /// Wire id of the slow command.
    pub command: u32,
    /// How long the command has been running.
    pub nanos: u64,
}

/// Emitted when a frozen display is forcibly thawed because no unfreeze
/// arrived within the configured timeout.
#[derive(Clone, Copy, Debug)]
pub struct FreezeTimeoutEvent {
    /// How long the display had been frozen.
    pub nanos: u64,
}

/// Per-frame summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Whether the frame reached the display.
    pub presented: bool,
    /// Buffers retired this frame.
    pub flips: u32,
    /// Bounding box of the frame's damage.
    pub damage_bounds: Rect,
    /// Transaction phase duration in nanoseconds (0 if not measured).
    pub transaction_nanos: u64,
    /// Page-flip phase duration in nanoseconds (0 if not measured).
    pub page_flip_nanos: u64,
    /// Visibility phase duration in nanoseconds (0 if not measured).
    pub visibility_nanos: u64,
    /// Repaint phase duration in nanoseconds (0 if not measured).
    pub repaint_nanos: u64,
    /// Present phase duration in nanoseconds (0 if not measured).
    pub present_nanos: u64,
}

/// Reports a layer's recomputed visible region.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct VisibleChangeEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Slot index of the layer in the store.
    pub layer: u32,
    /// Bounding box of the new visible region.
    pub visible_bounds: Rect,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the composition loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the start of each compositor frame.
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        _ = e;
    }

    /// Called at the beginning of a frame phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a frame phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after transactions are committed.
    fn on_transaction(&mut self, e: &TransactionEvent) {
        _ = e;
    }

    /// Called for every buffer retired to front.
    fn on_page_flip(&mut self, e: &PageFlipEvent) {
        _ = e;
    }

    /// Called when a frame has damage to redraw.
    fn on_repaint(&mut self, e: &RepaintEvent) {
        _ = e;
    }

    /// Called when a frame is handed to the display.
    fn on_present(&mut self, e: &PresentEvent) {
        _ = e;
    }

    /// Called when a command is dropped instead of applied.
    fn on_dropped_command(&mut self, e: &DroppedCommandEvent) {
        _ = e;
    }

    /// Called when composition reverts to the GPU path.
    fn on_driver_fallback(&mut self, e: &DriverFallbackEvent) {
        _ = e;
    }

    /// Called when a command overruns its deadline.
    fn on_watchdog_stall(&mut self, e: &WatchdogStallEvent) {
        _ = e;
    }

    /// Called when a frozen display is forcibly thawed.
    fn on_freeze_timeout(&mut self, e: &FreezeTimeoutEvent) {
        _ = e;
    }

    /// Called with a per-frame summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called per layer whose visible region changed (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_visible_change(&mut self, e: &VisibleChangeEvent) {
        _ = e;
    }

    /// Called with the frame's exact damage rects (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_damage_rects(&mut self, frame_index: u64, rects: &[Rect]) {
        _ = (frame_index, rects);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing.
/// When **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`FrameBeginEvent`].
    #[inline]
    pub fn frame_begin(&mut self, e: &FrameBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TransactionEvent`].
    #[inline]
    pub fn transaction(&mut self, e: &TransactionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_transaction(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PageFlipEvent`].
    #[inline]
    pub fn page_flip(&mut self, e: &PageFlipEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_page_flip(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RepaintEvent`].
    #[inline]
    pub fn repaint(&mut self, e: &RepaintEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_repaint(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PresentEvent`].
    #[inline]
    pub fn present(&mut self, e: &PresentEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_present(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DroppedCommandEvent`].
    #[inline]
    pub fn dropped_command(&mut self, e: &DroppedCommandEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_dropped_command(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DriverFallbackEvent`].
    #[inline]
    pub fn driver_fallback(&mut self, e: &DriverFallbackEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_driver_fallback(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`WatchdogStallEvent`].
    #[inline]
    pub fn watchdog_stall(&mut self, e: &WatchdogStallEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_watchdog_stall(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FreezeTimeoutEvent`].
    #[inline]
    pub fn freeze_timeout(&mut self, e: &FreezeTimeoutEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_freeze_timeout(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_frame_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits a [`VisibleChangeEvent`] (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn visible_change(&mut self, e: &VisibleChangeEvent) {
        if let Some(s) = &mut self.sink {
            s.on_visible_change(e);
        }
    }

    /// Emits damage rectangles (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn damage_rects(&mut self, frame_index: u64, rects: &[Rect]) {
        if let Some(s) = &mut self.sink {
            s.on_damage_rects(frame_index, rects);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a frame and produces a [`FrameSummary`].
///
/// Timestamps are plain monotonic nanosecond readings supplied by the
/// caller; the core never reads a clock itself.
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    frame_index: u64,
    presented: bool,
    flips: u32,
    damage_bounds: Rect,
    phase_starts: [Option<u64>; 5],
    phase_ends: [Option<u64>; 5],
}

impl FrameSummaryBuilder {
    /// Starts building a summary for the given frame.
    #[must_use]
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            presented: false,
            flips: 0,
            damage_bounds: Rect::EMPTY,
            phase_starts: [None; 5],
            phase_ends: [None; 5],
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, nanos: u64) {
        self.phase_starts[phase_index(phase)] = Some(nanos);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, nanos: u64) {
        self.phase_ends[phase_index(phase)] = Some(nanos);
    }

    /// Records the frame's outcome.
    pub fn set_outcome(&mut self, presented: bool, flips: u32, damage_bounds: Rect) {
        self.presented = presented;
        self.flips = flips;
        self.damage_bounds = damage_bounds;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.frame_index,
            presented: self.presented,
            flips: self.flips,
            damage_bounds: self.damage_bounds,
            transaction_nanos: self.phase_duration(PhaseKind::Transaction),
            page_flip_nanos: self.phase_duration(PhaseKind::PageFlip),
            visibility_nanos: self.phase_duration(PhaseKind::Visibility),
            repaint_nanos: self.phase_duration(PhaseKind::Repaint),
            present_nanos: self.phase_duration(PhaseKind::Present),
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Transaction => 0,
        PhaseKind::PageFlip => 1,
        PhaseKind::Visibility => 2,
        PhaseKind::Repaint => 3,
        PhaseKind::Present => 4,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_frame_begin(&FrameBeginEvent { frame_index: 0 });
        sink.on_transaction(&TransactionEvent {
            frame_index: 0,
            committed: 2,
            geometry_changed: true,
        });
        sink.on_frame_summary(&FrameSummaryBuilder::new(0).finish());
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.frame_begin(&FrameBeginEvent { frame_index: 3 });
        tracer.page_flip(&PageFlipEvent {
            frame_index: 3,
            layer: 0,
            slot: 1,
        });
    }

    #[test]
    fn summary_builder_computes_durations() {
        let mut builder = FrameSummaryBuilder::new(42);
        builder.phase_begin(PhaseKind::Transaction, 1_000_000);
        builder.phase_end(PhaseKind::Transaction, 1_000_100);
        builder.phase_begin(PhaseKind::Visibility, 1_000_100);
        builder.phase_end(PhaseKind::Visibility, 1_000_500);
        builder.phase_begin(PhaseKind::Present, 1_002_000);
        builder.phase_end(PhaseKind::Present, 1_002_050);
        builder.set_outcome(true, 1, Rect::new(0, 0, 64, 64));

        let summary = builder.finish();
        assert_eq!(summary.frame_index, 42);
        assert_eq!(summary.transaction_nanos, 100);
        assert_eq!(summary.visibility_nanos, 400);
        assert_eq!(summary.present_nanos, 50);
        assert_eq!(summary.page_flip_nanos, 0, "unmeasured phases are zero");
        assert!(summary.presented);
        assert_eq!(summary.damage_bounds, Rect::new(0, 0, 64, 64));
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            flips: Vec<(u32, u32)>,
        }
        impl TraceSink for RecordingSink {
            fn on_page_flip(&mut self, e: &PageFlipEvent) {
                self.flips.push((e.layer, e.slot));
            }
        }

        let mut sink = RecordingSink { flips: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.page_flip(&PageFlipEvent {
            frame_index: 1,
            layer: 4,
            slot: 0,
        });
        drop(tracer);
        assert_eq!(sink.flips, &[(4, 0)]);
    }
}

// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! shared buffer as fixed-size little-endian records, each stamped with
//! nanoseconds since the recorder was created. [`decode`] reads them back
//! as an iterator of [`Record`]s.
//!
//! Clones of a recorder share one buffer. The runtime takes ownership of
//! the sink it traces with, so keep a clone and call
//! [`bytes`](RecorderSink::bytes) on it once the runtime is gone.
//!
//! Rich damage-rect batches ([`on_damage_rects`](TraceSink::on_damage_rects))
//! store only the count.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use strata_core::geometry::Rect;
use strata_core::trace::{
    DriverFallbackEvent, DroppedCommandEvent, FrameBeginEvent, FrameSummary, FreezeTimeoutEvent,
    PageFlipEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, PresentEvent, RepaintEvent,
    TraceSink, TransactionEvent, VisibleChangeEvent, WatchdogStallEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_BEGIN: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_TRANSACTION: u8 = 4;
const TAG_PAGE_FLIP: u8 = 5;
const TAG_REPAINT: u8 = 6;
const TAG_PRESENT: u8 = 7;
const TAG_DROPPED_COMMAND: u8 = 8;
const TAG_DRIVER_FALLBACK: u8 = 9;
const TAG_WATCHDOG_STALL: u8 = 10;
const TAG_FREEZE_TIMEOUT: u8 = 11;
const TAG_FRAME_SUMMARY: u8 = 12;
const TAG_VISIBLE_CHANGE: u8 = 13;
const TAG_DAMAGE_RECTS_COUNT: u8 = 14;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes timestamped events into a shared buffer.
#[derive(Clone, Debug)]
pub struct RecorderSink {
    buf: Arc<Mutex<Vec<u8>>>,
    epoch: Instant,
}

impl Default for RecorderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderSink {
    /// Creates an empty recorder; timestamps count from this moment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::new())),
            epoch: Instant::now(),
        }
    }

    /// Returns a snapshot of the recorded bytes.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.buf.lock().unwrap().clone()
    }

    // -- encoding helpers --------------------------------------------------

    /// Starts a record: tag byte plus the arrival timestamp.
    fn begin(&self, tag: u8) -> MutexGuard<'_, Vec<u8>> {
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let mut buf = self.buf.lock().unwrap();
        buf.push(tag);
        buf.extend_from_slice(&nanos.to_le_bytes());
        buf
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(u8::from(v));
}

fn put_phase(buf: &mut Vec<u8>, p: PhaseKind) {
    buf.push(match p {
        PhaseKind::Transaction => 0,
        PhaseKind::PageFlip => 1,
        PhaseKind::Visibility => 2,
        PhaseKind::Repaint => 3,
        PhaseKind::Present => 4,
    });
}

fn put_rect(buf: &mut Vec<u8>, r: Rect) {
    put_i32(buf, r.left);
    put_i32(buf, r.top);
    put_i32(buf, r.right);
    put_i32(buf, r.bottom);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "string length capped at u32::MAX for recording"
    )]
    let len = s.len().min(u32::MAX as usize) as u32;
    put_u32(buf, len);
    buf.extend_from_slice(&s.as_bytes()[..len as usize]);
}

fn put_count(buf: &mut Vec<u8>, n: usize) {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "count capped at u32::MAX for recording"
    )]
    put_u32(buf, n.min(u32::MAX as usize) as u32);
}

impl TraceSink for RecorderSink {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        let mut buf = self.begin(TAG_FRAME_BEGIN);
        put_u64(&mut buf, e.frame_index);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let mut buf = self.begin(TAG_PHASE_BEGIN);
        put_u64(&mut buf, e.frame_index);
        put_phase(&mut buf, e.phase);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let mut buf = self.begin(TAG_PHASE_END);
        put_u64(&mut buf, e.frame_index);
        put_phase(&mut buf, e.phase);
    }

    fn on_transaction(&mut self, e: &TransactionEvent) {
        let mut buf = self.begin(TAG_TRANSACTION);
        put_u64(&mut buf, e.frame_index);
        put_u32(&mut buf, e.committed);
        put_bool(&mut buf, e.geometry_changed);
    }

    fn on_page_flip(&mut self, e: &PageFlipEvent) {
        let mut buf = self.begin(TAG_PAGE_FLIP);
        put_u64(&mut buf, e.frame_index);
        put_u32(&mut buf, e.layer);
        put_u32(&mut buf, e.slot);
    }

    fn on_repaint(&mut self, e: &RepaintEvent) {
        let mut buf = self.begin(TAG_REPAINT);
        put_u64(&mut buf, e.frame_index);
        put_rect(&mut buf, e.damage_bounds);
        put_u32(&mut buf, e.items);
    }

    fn on_present(&mut self, e: &PresentEvent) {
        let mut buf = self.begin(TAG_PRESENT);
        put_u64(&mut buf, e.frame_index);
        put_u32(&mut buf, e.overlay_items);
        put_u32(&mut buf, e.framebuffer_items);
        put_bool(&mut buf, e.fallback);
    }

    fn on_dropped_command(&mut self, e: &DroppedCommandEvent) {
        let mut buf = self.begin(TAG_DROPPED_COMMAND);
        put_u32(&mut buf, e.command);
        put_str(&mut buf, e.reason);
    }

    fn on_driver_fallback(&mut self, e: &DriverFallbackEvent) {
        let mut buf = self.begin(TAG_DRIVER_FALLBACK);
        put_u64(&mut buf, e.frame_index);
        put_str(&mut buf, e.reason);
    }

    fn on_watchdog_stall(&mut self, e: &WatchdogStallEvent) {
        let mut buf = self.begin(TAG_WATCHDOG_STALL);
        put_u32(&mut buf, e.command);
        put_u64(&mut buf, e.nanos);
    }

    fn on_freeze_timeout(&mut self, e: &FreezeTimeoutEvent) {
        let mut buf = self.begin(TAG_FREEZE_TIMEOUT);
        put_u64(&mut buf, e.nanos);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let mut buf = self.begin(TAG_FRAME_SUMMARY);
        put_u64(&mut buf, s.frame_index);
        put_bool(&mut buf, s.presented);
        put_u32(&mut buf, s.flips);
        put_rect(&mut buf, s.damage_bounds);
        put_u64(&mut buf, s.transaction_nanos);
        put_u64(&mut buf, s.page_flip_nanos);
        put_u64(&mut buf, s.visibility_nanos);
        put_u64(&mut buf, s.repaint_nanos);
        put_u64(&mut buf, s.present_nanos);
    }

    fn on_visible_change(&mut self, e: &VisibleChangeEvent) {
        let mut buf = self.begin(TAG_VISIBLE_CHANGE);
        put_u64(&mut buf, e.frame_index);
        put_u32(&mut buf, e.layer);
        put_rect(&mut buf, e.visible_bounds);
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[Rect]) {
        let mut buf = self.begin(TAG_DAMAGE_RECTS_COUNT);
        put_u64(&mut buf, frame_index);
        put_count(&mut buf, rects.len());
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// One decoded record: the event plus its arrival time.
#[derive(Clone, Debug)]
pub struct Record {
    /// Nanoseconds since the recorder was created.
    pub nanos: u64,
    /// The decoded event.
    pub event: RecordedEvent,
}

/// A decoded event from a binary recording.
///
/// Events whose live form borrows a `&'static str` come back with an
/// owned `String` instead.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`FrameBeginEvent`].
    FrameBegin(FrameBeginEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`TransactionEvent`].
    Transaction(TransactionEvent),
    /// A [`PageFlipEvent`].
    PageFlip(PageFlipEvent),
    /// A [`RepaintEvent`].
    Repaint(RepaintEvent),
    /// A [`PresentEvent`].
    Present(PresentEvent),
    /// A dropped command, with its recorded reason.
    DroppedCommand {
        /// Wire id of the offending command.
        command: u32,
        /// Why it was dropped.
        reason: String,
    },
    /// A driver fallback, with its recorded reason.
    DriverFallback {
        /// Frame counter.
        frame_index: u64,
        /// Driver-reported reason.
        reason: String,
    },
    /// A [`WatchdogStallEvent`].
    WatchdogStall(WatchdogStallEvent),
    /// A [`FreezeTimeoutEvent`].
    FreezeTimeout(FreezeTimeoutEvent),
    /// A [`FrameSummary`].
    Summary(FrameSummary),
    /// A [`VisibleChangeEvent`].
    VisibleChange(VisibleChangeEvent),
    /// Damage-rect count for a frame.
    DamageRectsCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of damage rects.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`Record`]s. An unknown tag or a truncated record stops iteration.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded records.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_i32(&mut self) -> Option<i32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = i32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Transaction,
            1 => PhaseKind::PageFlip,
            2 => PhaseKind::Visibility,
            3 => PhaseKind::Repaint,
            _ => PhaseKind::Present,
        })
    }

    fn read_rect(&mut self) -> Option<Rect> {
        Some(Rect::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        ))
    }

    fn read_str(&mut self) -> Option<String> {
        let len = self.read_u32()? as usize;
        if self.remaining() < len {
            return None;
        }
        let s = String::from_utf8_lossy(&self.data[self.pos..self.pos + len]).into_owned();
        self.pos += len;
        Some(s)
    }

    fn decode_event(&mut self, tag: u8) -> Option<RecordedEvent> {
        Some(match tag {
            TAG_FRAME_BEGIN => RecordedEvent::FrameBegin(FrameBeginEvent {
                frame_index: self.read_u64()?,
            }),
            TAG_PHASE_BEGIN => RecordedEvent::PhaseBegin(PhaseBeginEvent {
                frame_index: self.read_u64()?,
                phase: self.read_phase()?,
            }),
            TAG_PHASE_END => RecordedEvent::PhaseEnd(PhaseEndEvent {
                frame_index: self.read_u64()?,
                phase: self.read_phase()?,
            }),
            TAG_TRANSACTION => RecordedEvent::Transaction(TransactionEvent {
                frame_index: self.read_u64()?,
                committed: self.read_u32()?,
                geometry_changed: self.read_bool()?,
            }),
            TAG_PAGE_FLIP => RecordedEvent::PageFlip(PageFlipEvent {
                frame_index: self.read_u64()?,
                layer: self.read_u32()?,
                slot: self.read_u32()?,
            }),
            TAG_REPAINT => RecordedEvent::Repaint(RepaintEvent {
                frame_index: self.read_u64()?,
                damage_bounds: self.read_rect()?,
                items: self.read_u32()?,
            }),
            TAG_PRESENT => RecordedEvent::Present(PresentEvent {
                frame_index: self.read_u64()?,
                overlay_items: self.read_u32()?,
                framebuffer_items: self.read_u32()?,
                fallback: self.read_bool()?,
            }),
            TAG_DROPPED_COMMAND => RecordedEvent::DroppedCommand {
                command: self.read_u32()?,
                reason: self.read_str()?,
            },
            TAG_DRIVER_FALLBACK => RecordedEvent::DriverFallback {
                frame_index: self.read_u64()?,
                reason: self.read_str()?,
            },
            TAG_WATCHDOG_STALL => RecordedEvent::WatchdogStall(WatchdogStallEvent {
                command: self.read_u32()?,
                nanos: self.read_u64()?,
            }),
            TAG_FREEZE_TIMEOUT => RecordedEvent::FreezeTimeout(FreezeTimeoutEvent {
                nanos: self.read_u64()?,
            }),
            TAG_FRAME_SUMMARY => RecordedEvent::Summary(FrameSummary {
                frame_index: self.read_u64()?,
                presented: self.read_bool()?,
                flips: self.read_u32()?,
                damage_bounds: self.read_rect()?,
                transaction_nanos: self.read_u64()?,
                page_flip_nanos: self.read_u64()?,
                visibility_nanos: self.read_u64()?,
                repaint_nanos: self.read_u64()?,
                present_nanos: self.read_u64()?,
            }),
            TAG_VISIBLE_CHANGE => RecordedEvent::VisibleChange(VisibleChangeEvent {
                frame_index: self.read_u64()?,
                layer: self.read_u32()?,
                visible_bounds: self.read_rect()?,
            }),
            TAG_DAMAGE_RECTS_COUNT => RecordedEvent::DamageRectsCount {
                frame_index: self.read_u64()?,
                count: self.read_u32()?,
            },
            _ => return None, // unknown tag → stop iteration
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        let nanos = self.read_u64()?;
        let event = self.decode_event(tag)?;
        Some(Record { nanos, event })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

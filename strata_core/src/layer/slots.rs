// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lock-free buffer-slot hand-off between one producer and the compositor.
//!
//! Each layer owns a fixed pool of 2..=32 buffer slots cycled in strict
//! round-robin order. The producer thread walks them through
//! `Free → Dequeued → Queued`; the compositor, once per frame, retires the
//! oldest queued buffer to `Front` (the displayed buffer), holding the
//! previous front `Locked` until the flip completes and
//! [`release_retired`](BufferSlots::release_retired) frees it.
//!
//! All coordination is four monotone operation counters plus per-slot payload
//! cells. The counters are the only synchronization: the producer publishes
//! payload with a release bump of the queue counter, the compositor acquires
//! it when it observes the bump, and the release counter does the same in the
//! opposite direction for slot reuse. Round-robin order makes retirement
//! order equal submission order by construction.
//!
//! The dirty hint crosses threads as a small flat rect array (collapsing to
//! its bounds past [`MAX_DIRTY_RECTS`]), published under the same counter
//! protocol.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use crate::geometry::Rect;
use crate::layer::id::BufferHandle;
use crate::region::Region;

/// Maximum dirty rects carried per queued buffer before collapsing to bounds.
pub const MAX_DIRTY_RECTS: usize = 4;

/// Observable state of one buffer slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Ready for the producer to dequeue.
    Free,
    /// Held by the producer for writing.
    Dequeued,
    /// Submitted, waiting to be retired.
    Queued,
    /// The displayed buffer.
    Front,
    /// Retired away from front, held until the flip completes.
    Locked,
}

/// Errors of the slot state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotError {
    /// Every slot is queued, displayed, or locked.
    NoFreeSlot,
    /// `queue` without a matching `dequeue`.
    NotDequeued,
    /// `queue` for a slot other than the oldest dequeued one.
    OutOfOrder,
    /// `retire_and_lock` with nothing queued; the ordinary "no new frame"
    /// case, not a failure.
    NothingQueued,
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFreeSlot => write!(f, "no free buffer slot"),
            Self::NotDequeued => write!(f, "queue without a dequeued buffer"),
            Self::OutOfOrder => write!(f, "buffers must be queued in dequeue order"),
            Self::NothingQueued => write!(f, "no queued buffer to retire"),
        }
    }
}

impl core::error::Error for SlotError {}

/// Payload published alongside a queued buffer.
struct SlotCell {
    handle: AtomicU64,
    dirty_count: AtomicU32,
    dirty_rects: [[AtomicI32; 4]; MAX_DIRTY_RECTS],
}

impl SlotCell {
    fn new() -> Self {
        Self {
            handle: AtomicU64::new(0),
            dirty_count: AtomicU32::new(0),
            dirty_rects: core::array::from_fn(|_| core::array::from_fn(|_| AtomicI32::new(0))),
        }
    }
}

/// The per-layer slot pool. Shared between exactly one producer thread and
/// the compositor thread; every method takes `&self`.
pub struct BufferSlots {
    cells: Box<[SlotCell]>,
    /// Completed dequeues; instance `k` uses slot `k % n`. Producer-owned.
    dequeued: AtomicU64,
    /// Completed queues. Producer-owned; release-published.
    queued: AtomicU64,
    /// Completed retires. Consumer-owned.
    retired: AtomicU64,
    /// Completed releases. Consumer-owned; release-published.
    released: AtomicU64,
}

impl BufferSlots {
    /// Creates a pool of `n` slots.
    ///
    /// # Panics
    ///
    /// Panics unless `2 <= n <= 32`.
    #[must_use]
    pub fn new(n: usize) -> Self {
        assert!((2..=32).contains(&n), "slot count must be in 2..=32");
        Self {
            cells: (0..n).map(|_| SlotCell::new()).collect::<Vec<_>>().into(),
            dequeued: AtomicU64::new(0),
            queued: AtomicU64::new(0),
            retired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Number of slots in the pool.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn n(&self) -> u64 {
        self.cells.len() as u64
    }

    // -- Producer side -----------------------------------------------------

    /// Claims the next slot for writing, without blocking.
    ///
    /// A slot is reusable only once the compositor has released its previous
    /// occupant, so a producer running far ahead sees
    /// [`SlotError::NoFreeSlot`] until a flip completes.
    pub fn try_dequeue(&self) -> Result<usize, SlotError> {
        let d = self.dequeued.load(Ordering::Relaxed);
        let n = self.n();
        if d >= n {
            // Previous occupant of this slot was instance d - n; it is free
            // once the release counter has passed it by two (one retire to
            // displace it from front, one release to unlock it).
            let l = self.released.load(Ordering::Acquire);
            if l + n < d + 2 {
                return Err(SlotError::NoFreeSlot);
            }
        }
        self.dequeued.store(d + 1, Ordering::Relaxed);
        Ok(slot_of(d, n))
    }

    /// Returns the most recently dequeued slot without queueing it.
    pub fn cancel(&self, slot: usize) -> Result<(), SlotError> {
        let d = self.dequeued.load(Ordering::Relaxed);
        let q = self.queued.load(Ordering::Relaxed);
        if q == d {
            return Err(SlotError::NotDequeued);
        }
        if slot != slot_of(d - 1, self.n()) {
            return Err(SlotError::OutOfOrder);
        }
        self.dequeued.store(d - 1, Ordering::Relaxed);
        Ok(())
    }

    /// Submits a dequeued slot along with its content handle and dirty hint.
    ///
    /// Slots must be queued in dequeue order; `slot` is validated against
    /// the oldest outstanding dequeue.
    pub fn queue(&self, slot: usize, handle: BufferHandle, dirty: &Region) -> Result<(), SlotError> {
        let q = self.queued.load(Ordering::Relaxed);
        let d = self.dequeued.load(Ordering::Relaxed);
        if q == d {
            return Err(SlotError::NotDequeued);
        }
        let expected = slot_of(q, self.n());
        if slot != expected {
            return Err(SlotError::OutOfOrder);
        }
        let cell = &self.cells[expected];
        cell.handle.store(handle.0, Ordering::Relaxed);
        store_dirty(cell, dirty);
        self.queued.store(q + 1, Ordering::Release);
        Ok(())
    }

    /// Whether a queued buffer is waiting to be retired.
    #[must_use]
    pub fn has_queued(&self) -> bool {
        self.retired.load(Ordering::Relaxed) < self.queued.load(Ordering::Acquire)
    }

    // -- Consumer side -----------------------------------------------------

    /// Promotes the oldest queued buffer to front, locking the previous
    /// front until [`release_retired`](Self::release_retired).
    pub fn retire_and_lock(&self) -> Result<usize, SlotError> {
        let q = self.queued.load(Ordering::Acquire);
        let r = self.retired.load(Ordering::Relaxed);
        if r == q {
            return Err(SlotError::NothingQueued);
        }
        self.retired.store(r + 1, Ordering::Relaxed);
        Ok(slot_of(r, self.n()))
    }

    /// Unlocks the buffer displaced by the latest retire. Returns `false`
    /// when every completed flip has already been released.
    pub fn release_retired(&self) -> bool {
        let r = self.retired.load(Ordering::Relaxed);
        let l = self.released.load(Ordering::Relaxed);
        if l >= r {
            return false;
        }
        self.released.store(l + 1, Ordering::Release);
        true
    }

    /// The currently displayed slot, if any frame was ever retired.
    #[must_use]
    pub fn front(&self) -> Option<usize> {
        let r = self.retired.load(Ordering::Relaxed);
        if r == 0 {
            None
        } else {
            Some(slot_of(r - 1, self.n()))
        }
    }

    /// The content handle published with the given slot's latest queue.
    #[must_use]
    pub fn handle(&self, slot: usize) -> BufferHandle {
        BufferHandle(self.cells[slot].handle.load(Ordering::Relaxed))
    }

    /// The dirty hint published with the given slot's latest queue.
    #[must_use]
    pub fn dirty_hint(&self, slot: usize) -> Region {
        let cell = &self.cells[slot];
        let count = cell.dirty_count.load(Ordering::Relaxed) as usize;
        let mut out = Region::new();
        for rect in cell.dirty_rects.iter().take(count.min(MAX_DIRTY_RECTS)) {
            out.or_rect(Rect::new(
                rect[0].load(Ordering::Relaxed),
                rect[1].load(Ordering::Relaxed),
                rect[2].load(Ordering::Relaxed),
                rect[3].load(Ordering::Relaxed),
            ));
        }
        out
    }

    /// Reconstructs a slot's observable state from the counters.
    #[must_use]
    pub fn slot_state(&self, slot: usize) -> SlotState {
        let n = self.n();
        let d = self.dequeued.load(Ordering::Relaxed);
        let q = self.queued.load(Ordering::Relaxed);
        let r = self.retired.load(Ordering::Relaxed);
        let l = self.released.load(Ordering::Relaxed);
        let slot = slot as u64;
        if slot >= d {
            return SlotState::Free;
        }
        // Latest instance that used this slot.
        let k = d - 1 - ((d - 1 - slot) % n);
        if k >= q {
            SlotState::Dequeued
        } else if k >= r {
            SlotState::Queued
        } else if k + 1 == r {
            SlotState::Front
        } else if l >= k + 2 {
            SlotState::Free
        } else {
            SlotState::Locked
        }
    }
}

impl fmt::Debug for BufferSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufferSlots(n={}, d={}, q={}, r={}, l={})",
            self.cells.len(),
            self.dequeued.load(Ordering::Relaxed),
            self.queued.load(Ordering::Relaxed),
            self.retired.load(Ordering::Relaxed),
            self.released.load(Ordering::Relaxed),
        )
    }
}

#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "slot counts are at most 32"
)]
fn slot_of(instance: u64, n: u64) -> usize {
    (instance % n) as usize
}

fn store_dirty(cell: &SlotCell, dirty: &Region) {
    let rects = dirty.as_slice();
    if rects.len() > MAX_DIRTY_RECTS {
        let b = dirty.bounds();
        write_rect(&cell.dirty_rects[0], &b);
        cell.dirty_count.store(1, Ordering::Relaxed);
        return;
    }
    for (dst, src) in cell.dirty_rects.iter().zip(rects.iter()) {
        write_rect(dst, src);
    }
    cell.dirty_count
        .store(rects.len() as u32, Ordering::Relaxed);
}

fn write_rect(dst: &[AtomicI32; 4], r: &Rect) {
    dst[0].store(r.left, Ordering::Relaxed);
    dst[1].store(r.top, Ordering::Relaxed);
    dst[2].store(r.right, Ordering::Relaxed);
    dst[3].store(r.bottom, Ordering::Relaxed);
}

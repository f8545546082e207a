// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame composition pipeline.
//!
//! [`Compositor::frame`] runs the five phases in order:
//!
//! ```text
//!   transactions -> page flip -> visibility -> repaint -> present
//! ```
//!
//! Transactions publish pending layer state, but only on frames where a
//! commit was requested with [`Compositor::request_commit`], so a batch of
//! mutations is applied as a unit. Page flip retires each layer's
//! newest queued buffer and collects the posted dirty hints. Visibility
//! recomputes visible regions when geometry changed. Repaint builds the
//! composition list, offers it to the driver for overlay assignment, and
//! draws the remaining layers on the GPU path scissored by the frame's
//! damage. Present hands the frame to the display, falling back to a buffer
//! swap when the driver has no overlay engine.
//!
//! A frame with no damage presents nothing. While the display is frozen,
//! damage accumulates and presentation is suppressed until thaw.

use alloc::vec::Vec;
use core::mem;

use crate::composer::{
    Blending, CompositionItem, CompositionKind, CompositionList, DriverError, GraphicsDriver,
};
use crate::geometry::Rect;
use crate::layer::LayerStore;
use crate::output::DisplayInfo;
use crate::region::Region;
use crate::trace::{
    DriverFallbackEvent, FrameBeginEvent, PageFlipEvent, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, PresentEvent, RepaintEvent, TransactionEvent, Tracer,
};
use crate::transform::Transform;
use crate::visibility::{compute_visible_regions, screen_transform};

/// What one call to [`Compositor::frame`] did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutcome {
    /// Whether the frame reached the display.
    pub presented: bool,
    /// The screen region redrawn this frame.
    pub damage: Region,
    /// Whether a secure layer was visible.
    pub secure: bool,
    /// Buffers retired this frame.
    pub flips: u32,
    /// Items the driver composed directly.
    pub overlay_items: u32,
    /// Items drawn on the GPU path.
    pub framebuffer_items: u32,
}

/// Owns the layer stack and turns it into presented frames.
#[derive(Debug)]
pub struct Compositor {
    store: LayerStore,
    display: DisplayInfo,
    global: Transform,
    frame_index: u64,
    visibility_dirty: bool,
    /// Set by [`request_commit`](Self::request_commit); latched client
    /// state is applied only on frames where this is raised, so a frame
    /// can never observe half a batch.
    transaction_requested: bool,
    /// Geometry changes not yet seen by the driver; survives skipped
    /// frames so `prepare` is told the truth.
    geometry_pending: bool,
    frozen: bool,
    secure: bool,
    /// Damage carried toward the next presented frame.
    pending_damage: Region,
    /// Screen area no opaque layer covers; the background fill.
    wormhole: Region,
}

impl Compositor {
    /// Creates a compositor for the given display mode.
    #[must_use]
    pub fn new(display: DisplayInfo, max_layers: u32) -> Self {
        Self {
            store: LayerStore::new(max_layers),
            display,
            global: Transform::identity(),
            frame_index: 0,
            visibility_dirty: true,
            transaction_requested: false,
            geometry_pending: false,
            frozen: false,
            secure: false,
            pending_damage: Region::new(),
            wormhole: Region::from_rect(display.bounds()),
        }
    }

    /// The layer stack.
    #[must_use]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Mutable access to the layer stack, for command dispatch.
    pub fn store_mut(&mut self) -> &mut LayerStore {
        &mut self.store
    }

    /// The display mode being composed against.
    #[must_use]
    pub fn display(&self) -> DisplayInfo {
        self.display
    }

    /// Switches the display mode. The whole screen is invalidated.
    pub fn set_display(&mut self, display: DisplayInfo) {
        self.display = display;
        self.visibility_dirty = true;
        self.invalidate();
    }

    /// Sets the transform applied on top of every layer (display
    /// orientation). The whole screen is invalidated.
    pub fn set_display_transform(&mut self, transform: Transform) {
        self.global = transform;
        self.visibility_dirty = true;
        self.invalidate();
    }

    /// Schedules latched client state to be applied at the next frame.
    ///
    /// Layer mutations sit in the store's shadow state until a frame
    /// runs with a commit requested; a batch of mutations followed by a
    /// single request is applied atomically with respect to frames.
    pub fn request_commit(&mut self) {
        self.transaction_requested = true;
    }

    /// Halts presentation until [`set_frozen(false)`](Self::set_frozen);
    /// damage accumulates meanwhile.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Whether presentation is currently suppressed.
    #[must_use]
    pub fn frozen(&self) -> bool {
        self.frozen
    }

    /// Schedules a full-screen redraw.
    pub fn invalidate(&mut self) {
        self.pending_damage.or_rect(self.display.bounds());
    }

    /// Whether frame capture is permitted. False whenever the last sweep
    /// saw a visible secure layer.
    #[must_use]
    pub fn capture_allowed(&self) -> bool {
        !self.secure
    }

    /// Frames composed so far.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Screen area covered by no opaque layer, as of the last sweep.
    #[must_use]
    pub fn wormhole(&self) -> &Region {
        &self.wormhole
    }

    /// Runs one frame of the pipeline.
    ///
    /// Per-frame driver failures degrade to the GPU path or drop the
    /// frame; only [`DriverError::Fatal`] is returned, and the runtime
    /// must shut down when it is.
    pub fn frame(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        tracer: &mut Tracer<'_>,
    ) -> Result<FrameOutcome, DriverError> {
        let frame_index = self.frame_index;
        self.frame_index += 1;
        tracer.frame_begin(&FrameBeginEvent { frame_index });

        let screen = self.display.bounds();

        // -- Transactions --
        if self.transaction_requested {
            self.transaction_requested = false;
            if self.store.transaction_pending() {
                tracer.phase_begin(&PhaseBeginEvent {
                    frame_index,
                    phase: PhaseKind::Transaction,
                });
                let txn = self.store.commit_transactions();
                if txn.geometry_changed {
                    self.visibility_dirty = true;
                }
                self.pending_damage.or_self(&txn.removed_damage);
                tracer.transaction(&TransactionEvent {
                    frame_index,
                    committed: small(txn.committed.len()),
                    geometry_changed: txn.geometry_changed,
                });
                tracer.phase_end(&PhaseEndEvent {
                    frame_index,
                    phase: PhaseKind::Transaction,
                });
            }
        }

        // -- Page flip --
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::PageFlip,
        });
        let order: Vec<u32> = self.store.draw_order().to_vec();
        let mut flipped: Vec<u32> = Vec::new();
        let mut posted: Vec<(u32, Region)> = Vec::new();
        for &idx in &order {
            let i = idx as usize;
            let Some(pool) = &self.store.slots[i] else {
                continue;
            };
            // NothingQueued is the common case: keep the previous front.
            if let Ok(slot) = pool.retire_and_lock() {
                let state = &self.store.drawing[i];
                let mut hint = pool.dirty_hint(slot);
                hint.and_rect(Rect::from_size(state.width, state.height));
                posted.push((idx, hint));
                flipped.push(idx);
                tracer.page_flip(&PageFlipEvent {
                    frame_index,
                    layer: idx,
                    slot: small(slot),
                });
            }
        }
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::PageFlip,
        });

        // -- Visibility --
        let geometry_changed = self.visibility_dirty;
        self.geometry_pending |= geometry_changed;
        if self.visibility_dirty {
            tracer.phase_begin(&PhaseBeginEvent {
                frame_index,
                phase: PhaseKind::Visibility,
            });
            let sweep = compute_visible_regions(&mut self.store, screen, &self.global);
            self.visibility_dirty = false;
            self.secure = sweep.secure;
            self.wormhole = Region::from_rect(screen).subtract(&sweep.opaque);
            self.pending_damage.or_self(&sweep.dirty);
            #[cfg(feature = "trace-rich")]
            for &idx in &order {
                tracer.visible_change(&crate::trace::VisibleChangeEvent {
                    frame_index,
                    layer: idx,
                    visible_bounds: self.store.visible_screen[idx as usize].bounds(),
                });
            }
            tracer.phase_end(&PhaseEndEvent {
                frame_index,
                phase: PhaseKind::Visibility,
            });
        }

        // Posted hints clip against the freshly swept visible regions.
        for (idx, hint) in &posted {
            if hint.is_empty() {
                continue;
            }
            let i = *idx as usize;
            let tr = screen_transform(&self.global, &self.store.drawing[i]);
            let mut screen_hint = tr.transform_region(hint);
            screen_hint.and_self(&self.store.visible_screen[i]);
            self.pending_damage.or_self(&screen_hint);
        }

        self.pending_damage.and_rect(screen);

        if self.frozen {
            // Keep accumulating; nothing reaches the display until thaw.
            return Ok(self.finish_skipped(&flipped));
        }
        let damage = mem::take(&mut self.pending_damage);
        if damage.is_empty() {
            return Ok(self.finish_skipped(&flipped));
        }

        // -- Repaint --
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::Repaint,
        });
        let mut list = CompositionList {
            geometry_changed: self.geometry_pending,
            items: Vec::new(),
        };
        for &idx in &order {
            let i = idx as usize;
            if self.store.visible_screen[i].is_empty() {
                continue;
            }
            let state = &self.store.drawing[i];
            let tr = screen_transform(&self.global, state);
            let footprint = Rect::from_size(state.width, state.height);
            let display_frame = tr
                .transform_region(&Region::from_rect(footprint))
                .bounds();
            let buffer = self.store.slots[i]
                .as_ref()
                .and_then(|pool| pool.front().map(|slot| pool.handle(slot)));
            let blending = if state.flags.opaque {
                if state.alpha >= 1.0 {
                    Blending::None
                } else {
                    Blending::Coverage
                }
            } else {
                Blending::Premultiplied
            };
            list.items.push(CompositionItem {
                layer: idx,
                kind: CompositionKind::Framebuffer,
                buffer,
                source_crop: footprint,
                display_frame,
                orientation: tr.orientation(),
                blending,
                skip: false,
                visible: self.store.visible_screen[i].clone(),
            });
        }

        let mut fallback = false;
        match driver.prepare(&mut list) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                fallback = true;
                list.revert_to_framebuffer();
                tracer.driver_fallback(&DriverFallbackEvent {
                    frame_index,
                    reason: e.reason(),
                });
            }
        }

        tracer.repaint(&RepaintEvent {
            frame_index,
            damage_bounds: damage.bounds(),
            items: small(list.items.len()),
        });
        #[cfg(feature = "trace-rich")]
        tracer.damage_rects(frame_index, damage.as_slice());

        for item in &list.items {
            if item.skip || item.kind != CompositionKind::Framebuffer {
                continue;
            }
            if item.visible.and(&damage).is_empty() {
                continue;
            }
            driver.draw_layer(item, &damage);
        }
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::Repaint,
        });

        // -- Present --
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::Present,
        });
        let present_result = if fallback {
            driver.swap_buffers(&damage)
        } else {
            match driver.commit(&list) {
                Ok(()) => Ok(()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    fallback = true;
                    tracer.driver_fallback(&DriverFallbackEvent {
                        frame_index,
                        reason: e.reason(),
                    });
                    driver.swap_buffers(&damage)
                }
            }
        };
        let presented = match present_result {
            Ok(()) => true,
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => false,
        };
        if presented {
            self.geometry_pending = false;
        } else {
            // The frame was dropped; its damage must survive to the next
            // attempt.
            self.pending_damage.or_self(&damage);
        }
        tracer.present(&PresentEvent {
            frame_index,
            overlay_items: list.overlay_count(),
            framebuffer_items: list.framebuffer_count(),
            fallback,
        });
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::Present,
        });

        // -- Finish --
        self.release_flipped(&flipped);
        Ok(FrameOutcome {
            presented,
            damage,
            secure: self.secure,
            flips: small(flipped.len()),
            overlay_items: list.overlay_count(),
            framebuffer_items: list.framebuffer_count(),
        })
    }

    /// Ends a frame that never reached the repaint phase.
    fn finish_skipped(&mut self, flipped: &[u32]) -> FrameOutcome {
        self.release_flipped(flipped);
        FrameOutcome {
            presented: false,
            damage: Region::new(),
            secure: self.secure,
            flips: small(flipped.len()),
            overlay_items: 0,
            framebuffer_items: 0,
        }
    }

    /// Unlocks the buffer each flipped layer displaced, now that the frame
    /// is over.
    fn release_flipped(&self, flipped: &[u32]) {
        for &idx in flipped {
            if let Some(pool) = &self.store.slots[idx as usize] {
                pool.release_retired();
            }
        }
    }
}

#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "counts bounded by the layer and slot caps"
)]
fn small(n: usize) -> u32 {
    n as u32
}

// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The graphics driver seam.
//!
//! [`GraphicsDriver`] is the single trait the compositor talks through:
//! GPU drawing, buffer swaps, and (optionally) direct overlay composition.
//! Each frame the compositor builds a [`CompositionList`] describing the
//! visible layer stack back to front and offers it to the driver via
//! [`prepare`](GraphicsDriver::prepare). A driver that can compose a layer
//! directly marks its item [`Overlay`](CompositionKind::Overlay); everything
//! else stays [`Framebuffer`](CompositionKind::Framebuffer) and is drawn on
//! the GPU path. Drivers without an overlay engine keep the default
//! `prepare`/`commit`, whose [`DriverError::NoComposer`] routes every frame
//! through [`draw_layer`](GraphicsDriver::draw_layer) and
//! [`swap_buffers`](GraphicsDriver::swap_buffers).
//!
//! Per-frame driver failures degrade to the GPU path and are traced, never
//! fatal; only [`DriverError::Fatal`] tears the runtime down.

use alloc::vec::Vec;
use core::fmt;

use crate::geometry::Rect;
use crate::layer::BufferHandle;
use crate::region::Region;

/// Errors reported by a [`GraphicsDriver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverError {
    /// The driver has no overlay composer; composition falls back to the
    /// GPU path. Not a failure.
    NoComposer,
    /// This frame failed; the compositor degrades and retries next frame.
    Frame(&'static str),
    /// The driver is unusable. The runtime must shut down.
    Fatal(&'static str),
}

impl DriverError {
    /// Whether this error must tear the runtime down.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Short human-readable cause, for trace events.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoComposer => "no overlay composer",
            Self::Frame(reason) | Self::Fatal(reason) => reason,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoComposer => write!(f, "driver has no overlay composer"),
            Self::Frame(reason) => write!(f, "driver frame failure: {reason}"),
            Self::Fatal(reason) => write!(f, "fatal driver failure: {reason}"),
        }
    }
}

impl core::error::Error for DriverError {}

/// How one layer gets to the screen this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompositionKind {
    /// Drawn on the GPU into the framebuffer.
    #[default]
    Framebuffer,
    /// Composed directly by the driver's overlay engine.
    Overlay,
}

/// Pixel blending applied when a layer is composed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Blending {
    /// Source pixels replace destination pixels.
    #[default]
    None,
    /// Alpha blending with premultiplied source.
    Premultiplied,
    /// Plane-alpha coverage over opaque content.
    Coverage,
}

/// One z-ordered entry of the per-frame composition list.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositionItem {
    /// Slot index of the layer in the store.
    pub layer: u32,
    /// How this layer is composed; `prepare` may upgrade it to `Overlay`.
    pub kind: CompositionKind,
    /// The front buffer, if the layer ever posted one.
    pub buffer: Option<BufferHandle>,
    /// Source rect within the buffer.
    pub source_crop: Rect,
    /// Destination rect on screen.
    pub display_frame: Rect,
    /// Orientation flags of the layer's screen transform.
    pub orientation: u32,
    /// Blending mode.
    pub blending: Blending,
    /// Set by `prepare` to drop the item from both paths this frame.
    pub skip: bool,
    /// The layer's visible region in screen space.
    pub visible: Region,
}

/// The z-ordered visible layer stack offered to the driver, back to front.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompositionList {
    /// Whether the stack's geometry changed since the last frame the
    /// driver saw.
    pub geometry_changed: bool,
    /// Entries, back to front.
    pub items: Vec<CompositionItem>,
}

impl CompositionList {
    /// Items the driver composes directly.
    #[must_use]
    pub fn overlay_count(&self) -> u32 {
        self.count_kind(CompositionKind::Overlay)
    }

    /// Items on the GPU path.
    #[must_use]
    pub fn framebuffer_count(&self) -> u32 {
        self.count_kind(CompositionKind::Framebuffer)
    }

    /// Reverts every item to the GPU path.
    pub fn revert_to_framebuffer(&mut self) {
        for item in &mut self.items {
            item.kind = CompositionKind::Framebuffer;
            item.skip = false;
        }
    }

    fn count_kind(&self, kind: CompositionKind) -> u32 {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "list length is bounded by the layer cap"
        )]
        {
            self.items
                .iter()
                .filter(|item| !item.skip && item.kind == kind)
                .count() as u32
        }
    }
}

/// The compositor's window onto the display hardware.
///
/// One implementation per platform; the runtime owns exactly one and calls
/// it only from the composition thread.
pub trait GraphicsDriver {
    /// Brings the display pipeline up. Called once, on the composition
    /// thread, before any frame.
    fn init_graphics(&mut self) -> Result<(), DriverError>;

    /// Tears the display pipeline down. Called once during shutdown.
    fn shutdown_graphics(&mut self);

    /// Announces the composition surface size.
    fn set_surface(&mut self, width: u32, height: u32);

    /// Hints the scheduling priority for the composition thread.
    fn set_priority(&mut self, priority: i32) {
        _ = priority;
    }

    /// Offers the frame's layer stack for overlay assignment.
    ///
    /// The driver may flip items to [`CompositionKind::Overlay`] or mark
    /// them skipped. The default declines the whole frame.
    fn prepare(&mut self, list: &mut CompositionList) -> Result<(), DriverError> {
        _ = list;
        Err(DriverError::NoComposer)
    }

    /// Presents a prepared list, composing the overlay items.
    fn commit(&mut self, list: &CompositionList) -> Result<(), DriverError> {
        _ = list;
        Err(DriverError::NoComposer)
    }

    /// Draws one framebuffer-path item on the GPU, scissored to `damage`.
    fn draw_layer(&mut self, item: &CompositionItem, damage: &Region);

    /// Presents the framebuffer, the fallback when the driver did not
    /// commit the frame itself.
    fn swap_buffers(&mut self, damage: &Region) -> Result<(), DriverError>;
}

/// A driver that swallows every frame.
///
/// Composition runs end to end with no display attached; useful as a
/// placeholder and in tests that only care about pipeline bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDriver;

impl GraphicsDriver for NullDriver {
    fn init_graphics(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn shutdown_graphics(&mut self) {}

    fn set_surface(&mut self, _width: u32, _height: u32) {}

    fn draw_layer(&mut self, _item: &CompositionItem, _damage: &Region) {}

    fn swap_buffers(&mut self, _damage: &Region) -> Result<(), DriverError> {
        Ok(())
    }
}

// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-buffered per-layer state.
//!
//! Every layer carries two copies of [`LayerState`]: the *current* state,
//! mutated by client transactions, and the *drawing* state, the snapshot the
//! compositor reads while building a frame. [`sequence`](LayerState::sequence)
//! is bumped on every current-state mutation; a layer needs geometry
//! re-evaluation exactly when the two copies disagree on it. The copy from
//! current to drawing happens once per committed transaction batch, never
//! mid-frame, which is what makes transactions atomic with respect to
//! composition.

use crate::geometry::Point;
use crate::region::Region;
use crate::transform::Transform;

/// Behavior flags for a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerFlags {
    /// Whether the layer is excluded from composition entirely.
    pub hidden: bool,
    /// Whether the content is guaranteed free of alpha.
    ///
    /// Only opaque layers participate in occlusion culling.
    pub opaque: bool,
    /// Whether the content must be kept out of screen captures.
    pub secure: bool,
}

/// One buffered copy of a layer's composited properties.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerState {
    /// Top-left corner in (pre-global-transform) screen coordinates.
    pub position: Point,
    /// Content width in pixels.
    pub width: u32,
    /// Content height in pixels.
    pub height: u32,
    /// Stacking order; higher values composite on top.
    pub z: u32,
    /// Layer-wide opacity in `[0, 1]`; `<= 0` hides, `>= 1` allows occlusion.
    pub alpha: f32,
    /// Behavior flags.
    pub flags: LayerFlags,
    /// Content-space transform applied after positioning.
    pub transform: Transform,
    /// Content-space region the client promises is fully transparent.
    pub transparent_hint: Region,
    /// Bumped on every mutation of the current copy.
    pub sequence: u32,
}

impl LayerState {
    /// Initial state for a freshly created layer.
    #[must_use]
    pub fn new(width: u32, height: u32, flags: LayerFlags) -> Self {
        Self {
            position: Point::ZERO,
            width,
            height,
            z: 0,
            alpha: 1.0,
            flags,
            transform: Transform::identity(),
            transparent_hint: Region::new(),
            sequence: 0,
        }
    }

    /// Whether the layer can contribute any pixels at all.
    #[inline]
    #[must_use]
    pub fn is_visible_candidate(&self) -> bool {
        !self.flags.hidden && self.alpha > 0.0 && self.width > 0 && self.height > 0
    }

    /// Whether the layer blends with what is underneath it.
    #[inline]
    #[must_use]
    pub fn is_translucent(&self) -> bool {
        !self.flags.opaque || self.alpha < 1.0
    }
}

impl Default for LayerState {
    fn default() -> Self {
        Self::new(0, 0, LayerFlags::default())
    }
}

// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel geometry.
//!
//! [`Rect`] is a half-open axis-aligned rectangle in screen pixels:
//! `left`/`top` are inclusive, `right`/`bottom` exclusive. A rect with a
//! non-positive extent on either axis is *empty*; empty rects absorb
//! intersection and are the identity for bounding unions.
//!
//! The float conversions exist only for the conservative fallback path in
//! [`crate::transform`]; everything else in the crate stays on integers.

use core::fmt;

/// An integer point in screen pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// The origin.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A half-open axis-aligned rectangle in screen pixels.
///
/// `left`/`top` inclusive, `right`/`bottom` exclusive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge (inclusive).
    pub left: i32,
    /// Top edge (inclusive).
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl Rect {
    /// The canonical empty rect.
    pub const EMPTY: Self = Self {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    /// Creates a rect from edges.
    #[inline]
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Creates a rect anchored at the origin with the given size.
    #[inline]
    #[must_use]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        }
    }

    /// Width in pixels, zero for empty rects.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> i32 {
        if self.right > self.left {
            self.right - self.left
        } else {
            0
        }
    }

    /// Height in pixels, zero for empty rects.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> i32 {
        if self.bottom > self.top {
            self.bottom - self.top
        } else {
            0
        }
    }

    /// Whether this rect covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// The intersection, normalized to [`Rect::EMPTY`] when disjoint.
    #[inline]
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let r = Self {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        if r.is_empty() { Self::EMPTY } else { r }
    }

    /// Whether the two rects share at least one pixel.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// The smallest rect containing both operands.
    ///
    /// Empty operands are ignored; the union of two empty rects is empty.
    #[inline]
    #[must_use]
    pub fn union_bounds(&self, other: &Self) -> Self {
        if self.is_empty() {
            return if other.is_empty() {
                Self::EMPTY
            } else {
                *other
            };
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Whether the point lies inside (half-open test).
    #[inline]
    #[must_use]
    pub const fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }

    /// The rect translated by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    /// Conversion for the float fallback path.
    #[inline]
    #[must_use]
    pub fn to_kurbo(&self) -> kurbo::Rect {
        kurbo::Rect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        )
    }

    /// Smallest integer rect containing the float rect (outward rounding).
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "coordinates are pixel-scale; floor/ceil keep the result conservative"
    )]
    pub fn from_kurbo_outward(r: kurbo::Rect) -> Self {
        #[cfg(not(feature = "std"))]
        use kurbo::common::FloatFuncs as _;
        let out = Self {
            left: r.x0.floor() as i32,
            top: r.y0.floor() as i32,
            right: r.x1.ceil() as i32,
            bottom: r.y1.ceil() as i32,
        };
        if out.is_empty() { Self::EMPTY } else { out }
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {} .. {}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

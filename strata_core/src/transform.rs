// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! 2-D layer transform with a cached classification.
//!
//! [`Transform`] is a row-major 3×3 `f32` matrix covering what the pipeline
//! actually composes: translation, scale, the four 90° orientations, and
//! flips. Anything else still transforms points correctly but is classified
//! `ROT_INVALID`, which downgrades region math to a conservative bounding
//! box and disqualifies the layer from opaque-occlusion culling.
//!
//! Classification is cached: [`set`](Transform::set) and composition store a
//! sentinel and [`type_flags`](Transform::type_flags) recomputes on first
//! use. The cache is only trusted while the sentinel bit is clear.

use core::cell::Cell;
use core::fmt;
use core::ops::Mul;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::geometry::{Point, Rect};
use crate::region::Region;

/// A row-major 3×3 transform: `x' = a·x + b·y + tx`, `y' = c·x + d·y + ty`
/// with rows `[[a, b, tx], [c, d, ty], [0, 0, 1]]`.
#[derive(Clone)]
pub struct Transform {
    rows: [[f32; 3]; 3],
    /// `TYPE_*` bitmask; [`Self::TYPE_UNKNOWN`] marks it stale.
    kind: Cell<u32>,
}

/// Error for orientation flag combinations outside the discrete set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownOrientation {
    /// The rejected flag bits.
    pub flags: u32,
}

impl fmt::Display for UnknownOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized orientation flags {:#x}", self.flags)
    }
}

impl core::error::Error for UnknownOrientation {}

impl Transform {
    // -- Orientation flags (shared with the composition wire contract) --

    /// No rotation.
    pub const ROT_0: u32 = 0;
    /// Horizontal mirror, applied before rotation.
    pub const FLIP_H: u32 = 1;
    /// Vertical mirror, applied before rotation.
    pub const FLIP_V: u32 = 2;
    /// Quarter turn.
    pub const ROT_90: u32 = 4;
    /// Half turn (both flips).
    pub const ROT_180: u32 = Self::FLIP_H | Self::FLIP_V;
    /// Three-quarter turn.
    pub const ROT_270: u32 = Self::ROT_180 | Self::ROT_90;
    /// Arbitrary rotation or skew; not expressible as discrete flags.
    pub const ROT_INVALID: u32 = 0x80;

    // -- Classification bits --

    /// The identity.
    pub const TYPE_IDENTITY: u32 = 0;
    /// Has a translation component.
    pub const TYPE_TRANSLATE: u32 = 1;
    /// Has a rotation component (discrete or arbitrary).
    pub const TYPE_ROTATE: u32 = 2;
    /// Has a scale component (flips are negative scale).
    pub const TYPE_SCALE: u32 = 4;
    /// Cache sentinel: the stored classification is stale.
    pub const TYPE_UNKNOWN: u32 = 8;

    /// The identity transform.
    #[inline]
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            kind: Cell::new(Self::TYPE_IDENTITY),
        }
    }

    /// A pure translation.
    #[inline]
    #[must_use]
    pub fn from_translate(tx: f32, ty: f32) -> Self {
        let kind = if tx == 0.0 && ty == 0.0 {
            Self::TYPE_IDENTITY
        } else {
            Self::TYPE_TRANSLATE
        };
        Self {
            rows: [[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]],
            kind: Cell::new(kind),
        }
    }

    /// A pure (possibly negative) scale about the origin.
    #[inline]
    #[must_use]
    pub fn from_scale(sx: f32, sy: f32) -> Self {
        let kind = if sx == 1.0 && sy == 1.0 {
            Self::TYPE_IDENTITY
        } else {
            Self::TYPE_SCALE
        };
        Self {
            rows: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]],
            kind: Cell::new(kind),
        }
    }

    /// Builds the discrete transform for an orientation flag combination.
    ///
    /// Flips apply before the quarter turn. Returns an error for bits
    /// outside `FLIP_H | FLIP_V | ROT_90` (including [`Self::ROT_INVALID`]).
    pub fn from_orientation(flags: u32) -> Result<Self, UnknownOrientation> {
        if flags & !(Self::FLIP_H | Self::FLIP_V | Self::ROT_90) != 0 {
            return Err(UnknownOrientation { flags });
        }
        let mut t = Self::identity();
        if flags & Self::FLIP_H != 0 {
            t = &Self::from_scale(-1.0, 1.0) * &t;
        }
        if flags & Self::FLIP_V != 0 {
            t = &Self::from_scale(1.0, -1.0) * &t;
        }
        if flags & Self::ROT_90 != 0 {
            let quarter = Self {
                rows: [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
                kind: Cell::new(Self::TYPE_ROTATE),
            };
            t = &quarter * &t;
        }
        Ok(t)
    }

    /// Builds a transform from raw rows; classification is deferred.
    #[inline]
    #[must_use]
    pub fn from_rows(rows: [[f32; 3]; 3]) -> Self {
        Self {
            rows,
            kind: Cell::new(Self::TYPE_UNKNOWN),
        }
    }

    /// The raw rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> &[[f32; 3]; 3] {
        &self.rows
    }

    /// Replaces the matrix and marks the classification stale.
    #[inline]
    pub fn set(&mut self, rows: [[f32; 3]; 3]) {
        self.rows = rows;
        self.kind.set(Self::TYPE_UNKNOWN);
    }

    /// The `TYPE_*` classification, recomputed if stale.
    #[must_use]
    pub fn type_flags(&self) -> u32 {
        let cached = self.kind.get();
        if cached & Self::TYPE_UNKNOWN == 0 {
            return cached;
        }
        let computed = self.compute_type();
        self.kind.set(computed);
        computed
    }

    fn compute_type(&self) -> u32 {
        let [a, b, tx] = self.rows[0];
        let [c, d, ty] = self.rows[1];
        let mut flags = Self::TYPE_IDENTITY;
        if tx != 0.0 || ty != 0.0 {
            flags |= Self::TYPE_TRANSLATE;
        }
        if b != 0.0 || c != 0.0 {
            flags |= Self::TYPE_ROTATE;
            // Unit column norms mean a pure rotation; anything else scales.
            if a * a + c * c != 1.0 || b * b + d * d != 1.0 {
                flags |= Self::TYPE_SCALE;
            }
        } else if a != 1.0 || d != 1.0 {
            flags |= Self::TYPE_SCALE;
        }
        flags
    }

    /// Whether this is exactly the identity.
    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.type_flags() == Self::TYPE_IDENTITY
    }

    /// The discrete orientation flags, or [`Self::ROT_INVALID`] when the
    /// linear part is not axis-aligned.
    #[must_use]
    pub fn orientation(&self) -> u32 {
        let [a, b, _] = self.rows[0];
        let [c, d, _] = self.rows[1];
        if b == 0.0 && c == 0.0 {
            let mut flags = Self::ROT_0;
            if a < 0.0 {
                flags |= Self::FLIP_H;
            }
            if d < 0.0 {
                flags |= Self::FLIP_V;
            }
            flags
        } else if a == 0.0 && d == 0.0 {
            let mut flags = Self::ROT_90;
            if c < 0.0 {
                flags |= Self::FLIP_H;
            }
            if b > 0.0 {
                flags |= Self::FLIP_V;
            }
            flags
        } else {
            Self::ROT_INVALID
        }
    }

    /// Whether axis-aligned rects map to axis-aligned rects.
    #[inline]
    #[must_use]
    pub fn preserves_rects(&self) -> bool {
        self.orientation() & Self::ROT_INVALID == 0
    }

    /// Maps a point, rounding to the nearest pixel.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "pixel coordinates are far below f32 integer range"
    )]
    pub fn transform_point(&self, p: Point) -> Point {
        let x = p.x as f32;
        let y = p.y as f32;
        let [a, b, tx] = self.rows[0];
        let [c, d, ty] = self.rows[1];
        Point {
            x: (a * x + b * y + tx + 0.5).floor() as i32,
            y: (c * x + d * y + ty + 0.5).floor() as i32,
        }
    }

    /// Maps a rect through a rect-preserving transform.
    ///
    /// Valid only when [`preserves_rects`](Self::preserves_rects) holds; the
    /// result is re-normalized so the mapped corners end up in rect order.
    #[must_use]
    pub fn transform_rect(&self, r: &Rect) -> Rect {
        debug_assert!(
            self.preserves_rects(),
            "transform_rect requires an axis-aligned transform"
        );
        let p0 = self.transform_point(Point::new(r.left, r.top));
        let p1 = self.transform_point(Point::new(r.right, r.bottom));
        let out = Rect {
            left: p0.x.min(p1.x),
            top: p0.y.min(p1.y),
            right: p0.x.max(p1.x),
            bottom: p0.y.max(p1.y),
        };
        if out.is_empty() { Rect::EMPTY } else { out }
    }

    /// Maps a region.
    ///
    /// Rect-preserving transforms map rect-by-rect. Anything else collapses
    /// to the bounding box of the transformed bounds, rounded outward: an
    /// over-approximation, which is the safe direction for visibility and
    /// damage (never for transparency — callers drop transparent hints on
    /// this path instead).
    #[must_use]
    pub fn transform_region(&self, region: &Region) -> Region {
        if region.is_empty() || self.is_identity() {
            return region.clone();
        }
        let [_, _, tx] = self.rows[0];
        let [_, _, ty] = self.rows[1];
        if self.type_flags() == Self::TYPE_TRANSLATE && tx.fract() == 0.0 && ty.fract() == 0.0 {
            let mut out = region.clone();
            #[expect(
                clippy::cast_possible_truncation,
                reason = "integral translation checked above; pixel-scale values"
            )]
            out.translate(tx as i32, ty as i32);
            return out;
        }
        if self.preserves_rects() {
            let mut out = Region::new();
            for r in region {
                out.or_rect(self.transform_rect(r));
            }
            return out;
        }
        let bbox = self.to_affine().transform_rect_bbox(region.bounds().to_kurbo());
        Region::from_rect(Rect::from_kurbo_outward(bbox))
    }

    /// The affine part as a `kurbo::Affine` (projective row dropped).
    #[inline]
    #[must_use]
    pub fn to_affine(&self) -> kurbo::Affine {
        let [a, b, tx] = self.rows[0];
        let [c, d, ty] = self.rows[1];
        kurbo::Affine::new([
            f64::from(a),
            f64::from(c),
            f64::from(b),
            f64::from(d),
            f64::from(tx),
            f64::from(ty),
        ])
    }
}

impl Default for Transform {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl Mul for &Transform {
    type Output = Transform;

    fn mul(self, rhs: Self) -> Transform {
        if self.is_identity() {
            return rhs.clone();
        }
        if rhs.is_identity() {
            return self.clone();
        }
        let a = &self.rows;
        let b = &rhs.rows;
        let mut out = [[0.0_f32; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Transform {
            rows: out,
            kind: Cell::new(Transform::TYPE_UNKNOWN),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, tx] = self.rows[0];
        let [c, d, ty] = self.rows[1];
        write!(f, "Transform[{a} {b} {tx} / {c} {d} {ty}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        let t = Transform::default();
        assert!(t.is_identity());
        assert_eq!(t.type_flags(), Transform::TYPE_IDENTITY);
        assert_eq!(t.orientation(), Transform::ROT_0);
    }

    #[test]
    fn translate_classification() {
        let t = Transform::from_translate(3.0, -2.0);
        assert_eq!(t.type_flags(), Transform::TYPE_TRANSLATE);
        assert!(t.preserves_rects());
        assert_eq!(t.transform_point(Point::new(1, 1)), Point::new(4, -1));
    }

    #[test]
    fn zero_translate_is_identity() {
        assert!(Transform::from_translate(0.0, 0.0).is_identity());
        assert!(Transform::from_scale(1.0, 1.0).is_identity());
    }

    #[test]
    fn set_marks_cache_stale_until_queried() {
        let mut t = Transform::identity();
        t.set([[1.0, 0.0, 5.0], [0.0, 1.0, 7.0], [0.0, 0.0, 1.0]]);
        assert_ne!(
            t.kind.get() & Transform::TYPE_UNKNOWN,
            0,
            "set must leave the sentinel"
        );
        assert_eq!(t.type_flags(), Transform::TYPE_TRANSLATE);
        assert_eq!(
            t.kind.get() & Transform::TYPE_UNKNOWN,
            0,
            "query must clear the sentinel"
        );
    }

    #[test]
    fn rot90_four_times_is_identity() {
        let r = Transform::from_orientation(Transform::ROT_90).unwrap();
        let full = &(&(&r * &r) * &r) * &r;
        assert_eq!(full, Transform::identity());
        assert!(full.is_identity());
    }

    #[test]
    fn flip_h_twice_is_identity() {
        let f = Transform::from_orientation(Transform::FLIP_H).unwrap();
        assert_eq!(&f * &f, Transform::identity());
    }

    #[test]
    fn orientation_round_trips_all_discrete_flags() {
        for flags in 0..8 {
            let t = Transform::from_orientation(flags).unwrap();
            assert_eq!(t.orientation(), flags, "flags {flags:#x}");
            assert!(t.preserves_rects());
        }
    }

    #[test]
    fn rejects_unknown_orientation_bits() {
        let err = Transform::from_orientation(Transform::ROT_INVALID).unwrap_err();
        assert_eq!(err.flags, Transform::ROT_INVALID);
    }

    #[test]
    fn skew_is_rot_invalid() {
        let t = Transform::from_rows([[1.0, 0.4, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(t.orientation(), Transform::ROT_INVALID);
        assert!(!t.preserves_rects());
        assert_ne!(t.type_flags() & Transform::TYPE_ROTATE, 0);
    }

    #[test]
    fn rot90_maps_rect() {
        let r = Transform::from_orientation(Transform::ROT_90).unwrap();
        // (x, y) → (-y, x): a 10×5 rect lands left of the y axis.
        let mapped = r.transform_rect(&Rect::new(0, 0, 10, 5));
        assert_eq!(mapped, Rect::new(-5, 0, 0, 10));
    }

    #[test]
    fn rotation_type_includes_scale_when_stretched() {
        let t = Transform::from_rows([[0.0, -2.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let flags = t.type_flags();
        assert_ne!(flags & Transform::TYPE_ROTATE, 0);
        assert_ne!(flags & Transform::TYPE_SCALE, 0);
        assert_eq!(t.orientation(), Transform::ROT_90, "scaled quarter turn");
    }

    #[test]
    fn identity_multiply_short_circuits() {
        let t = Transform::from_translate(1.0, 2.0);
        assert_eq!(&Transform::identity() * &t, t);
        assert_eq!(&t * &Transform::identity(), t);
    }

    #[test]
    fn compose_translations() {
        let a = Transform::from_translate(1.0, 0.0);
        let b = Transform::from_translate(0.0, 2.0);
        let c = &a * &b;
        assert_eq!(c.transform_point(Point::ZERO), Point::new(1, 2));
        assert_eq!(c.type_flags(), Transform::TYPE_TRANSLATE);
    }

    #[test]
    fn integral_translate_keeps_region_shape() {
        let mut region = Region::from_rect(Rect::new(0, 0, 10, 10));
        region.subtract_rect(Rect::new(4, 4, 6, 6));
        let rect_count = region.as_slice().len();
        let t = Transform::from_translate(10.0, 20.0);
        let moved = t.transform_region(&region);
        assert_eq!(moved.as_slice().len(), rect_count);
        assert_eq!(moved.bounds(), Rect::new(10, 20, 20, 30));
        assert!(!moved.contains(Point::new(15, 25)), "hole preserved");
    }

    #[test]
    fn skew_region_collapses_to_conservative_bounds() {
        let mut region = Region::from_rect(Rect::new(0, 0, 10, 10));
        region.subtract_rect(Rect::new(2, 2, 8, 8));
        let t = Transform::from_rows([[1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let mapped = t.transform_region(&region);
        assert_eq!(mapped.as_slice().len(), 1, "single conservative rect");
        // Sheared 10×10 square: x reaches x+y = 20.
        assert_eq!(mapped.bounds(), Rect::new(0, 0, 20, 10));
    }

    #[test]
    fn rot90_region_maps_rect_by_rect() {
        let mut region = Region::from_rect(Rect::new(0, 0, 4, 2));
        region.or_rect(Rect::new(0, 6, 4, 8));
        let r = Transform::from_orientation(Transform::ROT_90).unwrap();
        let mapped = r.transform_region(&region);
        // (x, y) → (-y, x): both rects land in the band y ∈ [0, 4).
        assert_eq!(
            mapped.as_slice(),
            &[Rect::new(-8, 0, -6, 4), Rect::new(-2, 0, 0, 4)]
        );
        assert_eq!(mapped.bounds(), Rect::new(-8, 0, 0, 4));
    }
}

// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Region algebra over sets of integer rects.
//!
//! A [`Region`] is an ordered set of non-overlapping [`Rect`]s in *scan
//! order*: top-to-bottom bands, left-to-right within a band. The stored form
//! is canonical:
//!
//! - every rect is non-empty;
//! - rects in one band share `top`/`bottom`, and their x-spans are disjoint
//!   and non-touching;
//! - vertically adjacent bands with identical x-spans are coalesced.
//!
//! Canonical form makes `==` a point-set equality test. All boolean
//! operations run a single band-merge sweep over both operands; results are
//! always canonical, so operations compose freely.
//!
//! This is the damage/visibility currency of the whole pipeline: visible
//! regions, covered regions, transparent hints, and per-frame damage are all
//! `Region`s.

use alloc::vec::Vec;
use core::fmt;
use core::slice;

use crate::geometry::{Point, Rect};

/// An ordered set of non-overlapping rects in scan order.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Region {
    rects: Vec<Rect>,
}

/// Boolean operation selector for the band sweep.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    Union,
    Intersect,
    Subtract,
}

impl Op {
    /// Whether strips covered only by the left operand survive.
    const fn keeps_lhs_only(self) -> bool {
        !matches!(self, Self::Intersect)
    }

    /// Whether strips covered only by the right operand survive.
    const fn keeps_rhs_only(self) -> bool {
        matches!(self, Self::Union)
    }
}

impl Region {
    /// Creates an empty region.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering a single rect (empty if the rect is empty).
    #[inline]
    #[must_use]
    pub fn from_rect(r: Rect) -> Self {
        let mut out = Self::new();
        out.set(r);
        out
    }

    /// Resets the region to a single rect.
    #[inline]
    pub fn set(&mut self, r: Rect) {
        self.rects.clear();
        if !r.is_empty() {
            self.rects.push(r);
        }
    }

    /// Removes everything.
    #[inline]
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Whether the region covers no pixels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// The stored rects, in scan order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Rect] {
        &self.rects
    }

    /// Iterates the rects in scan order.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Rect> {
        self.rects.iter()
    }

    /// The bounding rect of the whole region.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let mut b = Rect::EMPTY;
        for r in &self.rects {
            b = b.union_bounds(r);
        }
        b
    }

    /// Whether the point is covered.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.rects.iter().any(|r| r.contains(p))
    }

    /// Translates every rect by `(dx, dy)`.
    ///
    /// Translation preserves canonical form, so this is a straight pass over
    /// the stored rects.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for r in &mut self.rects {
            *r = r.offset(dx, dy);
        }
    }

    // -- Boolean operations ------------------------------------------------

    /// `self ∪ other`, in place.
    pub fn or_self(&mut self, other: &Self) {
        self.rects = merge(&self.rects, &other.rects, Op::Union);
    }

    /// `self ∩ other`, in place.
    pub fn and_self(&mut self, other: &Self) {
        self.rects = merge(&self.rects, &other.rects, Op::Intersect);
    }

    /// `self ∖ other`, in place.
    pub fn subtract_self(&mut self, other: &Self) {
        self.rects = merge(&self.rects, &other.rects, Op::Subtract);
    }

    /// `self ∪ {r}`, in place.
    pub fn or_rect(&mut self, r: Rect) {
        if !r.is_empty() {
            self.rects = merge(&self.rects, slice::from_ref(&r), Op::Union);
        }
    }

    /// `self ∩ {r}`, in place.
    pub fn and_rect(&mut self, r: Rect) {
        if r.is_empty() {
            self.rects.clear();
        } else {
            self.rects = merge(&self.rects, slice::from_ref(&r), Op::Intersect);
        }
    }

    /// `self ∖ {r}`, in place.
    pub fn subtract_rect(&mut self, r: Rect) {
        if !r.is_empty() {
            self.rects = merge(&self.rects, slice::from_ref(&r), Op::Subtract);
        }
    }

    /// `self ∪ other`, returning a new region.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        Self {
            rects: merge(&self.rects, &other.rects, Op::Union),
        }
    }

    /// `self ∩ other`, returning a new region.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self {
            rects: merge(&self.rects, &other.rects, Op::Intersect),
        }
    }

    /// `self ∖ other`, returning a new region.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        Self {
            rects: merge(&self.rects, &other.rects, Op::Subtract),
        }
    }
}

impl From<Rect> for Region {
    #[inline]
    fn from(r: Rect) -> Self {
        Self::from_rect(r)
    }
}

impl<'a> IntoIterator for &'a Region {
    type Item = &'a Rect;
    type IntoIter = slice::Iter<'a, Rect>;

    fn into_iter(self) -> Self::IntoIter {
        self.rects.iter()
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region")?;
        f.debug_list().entries(self.rects.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Band-merge sweep
// ---------------------------------------------------------------------------

/// Walks one canonical rect list band by band.
///
/// `top` tracks the unconsumed part of the current band, which lets the sweep
/// split a band when the other operand's band boundaries cut through it.
struct BandCursor<'a> {
    rects: &'a [Rect],
    /// First rect of the current band.
    start: usize,
    /// One past the last rect of the current band.
    end: usize,
    /// Top of the *remaining* part of the current band.
    top: i32,
}

impl<'a> BandCursor<'a> {
    fn new(rects: &'a [Rect]) -> Self {
        let end = band_end(rects, 0);
        let top = rects.first().map_or(0, |r| r.top);
        Self {
            rects,
            start: 0,
            end,
            top,
        }
    }

    fn exhausted(&self) -> bool {
        self.start >= self.rects.len()
    }

    fn bottom(&self) -> i32 {
        self.rects[self.start].bottom
    }

    fn spans(&self) -> &'a [Rect] {
        &self.rects[self.start..self.end]
    }

    /// Consumes the band up to `y`; moves to the next band at the boundary.
    fn advance_to(&mut self, y: i32) {
        if y >= self.bottom() {
            self.start = self.end;
            self.end = band_end(self.rects, self.start);
            if !self.exhausted() {
                self.top = self.rects[self.start].top;
            }
        } else {
            self.top = y;
        }
    }
}

/// One past the last index of the band starting at `start`.
fn band_end(rects: &[Rect], start: usize) -> usize {
    if start >= rects.len() {
        return start;
    }
    let top = rects[start].top;
    let mut end = start + 1;
    while end < rects.len() && rects[end].top == top {
        end += 1;
    }
    end
}

/// Runs one boolean operation over two canonical rect lists.
fn merge(lhs: &[Rect], rhs: &[Rect], op: Op) -> Vec<Rect> {
    let mut out = Vec::new();
    let mut ca = BandCursor::new(lhs);
    let mut cb = BandCursor::new(rhs);
    let mut spans = Vec::new();

    while !ca.exhausted() && !cb.exhausted() {
        if ca.top < cb.top {
            let y1 = ca.bottom().min(cb.top);
            if op.keeps_lhs_only() {
                copy_spans(ca.spans(), &mut spans);
                push_band(&mut out, ca.top, y1, &spans);
            }
            ca.advance_to(y1);
        } else if cb.top < ca.top {
            let y1 = cb.bottom().min(ca.top);
            if op.keeps_rhs_only() {
                copy_spans(cb.spans(), &mut spans);
                push_band(&mut out, cb.top, y1, &spans);
            }
            cb.advance_to(y1);
        } else {
            let top = ca.top;
            let y1 = ca.bottom().min(cb.bottom());
            match op {
                Op::Union => span_union(ca.spans(), cb.spans(), &mut spans),
                Op::Intersect => span_intersect(ca.spans(), cb.spans(), &mut spans),
                Op::Subtract => span_subtract(ca.spans(), cb.spans(), &mut spans),
            }
            push_band(&mut out, top, y1, &spans);
            ca.advance_to(y1);
            cb.advance_to(y1);
        }
    }

    if op.keeps_lhs_only() {
        while !ca.exhausted() {
            let y1 = ca.bottom();
            copy_spans(ca.spans(), &mut spans);
            push_band(&mut out, ca.top, y1, &spans);
            ca.advance_to(y1);
        }
    }
    if op.keeps_rhs_only() {
        while !cb.exhausted() {
            let y1 = cb.bottom();
            copy_spans(cb.spans(), &mut spans);
            push_band(&mut out, cb.top, y1, &spans);
            cb.advance_to(y1);
        }
    }
    out
}

fn copy_spans(band: &[Rect], out: &mut Vec<(i32, i32)>) {
    out.clear();
    out.extend(band.iter().map(|r| (r.left, r.right)));
}

/// Union of two sorted disjoint span lists, coalescing touching spans.
fn span_union(a: &[Rect], b: &[Rect], out: &mut Vec<(i32, i32)>) {
    out.clear();
    let mut ia = 0;
    let mut ib = 0;
    let mut pending: Option<(i32, i32)> = None;
    loop {
        let next = match (a.get(ia), b.get(ib)) {
            (Some(ra), Some(rb)) => {
                if ra.left <= rb.left {
                    ia += 1;
                    (ra.left, ra.right)
                } else {
                    ib += 1;
                    (rb.left, rb.right)
                }
            }
            (Some(ra), None) => {
                ia += 1;
                (ra.left, ra.right)
            }
            (None, Some(rb)) => {
                ib += 1;
                (rb.left, rb.right)
            }
            (None, None) => break,
        };
        match pending {
            Some((x0, x1)) if next.0 <= x1 => {
                pending = Some((x0, x1.max(next.1)));
            }
            Some(p) => {
                out.push(p);
                pending = Some(next);
            }
            None => pending = Some(next),
        }
    }
    if let Some(p) = pending {
        out.push(p);
    }
}

/// Intersection of two sorted disjoint span lists.
fn span_intersect(a: &[Rect], b: &[Rect], out: &mut Vec<(i32, i32)>) {
    out.clear();
    let mut ia = 0;
    let mut ib = 0;
    while ia < a.len() && ib < b.len() {
        let x0 = a[ia].left.max(b[ib].left);
        let x1 = a[ia].right.min(b[ib].right);
        if x0 < x1 {
            out.push((x0, x1));
        }
        if a[ia].right <= b[ib].right {
            ia += 1;
        } else {
            ib += 1;
        }
    }
}

/// `a ∖ b` over sorted disjoint span lists.
fn span_subtract(a: &[Rect], b: &[Rect], out: &mut Vec<(i32, i32)>) {
    out.clear();
    let mut ib = 0;
    for ra in a {
        let mut x0 = ra.left;
        let x1 = ra.right;
        // Skip b-spans entirely left of the remaining a-span.
        while ib < b.len() && b[ib].right <= x0 {
            ib += 1;
        }
        let mut jb = ib;
        while x0 < x1 && jb < b.len() && b[jb].left < x1 {
            if b[jb].left > x0 {
                out.push((x0, b[jb].left));
            }
            x0 = x0.max(b[jb].right);
            jb += 1;
        }
        if x0 < x1 {
            out.push((x0, x1));
        }
    }
}

/// Appends one band of spans, coalescing with the previous band when the
/// bands touch and carry identical spans.
fn push_band(out: &mut Vec<Rect>, top: i32, bottom: i32, spans: &[(i32, i32)]) {
    if top >= bottom || spans.is_empty() {
        return;
    }
    let band_start = out.len();
    out.extend(
        spans
            .iter()
            .map(|&(x0, x1)| Rect::new(x0, top, x1, bottom)),
    );

    // Find the previous band.
    if band_start == 0 {
        return;
    }
    let prev_bottom = out[band_start - 1].bottom;
    if prev_bottom != top {
        return;
    }
    let prev_top = out[band_start - 1].top;
    let mut prev_start = band_start;
    while prev_start > 0 && out[prev_start - 1].top == prev_top {
        prev_start -= 1;
    }
    if band_start - prev_start != spans.len() {
        return;
    }
    let identical = (0..spans.len()).all(|i| {
        let p = &out[prev_start + i];
        p.left == spans[i].0 && p.right == spans[i].1
    });
    if !identical {
        return;
    }
    for r in &mut out[prev_start..band_start] {
        r.bottom = bottom;
    }
    out.truncate(band_start);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    /// Checks the canonical-form invariant directly on the stored rects.
    fn assert_canonical(region: &Region) {
        let rects = region.as_slice();
        for r in rects {
            assert!(!r.is_empty(), "stored rect must be non-empty: {r:?}");
        }
        for w in rects.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            if a.top == b.top {
                assert_eq!(a.bottom, b.bottom, "band rects share bottom");
                assert!(a.right < b.left, "band spans disjoint, non-touching");
            } else {
                assert!(a.top < b.top, "bands in scan order");
                assert!(a.bottom <= b.top, "bands never overlap vertically");
            }
        }
        // Touching bands with identical spans must have been coalesced.
        let mut i = 0;
        while i < rects.len() {
            let band_a = super::band_end(rects, i);
            if band_a >= rects.len() {
                break;
            }
            let band_b = super::band_end(rects, band_a);
            let (a, b) = (&rects[i..band_a], &rects[band_a..band_b]);
            if a[0].bottom == b[0].top && a.len() == b.len() {
                let same = a
                    .iter()
                    .zip(b.iter())
                    .all(|(x, y)| x.left == y.left && x.right == y.right);
                assert!(!same, "touching identical bands must coalesce: {rects:?}");
            }
            i = band_a;
        }
    }

    #[test]
    fn empty_region_basics() {
        let r = Region::new();
        assert!(r.is_empty());
        assert_eq!(r.bounds(), Rect::EMPTY);
        assert!(!r.contains(Point::ZERO));
    }

    #[test]
    fn set_ignores_empty_rect() {
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.set(Rect::new(5, 5, 5, 20));
        assert!(r.is_empty());
    }

    #[test]
    fn union_of_disjoint_rects() {
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.or_rect(Rect::new(20, 20, 30, 30));
        assert_eq!(r.as_slice().len(), 2);
        assert_eq!(r.bounds(), Rect::new(0, 0, 30, 30));
        assert_canonical(&r);
    }

    #[test]
    fn union_coalesces_touching_spans_in_band() {
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.or_rect(Rect::new(10, 0, 20, 10));
        assert_eq!(r.as_slice(), &[Rect::new(0, 0, 20, 10)]);
    }

    #[test]
    fn union_coalesces_identical_stacked_bands() {
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.or_rect(Rect::new(0, 10, 10, 20));
        assert_eq!(r.as_slice(), &[Rect::new(0, 0, 10, 20)]);
    }

    #[test]
    fn union_overlapping_rects() {
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.or_rect(Rect::new(5, 5, 15, 15));
        // Three bands: top-only, overlap, bottom-only.
        assert_eq!(
            r.as_slice(),
            &[
                Rect::new(0, 0, 10, 5),
                Rect::new(0, 5, 15, 10),
                Rect::new(5, 10, 15, 15),
            ]
        );
        assert_canonical(&r);
        assert!(r.contains(Point::new(12, 12)));
        assert!(!r.contains(Point::new(12, 2)));
    }

    #[test]
    fn intersect_basic() {
        let a = Region::from_rect(Rect::new(0, 0, 10, 10));
        let b = Region::from_rect(Rect::new(5, 5, 15, 15));
        let c = a.and(&b);
        assert_eq!(c.as_slice(), &[Rect::new(5, 5, 10, 10)]);
        assert_canonical(&c);
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = Region::from_rect(Rect::new(0, 0, 10, 10));
        let b = Region::from_rect(Rect::new(10, 0, 20, 10));
        assert!(a.and(&b).is_empty(), "touching edges share no pixels");
    }

    #[test]
    fn subtract_punches_hole() {
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.subtract_rect(Rect::new(4, 4, 6, 6));
        assert_eq!(
            r.as_slice(),
            &[
                Rect::new(0, 0, 10, 4),
                Rect::new(0, 4, 4, 6),
                Rect::new(6, 4, 10, 6),
                Rect::new(0, 6, 10, 10),
            ]
        );
        assert_canonical(&r);
        assert!(!r.contains(Point::new(5, 5)));
        assert!(r.contains(Point::new(3, 5)));
    }

    #[test]
    fn subtract_self_is_empty() {
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.or_rect(Rect::new(5, 5, 15, 15));
        r.or_rect(Rect::new(-3, 20, 40, 21));
        let copy = r.clone();
        r.subtract_self(&copy);
        assert!(r.is_empty(), "R \\ R must be empty for any R");
    }

    #[test]
    fn absorption_property() {
        // (R1 ∪ R2) ∩ R1 == R1 for arbitrary regions.
        let mut r1 = Region::from_rect(Rect::new(0, 0, 10, 10));
        r1.or_rect(Rect::new(20, 3, 25, 40));
        let mut r2 = Region::from_rect(Rect::new(5, 5, 30, 12));
        r2.or_rect(Rect::new(-5, -5, 2, 2));
        let combined = r1.or(&r2).and(&r1);
        assert_eq!(combined, r1);
        assert_canonical(&combined);
    }

    #[test]
    fn subtract_rejoins_hole() {
        // Punch a hole, fill it back in; canonical form must collapse to one rect.
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.subtract_rect(Rect::new(4, 4, 6, 6));
        r.or_rect(Rect::new(4, 4, 6, 6));
        assert_eq!(r.as_slice(), &[Rect::new(0, 0, 10, 10)]);
    }

    #[test]
    fn and_rect_clips_to_window() {
        let mut r = Region::from_rect(Rect::new(-10, -10, 5, 5));
        r.or_rect(Rect::new(3, 3, 30, 4));
        r.and_rect(Rect::new(0, 0, 20, 20));
        assert_canonical(&r);
        assert_eq!(r.bounds(), Rect::new(0, 0, 20, 5));
        assert!(!r.contains(Point::new(-1, 0)));
        assert!(r.contains(Point::new(4, 3)));
    }

    #[test]
    fn translate_moves_everything() {
        let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
        r.subtract_rect(Rect::new(4, 4, 6, 6));
        let rect_count = r.as_slice().len();
        r.translate(100, 50);
        assert_eq!(r.as_slice().len(), rect_count);
        assert_eq!(r.bounds(), Rect::new(100, 50, 110, 60));
        assert!(r.contains(Point::new(101, 51)));
        assert!(!r.contains(Point::new(105, 55)), "hole moved too");
        assert_canonical(&r);
    }

    #[test]
    fn union_with_empty_is_identity() {
        let mut r = Region::from_rect(Rect::new(1, 2, 3, 4));
        let before = r.clone();
        r.or_self(&Region::new());
        assert_eq!(r, before);
        let mut e = Region::new();
        e.or_self(&before);
        assert_eq!(e, before);
    }

    #[test]
    fn intersect_with_empty_is_empty() {
        let mut r = Region::from_rect(Rect::new(1, 2, 3, 4));
        r.and_self(&Region::new());
        assert!(r.is_empty());
    }

    #[test]
    fn complex_op_chain_stays_canonical() {
        let mut r = Region::new();
        let rects = vec![
            Rect::new(0, 0, 50, 50),
            Rect::new(25, 25, 75, 75),
            Rect::new(60, 0, 100, 30),
            Rect::new(-20, 40, 10, 90),
        ];
        for rect in &rects {
            r.or_rect(*rect);
            assert_canonical(&r);
        }
        for rect in &rects {
            let mut clipped = r.clone();
            clipped.and_rect(*rect);
            assert_canonical(&clipped);
            assert_eq!(clipped.bounds(), *rect, "clip to covered rect");
        }
        r.subtract_rect(Rect::new(10, 10, 70, 70));
        assert_canonical(&r);
        assert!(!r.contains(Point::new(30, 30)));
        assert!(r.contains(Point::new(5, 5)));
    }

    #[test]
    fn scan_order_after_mixed_bands() {
        let mut r = Region::from_rect(Rect::new(0, 0, 4, 12));
        r.or_rect(Rect::new(8, 0, 12, 12));
        r.or_rect(Rect::new(0, 4, 12, 8));
        // Middle band spans the full width; outer bands keep two spans.
        assert_eq!(
            r.as_slice(),
            &[
                Rect::new(0, 0, 4, 4),
                Rect::new(8, 0, 12, 4),
                Rect::new(0, 4, 12, 8),
                Rect::new(0, 8, 4, 12),
                Rect::new(8, 8, 12, 12),
            ]
        );
        assert_canonical(&r);
    }
}

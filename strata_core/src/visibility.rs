// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame visible-region sweep.
//!
//! One front-to-back pass over the committed layer stack computes, for every
//! layer, the screen area it actually contributes (its footprint minus the
//! opaque layers stacked above it) and the area covered by anything above
//! it. The pass accumulates the screen dirty region from each layer's
//! change since the previous sweep, so composition can redraw exactly what
//! moved, resized, or was exposed.
//!
//! Coverage tracking is deliberately asymmetric: a layer's *visible* region
//! treats translucent layers above as see-through, while its *covered*
//! region counts them. Occlusion (what composition may skip) only ever
//! comes from layers that declare opaque content at full alpha under a
//! rect-preserving transform.

use alloc::vec::Vec;

use crate::geometry::Rect;
use crate::layer::{LayerState, LayerStore};
use crate::region::Region;
use crate::transform::Transform;

/// The transform taking a layer's content coordinates to the screen:
/// the display transform over the layer's position and own transform.
pub(crate) fn screen_transform(global: &Transform, state: &LayerState) -> Transform {
    let local = &Transform::from_translate(state.position.x as f32, state.position.y as f32)
        * &state.transform;
    global * &local
}

/// Screen-space results of one sweep.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepOutput {
    /// Union of every layer's change since the previous sweep.
    pub dirty: Region,
    /// Screen area covered by opaque content; its complement is the
    /// background hole composition must fill.
    pub opaque: Region,
    /// Screen area covered by any visible layer, translucent included.
    pub covered: Region,
    /// Whether any visible layer forbids capture of this frame.
    pub secure: bool,
}

/// Recomputes every layer's visible and covered regions against `screen`.
///
/// `global` is the display transform applied on top of each layer's own
/// position and transform. Reads the drawing state, writes
/// `visible_screen`/`covered_screen` back into the store, and consumes the
/// per-layer content-changed marks.
pub fn compute_visible_regions(
    store: &mut LayerStore,
    screen: Rect,
    global: &Transform,
) -> SweepOutput {
    let mut out = SweepOutput::default();
    let mut above_opaque = Region::new();
    let mut above_covered = Region::new();

    // Front to back, so occlusion by upper layers is known when each lower
    // layer is reached.
    let order: Vec<u32> = store.draw_order().to_vec();
    for &idx in order.iter().rev() {
        let i = idx as usize;
        let state = &store.drawing[i];

        let mut visible = Region::new();
        let mut opaque = Region::new();

        if state.is_visible_candidate() {
            let tr = screen_transform(global, state);
            let footprint = Rect::from_size(state.width, state.height);
            visible = tr.transform_region(&Region::from_rect(footprint));
            visible.and_rect(screen);

            if !visible.is_empty() {
                if !state.flags.opaque && !state.transparent_hint.is_empty() {
                    // The hint is only usable when it maps exactly; a
                    // bounding-box approximation would overstate
                    // transparency.
                    if tr.preserves_rects() {
                        visible.subtract_self(&tr.transform_region(&state.transparent_hint));
                    }
                }
                if state.alpha >= 1.0 && state.flags.opaque && tr.preserves_rects() {
                    opaque = visible.clone();
                }
            }
        }

        // Covered is clipped against this layer's footprint before
        // occlusion is subtracted from it.
        let covered = above_covered.and(&visible);
        above_covered.or_self(&visible);
        visible.subtract_self(&above_opaque);

        let mut dirty;
        if store.contents_dirty[i] {
            // New content invalidates the whole footprint, old and new.
            dirty = visible.clone();
            dirty.or_self(&store.visible_screen[i]);
            store.contents_dirty[i] = false;
        } else {
            // Two components: what is visible now and was covered before
            // (conservatively, it may have been exposed), and what is
            // exposed now less what was exposed before (resize growth).
            let new_exposed = visible.subtract(&covered);
            let old_exposed = store.visible_screen[i].subtract(&store.covered_screen[i]);
            dirty = visible.and(&store.covered_screen[i]);
            dirty.or_self(&new_exposed.subtract(&old_exposed));
        }
        dirty.subtract_self(&above_opaque);
        out.dirty.or_self(&dirty);

        above_opaque.or_self(&opaque);

        store.visible_screen[i] = visible;
        store.covered_screen[i] = covered;

        if state.flags.secure && !store.visible_screen[i].is_empty() {
            out.secure = true;
        }
    }

    out.opaque = above_opaque;
    out.covered = above_covered;
    out
}

#[cfg(test)]
mod tests {
    use crate::geometry::Point;
    use crate::layer::{LayerFlags, LayerId};

    use super::*;

    const SCREEN: Rect = Rect::new(0, 0, 320, 240);

    fn opaque_flags() -> LayerFlags {
        LayerFlags {
            opaque: true,
            ..LayerFlags::default()
        }
    }

    fn add_layer(store: &mut LayerStore, r: Rect, z: u32, flags: LayerFlags) -> LayerId {
        #[expect(clippy::cast_sign_loss, reason = "test rects are positive")]
        let id = store
            .create_layer(r.width() as u32, r.height() as u32, flags, 2)
            .unwrap();
        store.set_position(id, Point::new(r.left, r.top)).unwrap();
        store.set_z(id, z).unwrap();
        id
    }

    fn sweep(store: &mut LayerStore) -> SweepOutput {
        store.commit_transactions();
        compute_visible_regions(store, SCREEN, &Transform::identity())
    }

    #[test]
    fn single_opaque_layer_fills_its_footprint() {
        let mut store = LayerStore::new(8);
        let id = add_layer(&mut store, Rect::new(10, 10, 110, 110), 0, opaque_flags());
        let out = sweep(&mut store);

        let footprint = Region::from_rect(Rect::new(10, 10, 110, 110));
        assert_eq!(*store.visible_region(id).unwrap(), footprint);
        assert_eq!(out.opaque, footprint);
        assert_eq!(out.dirty, footprint, "first frame exposes everything");
        assert!(!out.secure);
    }

    #[test]
    fn opaque_layer_occludes_the_one_below() {
        let mut store = LayerStore::new(8);
        let below = add_layer(&mut store, Rect::new(0, 0, 100, 100), 0, opaque_flags());
        let above = add_layer(&mut store, Rect::new(0, 0, 60, 100), 1, opaque_flags());
        sweep(&mut store);

        assert_eq!(
            store.visible_region(below).unwrap().as_slice(),
            &[Rect::new(60, 0, 100, 100)]
        );
        assert_eq!(
            *store.visible_region(above).unwrap(),
            Region::from_rect(Rect::new(0, 0, 60, 100))
        );
        // Covered counts the layer above even where occluded.
        assert_eq!(
            store.covered_screen[below.index() as usize].as_slice(),
            &[Rect::new(0, 0, 60, 100)]
        );
    }

    #[test]
    fn translucent_layer_covers_but_does_not_occlude() {
        let mut store = LayerStore::new(8);
        let below = add_layer(&mut store, Rect::new(0, 0, 100, 100), 0, opaque_flags());
        let above = add_layer(&mut store, Rect::new(0, 0, 60, 100), 1, LayerFlags::default());
        let out = sweep(&mut store);

        // The whole lower layer stays visible under the translucent one.
        assert_eq!(
            *store.visible_region(below).unwrap(),
            Region::from_rect(Rect::new(0, 0, 100, 100))
        );
        assert_eq!(
            store.covered_screen[below.index() as usize].as_slice(),
            &[Rect::new(0, 0, 60, 100)]
        );
        assert!(store.is_alive(above));
        assert_eq!(out.opaque, Region::from_rect(Rect::new(0, 0, 100, 100)));
    }

    #[test]
    fn three_opaque_layers_stacked() {
        let mut store = LayerStore::new(8);
        let a = add_layer(&mut store, Rect::new(0, 0, 90, 30), 0, opaque_flags());
        let b = add_layer(&mut store, Rect::new(0, 0, 60, 30), 1, opaque_flags());
        let c = add_layer(&mut store, Rect::new(0, 0, 30, 30), 2, opaque_flags());
        let out = sweep(&mut store);

        assert_eq!(
            store.visible_region(a).unwrap().as_slice(),
            &[Rect::new(60, 0, 90, 30)]
        );
        assert_eq!(
            store.visible_region(b).unwrap().as_slice(),
            &[Rect::new(30, 0, 60, 30)]
        );
        assert_eq!(
            store.visible_region(c).unwrap().as_slice(),
            &[Rect::new(0, 0, 30, 30)]
        );
        assert_eq!(out.opaque, Region::from_rect(Rect::new(0, 0, 90, 30)));
    }

    #[test]
    fn hidden_layer_contributes_nothing() {
        let mut store = LayerStore::new(8);
        let id = add_layer(&mut store, Rect::new(0, 0, 50, 50), 0, opaque_flags());
        sweep(&mut store);

        let mut flags = opaque_flags();
        flags.hidden = true;
        store.set_flags(id, flags).unwrap();
        let out = sweep(&mut store);

        assert!(store.visible_region(id).unwrap().is_empty());
        assert!(out.opaque.is_empty());
        assert_eq!(
            out.dirty,
            Region::from_rect(Rect::new(0, 0, 50, 50)),
            "hiding exposes what was underneath"
        );
    }

    #[test]
    fn transparent_hint_punches_through_opacity_tracking() {
        let mut store = LayerStore::new(8);
        let id = add_layer(&mut store, Rect::new(0, 0, 100, 100), 0, LayerFlags::default());
        store
            .set_transparent_hint(id, Region::from_rect(Rect::new(20, 20, 80, 80)))
            .unwrap();
        store.set_alpha(id, 1.0).unwrap();
        sweep(&mut store);

        // The hole is not part of the visible region.
        let vis = store.visible_region(id).unwrap();
        assert!(!vis.contains(Point::new(50, 50)));
        assert!(vis.contains(Point::new(10, 10)));
    }

    #[test]
    fn moving_a_layer_dirties_old_and_new_exposure() {
        let mut store = LayerStore::new(8);
        let id = add_layer(&mut store, Rect::new(0, 0, 50, 50), 0, opaque_flags());
        sweep(&mut store);

        store.set_position(id, Point::new(30, 0)).unwrap();
        let out = sweep(&mut store);

        // Old location is newly exposed, new location newly covered.
        let mut expected = Region::from_rect(Rect::new(0, 0, 50, 50));
        expected.or_rect(Rect::new(30, 0, 80, 50));
        assert_eq!(out.dirty, expected);
    }

    #[test]
    fn content_change_dirties_only_the_visible_part() {
        let mut store = LayerStore::new(8);
        let below = add_layer(&mut store, Rect::new(0, 0, 100, 100), 0, opaque_flags());
        let _above = add_layer(&mut store, Rect::new(0, 0, 60, 100), 1, opaque_flags());
        sweep(&mut store);

        store.note_content_changed(below.index());
        let out = sweep(&mut store);
        assert_eq!(
            out.dirty.as_slice(),
            &[Rect::new(60, 0, 100, 100)],
            "occluded part of the repaint is masked off"
        );
    }

    #[test]
    fn occluded_secure_layer_does_not_lock_the_screen() {
        let mut store = LayerStore::new(8);
        let secure = LayerFlags {
            secure: true,
            opaque: true,
            ..LayerFlags::default()
        };
        add_layer(&mut store, Rect::new(0, 0, 50, 50), 0, secure);
        add_layer(&mut store, Rect::new(0, 0, 50, 50), 1, opaque_flags());
        let out = sweep(&mut store);
        assert!(!out.secure, "fully occluded secure layer is invisible");

        let mut store = LayerStore::new(8);
        add_layer(&mut store, Rect::new(0, 0, 50, 50), 0, secure);
        let out = sweep(&mut store);
        assert!(out.secure);
    }

    #[test]
    fn zero_alpha_layer_is_skipped_but_kept_in_order() {
        let mut store = LayerStore::new(8);
        let id = add_layer(&mut store, Rect::new(0, 0, 40, 40), 0, opaque_flags());
        store.set_alpha(id, 0.0).unwrap();
        let out = sweep(&mut store);
        assert!(store.visible_region(id).unwrap().is_empty());
        assert!(out.dirty.is_empty());
        assert_eq!(store.draw_order(), [id.index()]);
    }

    #[test]
    fn rotated_screen_transform_maps_footprints() {
        let mut store = LayerStore::new(8);
        let id = add_layer(&mut store, Rect::new(0, 0, 40, 20), 0, opaque_flags());
        store.commit_transactions();
        // Quarter turn plus a shift back onto the screen.
        let global = &Transform::from_translate(240.0, 0.0)
            * &Transform::from_orientation(Transform::ROT_90).unwrap();
        let out = compute_visible_regions(&mut store, SCREEN, &global);
        assert_eq!(
            store.visible_region(id).unwrap().as_slice(),
            &[Rect::new(220, 0, 240, 40)]
        );
        assert_eq!(out.opaque, Region::from_rect(Rect::new(220, 0, 240, 40)));
    }
}

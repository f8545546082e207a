// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays layer storage with allocation, transactions, and
//! compositor-side bookkeeping.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use crate::geometry::Point;
use crate::region::Region;
use crate::transform::Transform;

use super::id::LayerId;
use super::slots::BufferSlots;
use super::state::{LayerFlags, LayerState};

/// Default layer cap, matching the fixed handle table the protocol allots
/// per client.
pub const DEFAULT_MAX_LAYERS: u32 = 31;

/// Errors reported by the store.
///
/// Handles arrive over the wire, so a dead or forged [`LayerId`] must be an
/// error the caller can turn into a traced no-op, never a crash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The handle's slot was removed or recycled.
    StaleLayer(LayerId),
    /// The arena is at its configured capacity.
    TooManyLayers,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleLayer(id) => write!(f, "stale layer handle {id:?}"),
            Self::TooManyLayers => write!(f, "layer limit reached"),
        }
    }
}

impl core::error::Error for StoreError {}

/// What one transaction batch changed, reported by
/// [`commit_transactions`](LayerStore::commit_transactions).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionOutcome {
    /// Whether visible regions must be recomputed this frame.
    pub geometry_changed: bool,
    /// Slot indices whose drawing state was refreshed.
    pub committed: Vec<u32>,
    /// Screen area uncovered by layers removed since the last commit.
    pub removed_damage: Region,
}

/// Struct-of-arrays storage for all layers.
///
/// Layers are addressed by [`LayerId`] handles. Internally, each layer
/// occupies a slot in parallel arrays. Removal tombstones the slot; it is
/// recycled through a free list only once every external reference is
/// released, and generation counters make recycled handles detectable.
///
/// Mutations land in the `current` state arrays and become visible to
/// composition only when [`commit_transactions`](Self::commit_transactions)
/// copies them into `drawing`, so a half-applied batch can never be drawn.
#[derive(Debug)]
pub struct LayerStore {
    // -- Double-buffered state --
    pub(crate) current: Vec<LayerState>,
    pub(crate) drawing: Vec<LayerState>,

    // -- Compositor-computed (written by the visibility sweep) --
    pub(crate) visible_screen: Vec<Region>,
    pub(crate) covered_screen: Vec<Region>,
    pub(crate) contents_dirty: Vec<bool>,

    // -- Buffer hand-off --
    pub(crate) slots: Vec<Option<Arc<BufferSlots>>>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) tombstone: Vec<bool>,
    pub(crate) external_refs: Vec<u32>,
    birth: Vec<u64>,
    free_list: Vec<u32>,
    len: u32,
    next_birth: u64,
    max_layers: u32,

    // -- Draw order cache --
    draw_order: Vec<u32>,
    order_dirty: bool,

    // -- Transaction tracking --
    transaction_pending: bool,
    removed_damage: Region,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LAYERS)
    }
}

impl LayerStore {
    /// Creates an empty store holding at most `max_layers` live layers.
    #[must_use]
    pub fn new(max_layers: u32) -> Self {
        Self {
            current: Vec::new(),
            drawing: Vec::new(),
            visible_screen: Vec::new(),
            covered_screen: Vec::new(),
            contents_dirty: Vec::new(),
            slots: Vec::new(),
            generation: Vec::new(),
            tombstone: Vec::new(),
            external_refs: Vec::new(),
            birth: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            next_birth: 0,
            max_layers,
            draw_order: Vec::new(),
            order_dirty: false,
            transaction_pending: false,
            removed_damage: Region::new(),
        }
    }

    // -- Allocation API --

    /// Creates a layer with one external reference and a fresh slot pool.
    ///
    /// The layer starts at the origin with z 0, full alpha, an identity
    /// transform, and no transparent hint.
    pub fn create_layer(
        &mut self,
        width: u32,
        height: u32,
        flags: LayerFlags,
        slot_count: usize,
    ) -> Result<LayerId, StoreError> {
        let state = LayerState::new(width, height, flags);
        let pool = Arc::new(BufferSlots::new(slot_count));
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.current[i] = state.clone();
            self.drawing[i] = state;
            self.visible_screen[i].clear();
            self.covered_screen[i].clear();
            self.contents_dirty[i] = false;
            self.slots[i] = Some(pool);
            self.tombstone[i] = false;
            self.external_refs[i] = 1;
            self.birth[i] = self.next_birth;
            idx
        } else {
            // Allocate a new slot.
            if self.len >= self.max_layers {
                return Err(StoreError::TooManyLayers);
            }
            let idx = self.len;
            self.len += 1;
            self.current.push(state.clone());
            self.drawing.push(state);
            self.visible_screen.push(Region::new());
            self.covered_screen.push(Region::new());
            self.contents_dirty.push(false);
            self.slots.push(Some(pool));
            self.generation.push(0);
            self.tombstone.push(false);
            self.external_refs.push(1);
            self.birth.push(self.next_birth);
            idx
        };
        self.next_birth += 1;

        self.order_dirty = true;
        self.transaction_pending = true;

        Ok(LayerId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    /// Adds an external reference to a layer.
    ///
    /// References may outlive removal; the slot is not recycled while any
    /// remain.
    pub fn retain(&mut self, id: LayerId) -> Result<(), StoreError> {
        let idx = self.check_allocated(id)?;
        self.external_refs[idx] += 1;
        Ok(())
    }

    /// Drops an external reference. Returns `true` when this was the last
    /// reference to a removed layer and the slot was recycled.
    pub fn release(&mut self, id: LayerId) -> Result<bool, StoreError> {
        let idx = self.check_allocated(id)?;
        debug_assert!(self.external_refs[idx] > 0, "unbalanced release");
        self.external_refs[idx] = self.external_refs[idx].saturating_sub(1);
        if self.external_refs[idx] == 0 && self.tombstone[idx] {
            self.recycle(id.idx);
            return Ok(true);
        }
        Ok(false)
    }

    /// Removes a layer from composition.
    ///
    /// The slot is tombstoned, its last visible region is banked as damage
    /// for the next commit, and it leaves the draw order immediately. The
    /// caller still owns its reference and must [`release`](Self::release)
    /// it.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<(), StoreError> {
        let idx = self.check(id)?;
        self.removed_damage.or_self(&self.visible_screen[idx]);
        self.tombstone[idx] = true;
        self.order_dirty = true;
        self.transaction_pending = true;
        if self.external_refs[idx] == 0 {
            self.recycle(id.idx);
        }
        Ok(())
    }

    /// Returns whether the given handle refers to a live (non-removed)
    /// layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.tombstone[id.idx as usize]
    }

    /// Number of live layers.
    #[must_use]
    pub fn live_count(&self) -> u32 {
        let dead = self.tombstone.iter().filter(|&&t| t).count();
        #[expect(
            clippy::cast_possible_truncation,
            reason = "bounded by the u32 layer cap"
        )]
        {
            self.len - dead as u32
        }
    }

    // -- Property getters --

    /// The pending (uncommitted) state of a layer.
    pub fn current(&self, id: LayerId) -> Result<&LayerState, StoreError> {
        let idx = self.check(id)?;
        Ok(&self.current[idx])
    }

    /// The committed state composition reads.
    pub fn drawing(&self, id: LayerId) -> Result<&LayerState, StoreError> {
        let idx = self.check(id)?;
        Ok(&self.drawing[idx])
    }

    /// The layer's visible region in screen space, as of the last sweep.
    pub fn visible_region(&self, id: LayerId) -> Result<&Region, StoreError> {
        let idx = self.check(id)?;
        Ok(&self.visible_screen[idx])
    }

    /// The layer's buffer slot pool, shared with its producer.
    pub fn slot_pool(&self, id: LayerId) -> Result<Arc<BufferSlots>, StoreError> {
        let idx = self.check(id)?;
        match &self.slots[idx] {
            Some(pool) => Ok(Arc::clone(pool)),
            None => Err(StoreError::StaleLayer(id)),
        }
    }

    // -- Transaction setters (latch into `current`, applied on commit) --

    /// Sets the layer position in screen space.
    pub fn set_position(&mut self, id: LayerId, position: Point) -> Result<(), StoreError> {
        let idx = self.check(id)?;
        self.touch(idx).position = position;
        Ok(())
    }

    /// Sets the layer content size in pixels.
    pub fn set_size(&mut self, id: LayerId, width: u32, height: u32) -> Result<(), StoreError> {
        let idx = self.check(id)?;
        let state = self.touch(idx);
        state.width = width;
        state.height = height;
        Ok(())
    }

    /// Sets the stacking depth. Higher z draws in front.
    pub fn set_z(&mut self, id: LayerId, z: u32) -> Result<(), StoreError> {
        let idx = self.check(id)?;
        self.touch(idx).z = z;
        self.order_dirty = true;
        Ok(())
    }

    /// Sets the whole-layer alpha in `0.0..=1.0`.
    pub fn set_alpha(&mut self, id: LayerId, alpha: f32) -> Result<(), StoreError> {
        let idx = self.check(id)?;
        self.touch(idx).alpha = alpha.clamp(0.0, 1.0);
        Ok(())
    }

    /// Replaces the layer flags.
    pub fn set_flags(&mut self, id: LayerId, flags: LayerFlags) -> Result<(), StoreError> {
        let idx = self.check(id)?;
        self.touch(idx).flags = flags;
        Ok(())
    }

    /// Sets the layer-local transform.
    pub fn set_transform(&mut self, id: LayerId, transform: Transform) -> Result<(), StoreError> {
        let idx = self.check(id)?;
        self.touch(idx).transform = transform;
        Ok(())
    }

    /// Declares which part of the content is fully transparent.
    pub fn set_transparent_hint(&mut self, id: LayerId, hint: Region) -> Result<(), StoreError> {
        let idx = self.check(id)?;
        self.touch(idx).transparent_hint = hint;
        Ok(())
    }

    // -- Frame API (compositor side) --

    /// Whether any transaction state is waiting to be committed.
    #[must_use]
    pub fn transaction_pending(&self) -> bool {
        self.transaction_pending
    }

    /// Atomically publishes all pending `current` state into `drawing`.
    ///
    /// Called once per frame before visibility. Also rebuilds the draw
    /// order if stacking changed and drains the damage banked by
    /// [`remove_layer`](Self::remove_layer).
    pub fn commit_transactions(&mut self) -> TransactionOutcome {
        let mut outcome = TransactionOutcome::default();
        if !self.transaction_pending {
            return outcome;
        }
        self.transaction_pending = false;
        // Creation, removal, and restacking all raise this; they change
        // geometry even when no per-layer state was touched.
        let structural = self.order_dirty;

        for idx in 0..self.len {
            let i = idx as usize;
            if self.tombstone[i] || self.current[i].sequence == self.drawing[i].sequence {
                continue;
            }
            self.drawing[i] = self.current[i].clone();
            // Any committed change invalidates the layer's footprint, old
            // and new; the sweep turns this into exact dirty rects.
            self.contents_dirty[i] = true;
            outcome.committed.push(idx);
        }

        if self.order_dirty {
            self.rebuild_draw_order();
        }
        outcome.removed_damage = mem::take(&mut self.removed_damage);
        outcome.geometry_changed = structural
            || !outcome.committed.is_empty()
            || !outcome.removed_damage.is_empty();
        outcome
    }

    /// Live slot indices, back to front (ascending drawing z, creation
    /// order on ties). Valid after the last
    /// [`commit_transactions`](Self::commit_transactions).
    #[must_use]
    pub fn draw_order(&self) -> &[u32] {
        debug_assert!(!self.order_dirty, "draw order read before commit");
        &self.draw_order
    }

    /// Marks a layer's content as changed for the next visibility sweep.
    pub(crate) fn note_content_changed(&mut self, idx: u32) {
        self.contents_dirty[idx as usize] = true;
    }

    /// Rebuilds a handle for a slot index known to be live.
    pub(crate) fn id_at(&self, idx: u32) -> LayerId {
        LayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    // -- Internals --

    /// Resolves a handle to a live slot index.
    fn check(&self, id: LayerId) -> Result<usize, StoreError> {
        let idx = id.idx as usize;
        if id.idx < self.len
            && self.generation[idx] == id.generation
            && !self.tombstone[idx]
        {
            Ok(idx)
        } else {
            Err(StoreError::StaleLayer(id))
        }
    }

    /// Resolves a handle to a slot that may be tombstoned but not yet
    /// recycled; `retain`/`release` must keep working after removal.
    fn check_allocated(&self, id: LayerId) -> Result<usize, StoreError> {
        let idx = id.idx as usize;
        if id.idx < self.len && self.generation[idx] == id.generation {
            Ok(idx)
        } else {
            Err(StoreError::StaleLayer(id))
        }
    }

    fn touch(&mut self, idx: usize) -> &mut LayerState {
        self.transaction_pending = true;
        let state = &mut self.current[idx];
        state.sequence = state.sequence.wrapping_add(1);
        state
    }

    /// Returns a tombstoned, unreferenced slot to the free list.
    fn recycle(&mut self, idx: u32) {
        let i = idx as usize;
        debug_assert!(self.tombstone[i] && self.external_refs[i] == 0);
        // Bump generation so old handles immediately fail validation, and
        // drop the slot pool so in-flight producer clones see the last of
        // it.
        self.generation[i] += 1;
        self.slots[i] = None;
        self.visible_screen[i].clear();
        self.covered_screen[i].clear();
        self.free_list.push(idx);
    }

    fn rebuild_draw_order(&mut self) {
        self.draw_order.clear();
        for idx in 0..self.len {
            if !self.tombstone[idx as usize] {
                self.draw_order.push(idx);
            }
        }
        let drawing = &self.drawing;
        let birth = &self.birth;
        self.draw_order
            .sort_by_key(|&idx| (drawing[idx as usize].z, birth[idx as usize]));
        self.order_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::Rect;

    use super::*;

    fn make(store: &mut LayerStore) -> LayerId {
        store
            .create_layer(32, 32, LayerFlags::default(), 2)
            .unwrap()
    }

    #[test]
    fn create_and_remove() {
        let mut store = LayerStore::new(8);
        let id = make(&mut store);
        assert!(store.is_alive(id));
        store.remove_layer(id).unwrap();
        assert!(!store.is_alive(id));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = LayerStore::new(8);
        let id1 = make(&mut store);
        store.remove_layer(id1).unwrap();
        assert!(store.release(id1).unwrap());
        let id2 = make(&mut store);
        // id2 reuses the same slot but has a different generation.
        assert_eq!(id1.index(), id2.index());
        assert_ne!(id1.generation(), id2.generation());
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
    }

    #[test]
    fn stale_handle_is_an_error_not_a_crash() {
        let mut store = LayerStore::new(8);
        let id = make(&mut store);
        store.remove_layer(id).unwrap();
        assert_eq!(
            store.set_position(id, Point::new(1, 1)),
            Err(StoreError::StaleLayer(id))
        );
        assert_eq!(store.current(id), Err(StoreError::StaleLayer(id)));
        assert_eq!(store.remove_layer(id), Err(StoreError::StaleLayer(id)));
    }

    #[test]
    fn references_hold_the_slot_after_removal() {
        let mut store = LayerStore::new(8);
        let id = make(&mut store);
        store.retain(id).unwrap();
        store.remove_layer(id).unwrap();
        // The compositor's reference still pins the slot.
        assert!(!store.release(id).unwrap());
        let other = make(&mut store);
        assert_ne!(other.index(), id.index(), "slot not yet reusable");
        assert!(store.release(id).unwrap());
        let reused = make(&mut store);
        assert_eq!(reused.index(), id.index());
    }

    #[test]
    fn transactions_latch_until_commit() {
        let mut store = LayerStore::new(8);
        let id = make(&mut store);
        store.commit_transactions();

        store.set_position(id, Point::new(10, 20)).unwrap();
        assert_eq!(store.drawing(id).unwrap().position, Point::ZERO);
        assert!(store.transaction_pending());

        let outcome = store.commit_transactions();
        assert_eq!(store.drawing(id).unwrap().position, Point::new(10, 20));
        assert_eq!(outcome.committed, [id.index()]);
        assert!(outcome.geometry_changed);
        assert!(!store.transaction_pending());
    }

    #[test]
    fn commit_without_changes_is_quiet() {
        let mut store = LayerStore::new(8);
        let id = make(&mut store);
        store.commit_transactions();
        let outcome = store.commit_transactions();
        assert_eq!(outcome, TransactionOutcome::default());
        assert!(store.is_alive(id));
    }

    #[test]
    fn draw_order_is_back_to_front_with_stable_ties() {
        let mut store = LayerStore::new(8);
        let a = make(&mut store);
        let b = make(&mut store);
        let c = make(&mut store);
        store.set_z(a, 1).unwrap();
        store.set_z(c, 1).unwrap();
        store.commit_transactions();
        // b stays at z 0; a and c tie at z 1 and keep creation order.
        assert_eq!(store.draw_order(), [b.index(), a.index(), c.index()]);
    }

    #[test]
    fn removed_layer_banks_its_visible_region_as_damage() {
        let mut store = LayerStore::new(8);
        let id = make(&mut store);
        store.commit_transactions();
        let vis = Region::from_rect(Rect::new(5, 5, 25, 25));
        store.visible_screen[id.index() as usize] = vis.clone();

        store.remove_layer(id).unwrap();
        let outcome = store.commit_transactions();
        assert_eq!(outcome.removed_damage, vis);
        assert!(outcome.geometry_changed);
        assert!(store.draw_order().is_empty());
    }

    #[test]
    fn capacity_is_enforced_but_slots_recycle() {
        let mut store = LayerStore::new(2);
        let a = make(&mut store);
        let _b = make(&mut store);
        assert_eq!(
            store.create_layer(1, 1, LayerFlags::default(), 2),
            Err(StoreError::TooManyLayers)
        );
        store.remove_layer(a).unwrap();
        store.release(a).unwrap();
        assert!(store.create_layer(1, 1, LayerFlags::default(), 2).is_ok());
    }

    #[test]
    fn alpha_is_clamped() {
        let mut store = LayerStore::new(8);
        let id = make(&mut store);
        store.set_alpha(id, 3.0).unwrap();
        assert_eq!(store.current(id).unwrap().alpha, 1.0);
        store.set_alpha(id, -1.0).unwrap();
        assert_eq!(store.current(id).unwrap().alpha, 0.0);
    }
}

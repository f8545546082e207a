// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer data model.
//!
//! A *layer* is one client surface in the composition stack. Each layer has:
//!
//! - An identity ([`LayerId`]) — a generational handle that becomes stale when
//!   the layer is removed, so wire-supplied handles can never reach freed
//!   state.
//! - **Double-buffered properties**: callers mutate the *current* state
//!   through [`LayerStore`] setters; composition reads the *drawing* state,
//!   refreshed atomically by
//!   [`commit_transactions`](LayerStore::commit_transactions).
//! - **Buffer slots** ([`BufferSlots`]) — the lock-free pool a producer
//!   thread cycles content buffers through, retired by the compositor once
//!   per frame.
//! - **Computed regions** written by the visibility sweep: the part of the
//!   layer actually on screen and the part covered by layers above it.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles.
//! Removal is two-step: [`remove_layer`](LayerStore::remove_layer)
//! tombstones the slot and banks its visible region as damage, and the slot
//! recycles only when the last external reference is
//! [`release`](LayerStore::release)d.

mod id;
mod slots;
mod state;
mod store;

pub use id::{BufferHandle, INVALID, LayerId};
pub use slots::{BufferSlots, MAX_DIRTY_RECTS, SlotError, SlotState};
pub use state::{LayerFlags, LayerState};
pub use store::{DEFAULT_MAX_LAYERS, LayerStore, StoreError, TransactionOutcome};

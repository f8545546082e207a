// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core region algebra, layer state machine, and composition pipeline.
//!
//! `strata_core` provides the data structures a damage-driven compositor is
//! built from: band-sorted pixel regions, 2D transforms with cached
//! classification, double-buffered layer state with lock-free buffer
//! hand-off, and the per-frame pipeline that turns posted buffers into
//! minimal screen updates. It is `no_std` compatible (with `alloc`) and
//! performs no I/O; threads, clocks, and wire protocols live in the crates
//! layered on top.
//!
//! # Architecture
//!
//! Each frame flows through five phases over the shared [`LayerStore`](layer::LayerStore):
//!
//! ```text
//!   producers ──► BufferSlots (queue)          transaction setters
//!                     │                              │
//!                     ▼                              ▼
//!   Compositor::frame():  page flip ◄── commit_transactions
//!                              │
//!                              ▼
//!                  compute_visible_regions ──► dirty Region
//!                              │
//!                              ▼
//!                  CompositionList ──► GraphicsDriver::prepare
//!                              │
//!               ┌── overlay ───┴── framebuffer ──┐
//!               ▼                                ▼
//!        driver.commit()            draw_layer() + swap_buffers()
//! ```
//!
//! **[`region`]** — Canonical band-sorted [`Region`](region::Region) with
//! union, intersection, and subtraction; the currency of all damage and
//! visibility bookkeeping.
//!
//! **[`transform`]** — 2D transform with a lazily cached classification
//! (translate/rotate/scale) and discrete orientation flags; regions stay
//! exact under rect-preserving transforms and degrade to bounds otherwise.
//!
//! **[`layer`]** — Struct-of-arrays layer store with generational handles,
//! double-buffered transaction state, and the lock-free
//! [`BufferSlots`](layer::BufferSlots) producer/compositor hand-off.
//!
//! **[`visibility`]** — The front-to-back sweep computing per-layer visible
//! and covered regions and the frame's dirty region.
//!
//! **[`composer`]** — The [`GraphicsDriver`](composer::GraphicsDriver)
//! seam: overlay assignment via a per-frame composition list, with a GPU
//! fallback path.
//!
//! **[`compositor`]** — [`Compositor`](compositor::Compositor) owning the
//! store and running the frame phases, including the freeze protocol and
//! capture policy.
//!
//! **[`output`]** — Display identity and mode.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types
//! for pipeline instrumentation, with zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one
//!   branch per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-layer
//!   visible-region and damage-rect events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod composer;
pub mod compositor;
pub mod geometry;
pub mod layer;
pub mod output;
pub mod region;
pub mod trace;
pub mod transform;
pub mod visibility;

// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Threaded compositor runtime for strata.
//!
//! `strata_service` puts the pieces together: it spawns the core
//! thread, owns the [`strata_core`] compositor and a
//! [`GraphicsDriver`](strata_core::composer::GraphicsDriver) on it,
//! and exposes the whole machine to client threads through a typed
//! command protocol over [`strata_channel`] rings.
//!
//! - [`runtime`] — the client surface: [`Runtime`](runtime::Runtime)
//!   to own the core thread, [`Transaction`](runtime::Transaction) for
//!   atomic batched mutations, [`LayerHandle`](runtime::LayerHandle)
//!   for buffer traffic.
//! - [`commands`] — wire ids and `Pod` argument layouts, with the
//!   decoder the core runs on every frame of the command ring.
//! - [`messages`] — the typed view of the core-to-client stream.
//! - [`error`] — posted [`ErrorCode`](error::ErrorCode)s and the
//!   construction-time [`ContextError`](error::ContextError).
//! - [`resources`] — element/type/allocation objects under a shared
//!   byte budget.
//! - [`a3d`] — the container format for persisting resource graphs.
//! - [`watchdog`] — lock-free liveness snapshot of the core thread.
//!
//! The split between control and data matters: layer mutations ride
//! the ring and apply atomically at commit, while pixel buffers move
//! through shared [`BufferSlots`](strata_core::layer::BufferSlots)
//! pools without ever crossing the ring.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Forwards
//!   [`strata_core`]'s pipeline events to the sink passed to
//!   [`Runtime::with_trace`](runtime::Runtime::with_trace).
//! - `trace-rich` (disabled by default, implies `trace`): Gates
//!   per-layer visible-region and damage-rect events.

pub mod a3d;
pub mod commands;
pub mod error;
pub mod messages;
pub mod resources;
pub mod runtime;
pub mod watchdog;

mod worker;

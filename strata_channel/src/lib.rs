// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-thread command transport for the strata runtime.
//!
//! Client threads talk to the core worker through a pair of
//! single-producer single-consumer rings, one per direction:
//!
//! - [`signal::Signal`] — latching auto-reset wakeup flag; all blocking
//!   in this crate is built on it.
//! - [`ring::CommandRing`] — lock-free word ring carrying framed
//!   commands, split into a writer and a reader half.
//! - [`io`] — the protocol layer: [`io::ClientIo`] for client threads,
//!   [`io::CoreIo`] for the worker, with call/reply token matching.
//!
//! The rings block instead of dropping: a full ring stalls the producer
//! until the consumer catches up, which is the backpressure that keeps
//! a slow worker from being buried.

pub mod io;
pub mod ring;
pub mod signal;

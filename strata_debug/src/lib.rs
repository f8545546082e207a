// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and Chrome trace export for strata
//! diagnostics.
//!
//! This crate provides [`TraceSink`](strata_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`] — human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`] — compact timestamped binary recording with
//!   [`recorder::decode`] for playback. Clones share the buffer, so a clone
//!   kept outside the runtime can read back what the core thread recorded.
//! - [`summary::SummarySink`] — wrapper that times frame phases and inserts
//!   a [`FrameSummary`](strata_core::trace::FrameSummary) per frame.
//! - [`tee::TeeSink`] — fans one event stream out to two sinks.
//! - [`chrome::export`] — writes Chrome Trace Event Format JSON from
//!   recorded bytes.
//!
//! The core pipeline events carry no timestamps; the sinks here read the
//! clock on arrival, which keeps the timing concern out of `strata_core`.

pub mod chrome;
pub mod pretty;
pub mod recorder;
pub mod summary;
pub mod tee;

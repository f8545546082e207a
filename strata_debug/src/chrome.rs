// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a
//! [`RecorderSink`](super::recorder::RecorderSink) and writes
//! [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable
/// for loading into `chrome://tracing` or
/// [Perfetto](https://ui.perfetto.dev/). Phase begin/end pairs become
/// `B`/`E` duration events; everything else becomes an instant.
///
/// Timestamps are the recorder's arrival stamps, in microseconds.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for record in decode(bytes) {
        let ts = record.nanos as f64 / 1000.0;
        match record.event {
            RecordedEvent::FrameBegin(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameBegin",
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.phase),
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.phase),
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::Transaction(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Transaction",
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "committed": e.committed,
                        "geometry_changed": e.geometry_changed,
                    }
                }));
            }
            RecordedEvent::PageFlip(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "PageFlip",
                    "cat": "Buffers",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "layer": e.layer,
                        "slot": e.slot,
                    }
                }));
            }
            RecordedEvent::Repaint(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Repaint",
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "damage": format!("{:?}", e.damage_bounds),
                        "items": e.items,
                    }
                }));
            }
            RecordedEvent::Present(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Present",
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "overlay_items": e.overlay_items,
                        "framebuffer_items": e.framebuffer_items,
                        "fallback": e.fallback,
                    }
                }));
            }
            RecordedEvent::DroppedCommand { command, reason } => {
                events.push(json!({
                    "ph": "i",
                    "name": "DroppedCommand",
                    "cat": "Commands",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "command": command,
                        "reason": reason,
                    }
                }));
            }
            RecordedEvent::DriverFallback { frame_index, reason } => {
                events.push(json!({
                    "ph": "i",
                    "name": "DriverFallback",
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": frame_index,
                        "reason": reason,
                    }
                }));
            }
            RecordedEvent::WatchdogStall(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "WatchdogStall",
                    "cat": "Commands",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "command": e.command,
                        "stall_us": e.nanos as f64 / 1000.0,
                    }
                }));
            }
            RecordedEvent::FreezeTimeout(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FreezeTimeout",
                    "cat": "Commands",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frozen_us": e.nanos as f64 / 1000.0,
                    }
                }));
            }
            RecordedEvent::Summary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSummary",
                    "cat": "Summary",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": s.frame_index,
                        "presented": s.presented,
                        "flips": s.flips,
                        "damage": format!("{:?}", s.damage_bounds),
                        "txn_us": s.transaction_nanos as f64 / 1000.0,
                        "flip_us": s.page_flip_nanos as f64 / 1000.0,
                        "visibility_us": s.visibility_nanos as f64 / 1000.0,
                        "repaint_us": s.repaint_nanos as f64 / 1000.0,
                        "present_us": s.present_nanos as f64 / 1000.0,
                    }
                }));
            }
            RecordedEvent::VisibleChange(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "VisibleChange",
                    "cat": "Rich",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": e.frame_index,
                        "layer": e.layer,
                        "bounds": format!("{:?}", e.visible_bounds),
                    }
                }));
            }
            RecordedEvent::DamageRectsCount { frame_index, count } => {
                events.push(json!({
                    "ph": "i",
                    "name": "DamageRects",
                    "cat": "Rich",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": frame_index,
                        "count": count,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use strata_core::trace::{
        PhaseBeginEvent, PhaseEndEvent, PhaseKind, PresentEvent, TraceSink,
    };

    use super::*;
    use crate::recorder::RecorderSink;

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 0,
            phase: PhaseKind::Repaint,
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 0,
            phase: PhaseKind::Repaint,
        });
        rec.on_present(&PresentEvent {
            frame_index: 0,
            overlay_items: 1,
            framebuffer_items: 2,
            fallback: false,
        });

        let mut out = Vec::new();
        export(&rec.bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        // Should parse as a JSON array.
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "Repaint");

        assert_eq!(parsed[1]["ph"], "E");
        assert_eq!(parsed[1]["name"], "Repaint");

        assert_eq!(parsed[2]["ph"], "i");
        assert_eq!(parsed[2]["name"], "Present");
        assert_eq!(parsed[2]["args"]["framebuffer_items"], 2);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}

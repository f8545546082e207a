// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end frame loop exercising the runtime and diagnostics pipeline.
//!
//! Starts the compositor over a counting driver, spawns a producer thread
//! that queues buffers with cycling dirty rects while the main thread
//! commits move and resize transactions, then exports a Chrome trace JSON
//! file from the recorded events.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use strata_core::composer::{
    Blending, CompositionItem, CompositionKind, CompositionList, DriverError, GraphicsDriver,
};
use strata_core::geometry::Rect;
use strata_core::layer::{BufferHandle, LayerFlags};
use strata_core::output::{DisplayId, DisplayInfo};
use strata_core::region::Region;
use strata_debug::pretty::PrettyPrintSink;
use strata_debug::recorder::RecorderSink;
use strata_debug::summary::SummarySink;
use strata_debug::tee::TeeSink;
use strata_service::runtime::{Runtime, RuntimeConfig, Transaction};

/// Buffers the producer thread posts before removing its layer.
const FRAME_COUNT: u64 = 60;
/// Transactions the main thread commits while the producer runs.
const DRAG_STEPS: i32 = 15;

/// Counts driver calls so the run can be summarized after shutdown.
#[derive(Debug, Default)]
struct DriverStats {
    commits: AtomicU64,
    draws: AtomicU64,
    swaps: AtomicU64,
}

/// Pretends to be a display with an overlay engine.
#[derive(Debug)]
struct DemoDriver {
    stats: Arc<DriverStats>,
}

impl GraphicsDriver for DemoDriver {
    fn init_graphics(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn shutdown_graphics(&mut self) {}

    fn set_surface(&mut self, _width: u32, _height: u32) {}

    fn prepare(&mut self, list: &mut CompositionList) -> Result<(), DriverError> {
        // Opaque buffer-backed layers go to the overlay engine; blended
        // ones stay on the GPU path.
        for item in &mut list.items {
            if item.buffer.is_some() && item.blending == Blending::None {
                item.kind = CompositionKind::Overlay;
            }
        }
        Ok(())
    }

    fn commit(&mut self, _list: &CompositionList) -> Result<(), DriverError> {
        self.stats.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn draw_layer(&mut self, _item: &CompositionItem, _damage: &Region) {
        self.stats.draws.fetch_add(1, Ordering::Relaxed);
    }

    fn swap_buffers(&mut self, _damage: &Region) -> Result<(), DriverError> {
        self.stats.swaps.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn main() {
    // -- sinks -------------------------------------------------------------
    let recorder = RecorderSink::new();
    let pretty = PrettyPrintSink::new(Box::new(std::io::stdout()));
    let sink = SummarySink::new(TeeSink::new(pretty, recorder.clone()));

    // -- runtime -----------------------------------------------------------
    let stats = Arc::new(DriverStats::default());
    let driver = DemoDriver {
        stats: Arc::clone(&stats),
    };
    let config = RuntimeConfig::with_display(DisplayInfo {
        id: DisplayId(0),
        width: 1280,
        height: 720,
        refresh_nanos: 16_666_667,
    });
    let rt = Runtime::with_trace(config, Box::new(driver), Box::new(sink))
        .expect("failed to start the compositor runtime");

    // An opaque video-style layer fed by the producer thread, and a
    // translucent badge the main thread drags across it.
    let video = rt
        .create_layer(
            640,
            360,
            LayerFlags {
                opaque: true,
                ..LayerFlags::default()
            },
        )
        .expect("failed to create the video layer");
    let badge = rt
        .create_layer(160, 90, LayerFlags::default())
        .expect("failed to create the badge layer");

    rt.commit(
        Transaction::new()
            .position(&video, 320, 180)
            .z(&video, 1)
            .position(&badge, 320, 180)
            .z(&badge, 2)
            .alpha(&badge, 0.8),
    );

    // -- producer ----------------------------------------------------------
    let producer = thread::spawn(move || {
        for frame in 0..FRAME_COUNT {
            let Ok(slot) = video.dequeue() else { return };
            // Alternate full-frame and bottom-third updates.
            let dirty = if frame % 4 == 0 {
                Rect::new(0, 0, 640, 360)
            } else {
                Rect::new(0, 240, 640, 360)
            };
            let queued = video.queue(slot, BufferHandle(frame + 1), &Region::from_rect(dirty));
            if queued.is_err() {
                return;
            }
        }
        video.remove();
    });

    // -- drag the badge ----------------------------------------------------
    for step in 0..DRAG_STEPS {
        let mut txn = Transaction::new().position(&badge, 320 + step * 16, 180 + step * 8);
        if step == 8 {
            txn = txn.size(&badge, 240, 135);
        }
        rt.commit_sync(txn);
    }

    producer.join().expect("producer thread panicked");
    drop(badge);
    drop(rt);

    // -- export Chrome trace -----------------------------------------------
    let path = "trace.json";
    let file = File::create(path).expect("failed to create trace.json");
    let mut writer = BufWriter::new(file);
    strata_debug::chrome::export(&recorder.bytes(), &mut writer)
        .expect("failed to write Chrome trace");

    println!(
        "Wrote {path} ({} overlay commits, {} gpu draws, {} swaps)",
        stats.commits.load(Ordering::Relaxed),
        stats.draws.load(Ordering::Relaxed),
        stats.swaps.load(Ordering::Relaxed),
    );
}

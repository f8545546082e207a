// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The core thread: command dispatch and the frame loop.
//!
//! [`run`] owns the compositor, the resource table, and the graphics
//! driver for the life of the runtime. It drains the command ring,
//! dispatching each command under a watchdog bracket, and runs a
//! compositor frame whenever one is pending and the ring is empty, so a
//! burst of commands is applied before the frame that shows it.
//!
//! Command failures are posted to the client ring and traced; they
//! never stop the loop. Only three things do: a `Quit` command, the
//! client shutting the ring down, and a fatal driver error.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use strata_channel::io::{CoreEvent, CoreIo};
use strata_core::composer::GraphicsDriver;
use strata_core::compositor::Compositor;
use strata_core::layer::{LayerId, StoreError};
use strata_core::trace::{
    DroppedCommandEvent, FreezeTimeoutEvent, TraceSink, Tracer, WatchdogStallEvent,
};

use crate::commands::{self, CoreCommand};
use crate::error::ErrorCode;
use crate::resources::{ResourceError, ResourceId, ResourceTable};
use crate::runtime::{RuntimeConfig, Shared};
use crate::watchdog::{Watchdog, duration_nanos};

/// Scheduling priority asked of the driver for the core thread.
const URGENT_DISPLAY_PRIORITY: i32 = -8;

/// Everything the core thread needs, moved into it at spawn.
pub(crate) struct WorkerSetup {
    pub core: CoreIo,
    pub driver: Box<dyn GraphicsDriver + Send>,
    pub config: RuntimeConfig,
    pub shared: Arc<Shared>,
    pub watchdog: Arc<Watchdog>,
    pub epoch: Instant,
    pub init_tx: mpsc::Sender<Result<(), &'static str>>,
    pub sink: Option<Box<dyn TraceSink + Send>>,
}

/// What a dispatched command means for the loop.
enum Flow {
    Continue,
    Quit,
    Fatal,
}

/// Core thread entry point.
pub(crate) fn run(setup: WorkerSetup) {
    let WorkerSetup {
        mut core,
        mut driver,
        config,
        shared,
        watchdog,
        epoch,
        init_tx,
        sink,
    } = setup;

    if let Err(e) = driver.init_graphics() {
        let _ = init_tx.send(Err(e.reason()));
        core.shutdown();
        return;
    }
    driver.set_surface(config.display.width, config.display.height);
    driver.set_priority(URGENT_DISPLAY_PRIORITY);
    if init_tx.send(Ok(())).is_err() {
        // Runtime construction was abandoned before we came up.
        driver.shutdown_graphics();
        core.shutdown();
        return;
    }

    let mut worker = Worker {
        compositor: Compositor::new(config.display, config.max_layers),
        resources: ResourceTable::new(config.allocation_budget),
        core,
        driver,
        config,
        shared,
        watchdog,
        epoch,
        frame_pending: false,
        frozen_since: None,
        sink,
    };
    worker.run_loop();
    worker.teardown();
}

struct Worker {
    compositor: Compositor,
    resources: ResourceTable,
    core: CoreIo,
    driver: Box<dyn GraphicsDriver + Send>,
    config: RuntimeConfig,
    shared: Arc<Shared>,
    watchdog: Arc<Watchdog>,
    epoch: Instant,
    /// A frame should run once the ring drains.
    frame_pending: bool,
    /// When the display was frozen; drives the forced thaw.
    frozen_since: Option<Instant>,
    sink: Option<Box<dyn TraceSink + Send>>,
}

impl Worker {
    fn run_loop(&mut self) {
        loop {
            let timeout = if self.frame_pending {
                Some(Duration::ZERO)
            } else {
                self.frozen_since
                    .map(|since| self.config.freeze_timeout.saturating_sub(since.elapsed()))
            };
            match self.core.receive(timeout) {
                CoreEvent::Command { cmd, args } => {
                    let flow = self.dispatch(cmd, &args);
                    // Consume only after dispatch; send_sync means
                    // "fully processed".
                    self.core.finish();
                    match flow {
                        Flow::Continue => {}
                        Flow::Quit | Flow::Fatal => return,
                    }
                }
                CoreEvent::Empty => {
                    if let Some(since) = self.frozen_since {
                        let frozen_for = since.elapsed();
                        if frozen_for >= self.config.freeze_timeout {
                            tracer_of(&mut self.sink).freeze_timeout(&FreezeTimeoutEvent {
                                nanos: duration_nanos(frozen_for),
                            });
                            self.compositor.set_frozen(false);
                            self.frozen_since = None;
                            self.frame_pending = true;
                        }
                    }
                    if self.frame_pending && !self.run_frame() {
                        return;
                    }
                }
                CoreEvent::ShutDown => return,
                CoreEvent::Malformed { reason } => {
                    tracer_of(&mut self.sink).dropped_command(&DroppedCommandEvent {
                        command: 0,
                        reason,
                    });
                }
            }
        }
    }

    /// Dispatches one command inside the watchdog bracket.
    fn dispatch(&mut self, cmd: u32, args: &[u8]) -> Flow {
        let started = self.epoch.elapsed();
        self.watchdog.begin(cmd, duration_nanos(started));
        let flow = self.dispatch_inner(cmd, args);
        self.watchdog.end();
        let elapsed = self.epoch.elapsed().saturating_sub(started);
        if elapsed >= self.config.stall_threshold {
            tracer_of(&mut self.sink).watchdog_stall(&WatchdogStallEvent {
                command: cmd,
                nanos: duration_nanos(elapsed),
            });
        }
        flow
    }

    fn dispatch_inner(&mut self, cmd: u32, args: &[u8]) -> Flow {
        let command = match commands::decode(cmd, args) {
            Ok(command) => command,
            Err(reason) => {
                self.core.post_error(ErrorCode::BadValue.to_raw());
                tracer_of(&mut self.sink).dropped_command(&DroppedCommandEvent {
                    command: cmd,
                    reason,
                });
                return Flow::Continue;
            }
        };
        match command {
            CoreCommand::CreateLayer {
                token,
                width,
                height,
                flags,
                slot_count,
            } => {
                match self
                    .compositor
                    .store_mut()
                    .create_layer(width, height, flags, slot_count)
                {
                    Ok(id) => {
                        // Publish the pool before the reply so the
                        // client can never hold a handle without one.
                        if let Ok(pool) = self.compositor.store().slot_pool(id) {
                            self.shared.pools.lock().unwrap().insert(id.index(), pool);
                        }
                        let raw = commands::RawLayerId::from(id);
                        self.core.reply(token, bytemuck::bytes_of(&raw));
                    }
                    Err(e) => {
                        self.core.post_error(store_error_code(&e).to_raw());
                        self.trace_drop(cmd, store_reason(&e));
                        self.core.reply(token, &[]);
                    }
                }
                Flow::Continue
            }
            CoreCommand::RetainLayer { layer } => {
                let result = self.compositor.store_mut().retain(layer);
                self.store_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::ReleaseLayer { layer } => {
                // The last client handle going away takes the layer
                // down; retained references only pin the slot.
                if self.compositor.store().is_alive(layer) {
                    self.remove_from_screen(cmd, layer);
                }
                let result = self.compositor.store_mut().release(layer).map(|_| ());
                self.store_result(cmd, result);
                self.shared.freed.set();
                Flow::Continue
            }
            CoreCommand::RemoveLayer { layer } => {
                let alive = self.compositor.store().is_alive(layer);
                if alive {
                    self.remove_from_screen(cmd, layer);
                } else {
                    self.store_result(cmd, Err(StoreError::StaleLayer(layer)));
                }
                self.shared.freed.set();
                Flow::Continue
            }
            CoreCommand::SetPosition { layer, position } => {
                let result = self.compositor.store_mut().set_position(layer, position);
                self.store_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::SetSize {
                layer,
                width,
                height,
            } => {
                let result = self.compositor.store_mut().set_size(layer, width, height);
                self.store_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::SetZ { layer, z } => {
                let result = self.compositor.store_mut().set_z(layer, z);
                self.store_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::SetAlpha { layer, alpha } => {
                let result = self.compositor.store_mut().set_alpha(layer, alpha);
                self.store_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::SetFlags { layer, flags } => {
                let result = self.compositor.store_mut().set_flags(layer, flags);
                self.store_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::SetTransform { layer, transform } => {
                let result = self.compositor.store_mut().set_transform(layer, transform);
                self.store_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::SetTransparentHint { layer, hint } => {
                let result = self.compositor.store_mut().set_transparent_hint(layer, hint);
                self.store_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::CommitTransaction { sync_token } => {
                self.compositor.request_commit();
                self.frame_pending = true;
                if !self.run_frame() {
                    // No reply: the caller's timeout or the ring
                    // shutdown fails the call.
                    return Flow::Fatal;
                }
                if sync_token != 0 {
                    self.core.reply(sync_token, &[]);
                }
                Flow::Continue
            }
            CoreCommand::FreezeDisplay => {
                self.compositor.set_frozen(true);
                self.frozen_since = Some(Instant::now());
                Flow::Continue
            }
            CoreCommand::UnfreezeDisplay => {
                self.compositor.set_frozen(false);
                self.frozen_since = None;
                self.frame_pending = true;
                Flow::Continue
            }
            CoreCommand::SignalFrame => {
                self.frame_pending = true;
                Flow::Continue
            }
            CoreCommand::CreateElement { token, element } => {
                let result = self.resources.create_element(element);
                self.reply_resource(cmd, token, result);
                Flow::Continue
            }
            CoreCommand::CreateType { token, desc } => {
                let result = self.resources.create_type(desc);
                self.reply_resource(cmd, token, result);
                Flow::Continue
            }
            CoreCommand::CreateAllocation { token, type_desc } => {
                let result = self.resources.create_allocation(type_desc);
                self.reply_resource(cmd, token, result);
                Flow::Continue
            }
            CoreCommand::AllocationData {
                allocation,
                offset,
                data,
            } => {
                let result = self.resources.allocation_data(allocation, offset, &data);
                self.resource_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::DestroyResource { resource } => {
                let result = self.resources.destroy(resource);
                self.resource_result(cmd, result);
                Flow::Continue
            }
            CoreCommand::Quit => Flow::Quit,
        }
    }

    /// Removes a live layer from composition and schedules the repaint
    /// of the hole it leaves.
    fn remove_from_screen(&mut self, cmd: u32, layer: LayerId) {
        let result = self.compositor.store_mut().remove_layer(layer);
        self.store_result(cmd, result);
        self.shared.pools.lock().unwrap().remove(&layer.index());
        self.compositor.request_commit();
        self.frame_pending = true;
    }

    /// Runs one compositor frame. Returns false on a fatal driver
    /// error, after which the loop must exit.
    fn run_frame(&mut self) -> bool {
        self.frame_pending = false;
        let mut tracer = tracer_of(&mut self.sink);
        match self.compositor.frame(self.driver.as_mut(), &mut tracer) {
            Ok(_) => {
                self.shared
                    .capture_allowed
                    .store(self.compositor.capture_allowed(), Ordering::Release);
                // Presented frames unlock displaced buffers; wake any
                // producer stuck in dequeue.
                self.shared.freed.set();
                self.watchdog.frame_tick();
                true
            }
            Err(_) => {
                self.core.post_error(ErrorCode::FatalDriver.to_raw());
                false
            }
        }
    }

    fn teardown(&mut self) {
        self.shared.pools.lock().unwrap().clear();
        self.shared.freed.set();
        self.driver.shutdown_graphics();
        self.core.shutdown();
    }

    fn store_result(&mut self, cmd: u32, result: Result<(), StoreError>) {
        if let Err(e) = result {
            self.core.post_error(store_error_code(&e).to_raw());
            self.trace_drop(cmd, store_reason(&e));
        }
    }

    fn resource_result(&mut self, cmd: u32, result: Result<(), ResourceError>) {
        if let Err(e) = result {
            self.core.post_error(resource_error_code(&e).to_raw());
            self.trace_drop(cmd, resource_reason(&e));
        }
    }

    fn reply_resource(&mut self, cmd: u32, token: u32, result: Result<ResourceId, ResourceError>) {
        match result {
            Ok(id) => {
                let raw = commands::RawResourceId::from(id);
                self.core.reply(token, bytemuck::bytes_of(&raw));
            }
            Err(e) => {
                self.core.post_error(resource_error_code(&e).to_raw());
                self.trace_drop(cmd, resource_reason(&e));
                self.core.reply(token, &[]);
            }
        }
    }

    fn trace_drop(&mut self, cmd: u32, reason: &'static str) {
        tracer_of(&mut self.sink).dropped_command(&DroppedCommandEvent {
            command: cmd,
            reason,
        });
    }
}

fn tracer_of(sink: &mut Option<Box<dyn TraceSink + Send>>) -> Tracer<'_> {
    match sink {
        Some(sink) => Tracer::new(sink.as_mut()),
        None => Tracer::none(),
    }
}

fn store_error_code(e: &StoreError) -> ErrorCode {
    match e {
        StoreError::StaleLayer(_) => ErrorCode::BadValue,
        StoreError::TooManyLayers => ErrorCode::OutOfMemory,
    }
}

fn store_reason(e: &StoreError) -> &'static str {
    match e {
        StoreError::StaleLayer(_) => "stale layer handle",
        StoreError::TooManyLayers => "layer cap reached",
    }
}

fn resource_error_code(e: &ResourceError) -> ErrorCode {
    match e {
        ResourceError::BudgetExceeded { .. } => ErrorCode::OutOfMemory,
        ResourceError::OutOfBounds => ErrorCode::BadSlot,
        _ => ErrorCode::BadValue,
    }
}

fn resource_reason(e: &ResourceError) -> &'static str {
    match e {
        ResourceError::StaleResource(_) => "stale resource handle",
        ResourceError::WrongClass(_) => "wrong resource class",
        ResourceError::InvalidVectorSize(_) => "bad vector size",
        ResourceError::InvalidDimensions => "bad type dimensions",
        ResourceError::OutOfBounds => "write out of bounds",
        ResourceError::BudgetExceeded { .. } => "allocation budget exceeded",
    }
}

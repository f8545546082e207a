// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The client half of the runtime.
//!
//! [`Runtime::new`] spawns the core thread, hands it the graphics
//! driver, and waits for the driver to come up, so construction fails
//! synchronously when the display cannot. The returned runtime is the
//! only client-facing object: it creates [`LayerHandle`]s, commits
//! [`Transaction`]s, and polls the message stream.
//!
//! Layer state changes never apply one by one. A [`Transaction`] is
//! built up client-side and sent as one burst ending in a commit
//! command, and the core applies the whole batch at a single frame
//! boundary. Buffer traffic bypasses the command ring entirely: a
//! handle dequeues and queues slots on the shared pool, and only pokes
//! the ring with a frame signal afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use strata_channel::io::{ClientIo, IoError, connect};
use strata_channel::signal::Signal;
use strata_core::composer::GraphicsDriver;
use strata_core::layer::{BufferHandle, BufferSlots, DEFAULT_MAX_LAYERS, LayerFlags, LayerId, SlotError};
use strata_core::output::DisplayInfo;
use strata_core::region::Region;
use strata_core::trace::TraceSink;
use strata_core::transform::Transform;

use crate::commands::{
    COMMIT_TRANSACTION, CREATE_LAYER, CreateLayerArgs, FREEZE_DISPLAY, QUIT, RELEASE_LAYER,
    REMOVE_LAYER, RawLayerId, SET_ALPHA, SET_FLAGS, SET_POSITION, SET_SIZE, SET_TRANSFORM,
    SET_TRANSPARENT_HINT, SET_Z, SIGNAL_FRAME, SetAlphaArgs, SetFlagsArgs, SetPositionArgs,
    SetSizeArgs, SetZArgs, UNFREEZE_DISPLAY, layer_flag_bits, transform_args,
    transparent_hint_args,
};
use crate::error::ContextError;
use crate::messages::ClientMessage;
use crate::watchdog::{Watchdog, WatchdogReport, duration_nanos};
use crate::worker::{self, WorkerSetup};

/// Everything fixed at runtime construction.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    /// The display mode to compose against.
    pub display: DisplayInfo,
    /// Layer slot cap of the store.
    pub max_layers: u32,
    /// Buffer slots per layer pool, 2 through 32.
    pub slot_count: usize,
    /// Capacity of the core-bound command ring, in 32-bit words.
    pub core_ring_words: usize,
    /// Capacity of the client-bound message ring, in 32-bit words.
    pub client_ring_words: usize,
    /// Byte budget shared by all allocations.
    pub allocation_budget: usize,
    /// How long synchronous calls wait for their reply.
    pub transaction_timeout: Duration,
    /// How long a freeze may last before the core thaws on its own.
    pub freeze_timeout: Duration,
    /// How long [`LayerHandle::dequeue`] waits for a free slot.
    pub dequeue_timeout: Duration,
    /// Dispatch time beyond which a command is traced as a stall.
    pub stall_threshold: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            display: DisplayInfo::default(),
            max_layers: DEFAULT_MAX_LAYERS,
            slot_count: 3,
            core_ring_words: 1 << 12,
            client_ring_words: 1 << 12,
            allocation_budget: 64 << 20,
            transaction_timeout: Duration::from_secs(5),
            freeze_timeout: Duration::from_secs(5),
            dequeue_timeout: Duration::from_secs(5),
            stall_threshold: Duration::from_secs(1),
        }
    }
}

impl RuntimeConfig {
    /// Default configuration for the given display mode.
    #[must_use]
    pub fn with_display(display: DisplayInfo) -> Self {
        Self {
            display,
            ..Self::default()
        }
    }
}

/// State shared between client threads and the core thread outside the
/// rings.
pub(crate) struct Shared {
    /// Live slot pools by layer slot index, maintained by the core.
    pub(crate) pools: Mutex<HashMap<u32, Arc<BufferSlots>>>,
    /// Raised whenever buffers or layers free up; wakes blocked
    /// dequeues.
    pub(crate) freed: Signal,
    /// Mirror of the compositor's capture verdict.
    pub(crate) capture_allowed: AtomicBool,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            freed: Signal::new(),
            capture_allowed: AtomicBool::new(true),
        }
    }
}

/// A batch of layer mutations applied atomically at one frame boundary.
///
/// Order within the batch is preserved; later mutations of the same
/// property win.
#[derive(Debug, Default)]
#[must_use = "a transaction does nothing until committed"]
pub struct Transaction {
    ops: Vec<(u32, Vec<u8>)>,
}

impl Transaction {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the batch holds no mutations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Moves the layer's top-left corner.
    pub fn position(mut self, layer: &LayerHandle, x: i32, y: i32) -> Self {
        let args = SetPositionArgs {
            layer: layer.id.into(),
            x,
            y,
        };
        self.push(SET_POSITION, bytemuck::bytes_of(&args));
        self
    }

    /// Resizes the layer's content rectangle.
    pub fn size(mut self, layer: &LayerHandle, width: u32, height: u32) -> Self {
        let args = SetSizeArgs {
            layer: layer.id.into(),
            width,
            height,
        };
        self.push(SET_SIZE, bytemuck::bytes_of(&args));
        self
    }

    /// Restacks the layer.
    pub fn z(mut self, layer: &LayerHandle, z: u32) -> Self {
        let args = SetZArgs {
            layer: layer.id.into(),
            z,
        };
        self.push(SET_Z, bytemuck::bytes_of(&args));
        self
    }

    /// Sets the layer-wide opacity.
    pub fn alpha(mut self, layer: &LayerHandle, alpha: f32) -> Self {
        let args = SetAlphaArgs {
            layer: layer.id.into(),
            alpha,
        };
        self.push(SET_ALPHA, bytemuck::bytes_of(&args));
        self
    }

    /// Replaces the layer's behavior flags.
    pub fn flags(mut self, layer: &LayerHandle, flags: LayerFlags) -> Self {
        let args = SetFlagsArgs {
            layer: layer.id.into(),
            flags: layer_flag_bits(flags),
        };
        self.push(SET_FLAGS, bytemuck::bytes_of(&args));
        self
    }

    /// Replaces the layer's content transform.
    pub fn transform(mut self, layer: &LayerHandle, transform: &Transform) -> Self {
        let args = transform_args(layer.id, transform);
        self.push(SET_TRANSFORM, bytemuck::bytes_of(&args));
        self
    }

    /// Promises that `hint` (in content coordinates) is fully
    /// transparent.
    pub fn transparent_hint(mut self, layer: &LayerHandle, hint: &Region) -> Self {
        let args = transparent_hint_args(layer.id, hint);
        self.ops.push((SET_TRANSPARENT_HINT, args));
        self
    }

    fn push(&mut self, cmd: u32, args: &[u8]) {
        self.ops.push((cmd, args.to_vec()));
    }
}

/// Why queueing or dequeueing a buffer failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// No slot freed up within the configured dequeue timeout.
    TimedOut,
    /// The layer was removed or the runtime shut down.
    Detached,
    /// The slot pool rejected the operation.
    Slot(SlotError),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timed out waiting for a free slot"),
            Self::Detached => write!(f, "layer is no longer composed"),
            Self::Slot(e) => write!(f, "slot pool rejected the operation: {e}"),
        }
    }
}

impl std::error::Error for QueueError {}

/// A client-side handle to one layer.
///
/// Buffer traffic goes straight to the shared slot pool; only the frame
/// signal crosses the command ring. Dropping the handle releases the
/// layer, which removes it from the screen.
pub struct LayerHandle {
    id: LayerId,
    slots: Arc<BufferSlots>,
    shared: Arc<Shared>,
    io: Arc<Mutex<ClientIo>>,
    dequeue_timeout: Duration,
}

impl fmt::Debug for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerHandle({:?})", self.id)
    }
}

impl LayerHandle {
    /// The layer's id, for building transactions against raw state.
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Claims a buffer slot for writing.
    ///
    /// Blocks until the compositor frees a slot, the layer is detached,
    /// or the dequeue timeout elapses.
    pub fn dequeue(&self) -> Result<usize, QueueError> {
        let deadline = Instant::now() + self.dequeue_timeout;
        loop {
            match self.slots.try_dequeue() {
                Ok(slot) => return Ok(slot),
                Err(SlotError::NoFreeSlot) => {}
                Err(e) => return Err(QueueError::Slot(e)),
            }
            if self.detached() {
                return Err(QueueError::Detached);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(QueueError::TimedOut);
            }
            self.shared.freed.wait(Some(deadline - now));
        }
    }

    /// Publishes a dequeued slot and signals a frame.
    ///
    /// `dirty` is the content region redrawn since the buffer was last
    /// on screen; pass the full bounds when unsure.
    pub fn queue(
        &self,
        slot: usize,
        handle: BufferHandle,
        dirty: &Region,
    ) -> Result<(), QueueError> {
        self.slots.queue(slot, handle, dirty).map_err(QueueError::Slot)?;
        self.io.lock().unwrap().send(SIGNAL_FRAME, &[]);
        Ok(())
    }

    /// Returns a dequeued slot without publishing it.
    pub fn cancel(&self, slot: usize) -> Result<(), QueueError> {
        self.slots.cancel(slot).map_err(QueueError::Slot)
    }

    /// Removes the layer from composition immediately.
    ///
    /// Dropping the handle has the same effect; this form exists for
    /// making the removal explicit at the call site.
    pub fn remove(self) {
        let raw = RawLayerId::from(self.id);
        if let Ok(mut io) = self.io.lock() {
            io.send(REMOVE_LAYER, bytemuck::bytes_of(&raw));
        }
        // Drop sends the release that frees the slot.
    }

    fn detached(&self) -> bool {
        match self.shared.pools.lock().unwrap().get(&self.id.index()) {
            Some(pool) => !Arc::ptr_eq(pool, &self.slots),
            None => true,
        }
    }
}

impl Drop for LayerHandle {
    fn drop(&mut self) {
        let raw = RawLayerId::from(self.id);
        // A poisoned lock means a client thread already panicked;
        // don't compound it from a destructor.
        if let Ok(mut io) = self.io.lock() {
            io.send(RELEASE_LAYER, bytemuck::bytes_of(&raw));
        }
    }
}

/// Owns the core thread and the channel to it.
///
/// `Sync`: any client thread may create layers, commit transactions,
/// and poll messages; the shared [`ClientIo`] is serialized internally.
pub struct Runtime {
    io: Arc<Mutex<ClientIo>>,
    worker: Option<thread::JoinHandle<()>>,
    shared: Arc<Shared>,
    watchdog: Arc<Watchdog>,
    epoch: Instant,
    slot_count: usize,
    transaction_timeout: Duration,
    dequeue_timeout: Duration,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("watchdog", &self.watchdog)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Spawns the core thread and brings the driver up.
    ///
    /// Fails synchronously when the driver cannot initialize or the
    /// core thread cannot start.
    pub fn new(
        config: RuntimeConfig,
        driver: Box<dyn GraphicsDriver + Send>,
    ) -> Result<Self, ContextError> {
        Self::start(config, driver, None)
    }

    /// [`new`](Self::new) with a trace sink observing the core thread.
    ///
    /// The sink only receives events when the `trace` feature is
    /// enabled; without it the runtime behaves like [`new`](Self::new).
    pub fn with_trace(
        config: RuntimeConfig,
        driver: Box<dyn GraphicsDriver + Send>,
        sink: Box<dyn TraceSink + Send>,
    ) -> Result<Self, ContextError> {
        Self::start(config, driver, Some(sink))
    }

    fn start(
        config: RuntimeConfig,
        driver: Box<dyn GraphicsDriver + Send>,
        sink: Option<Box<dyn TraceSink + Send>>,
    ) -> Result<Self, ContextError> {
        let (client, core) = connect(config.core_ring_words, config.client_ring_words);
        let shared = Arc::new(Shared::new());
        let watchdog = Arc::new(Watchdog::new());
        let epoch = Instant::now();
        let (init_tx, init_rx) = mpsc::channel();

        let setup = WorkerSetup {
            core,
            driver,
            config,
            shared: Arc::clone(&shared),
            watchdog: Arc::clone(&watchdog),
            epoch,
            init_tx,
            sink,
        };
        let handle = thread::Builder::new()
            .name("strata-core".into())
            .spawn(move || worker::run(setup))
            .map_err(ContextError::WorkerSpawn)?;

        match init_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = handle.join();
                return Err(ContextError::GraphicsInit(reason));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(ContextError::WorkerExited);
            }
        }

        Ok(Self {
            io: Arc::new(Mutex::new(client)),
            worker: Some(handle),
            shared,
            watchdog,
            epoch,
            slot_count: config.slot_count,
            transaction_timeout: config.transaction_timeout,
            dequeue_timeout: config.dequeue_timeout,
        })
    }

    /// Creates a layer and returns its handle.
    ///
    /// The layer surfaces at the origin on the next committed
    /// transaction; create, position, and commit to place it.
    pub fn create_layer(
        &self,
        width: u32,
        height: u32,
        flags: LayerFlags,
    ) -> Result<LayerHandle, ContextError> {
        let Ok(slot_count) = u32::try_from(self.slot_count) else {
            return Err(ContextError::CreateFailed);
        };
        let args = CreateLayerArgs {
            width,
            height,
            flags: layer_flag_bits(flags),
            slot_count,
        };
        let reply = self
            .io
            .lock()
            .unwrap()
            .call(
                CREATE_LAYER,
                bytemuck::bytes_of(&args),
                Some(self.transaction_timeout),
            )
            .map_err(io_error)?;
        if reply.len() != size_of::<RawLayerId>() {
            return Err(ContextError::CreateFailed);
        }
        let raw: RawLayerId = bytemuck::pod_read_unaligned(&reply);
        let id = LayerId::from(raw);
        let slots = self
            .shared
            .pools
            .lock()
            .unwrap()
            .get(&id.index())
            .cloned()
            .ok_or(ContextError::CreateFailed)?;
        Ok(LayerHandle {
            id,
            slots,
            shared: Arc::clone(&self.shared),
            io: Arc::clone(&self.io),
            dequeue_timeout: self.dequeue_timeout,
        })
    }

    /// Sends a transaction and requests its commit, without waiting.
    pub fn commit(&self, transaction: Transaction) {
        let mut io = self.io.lock().unwrap();
        for (cmd, args) in &transaction.ops {
            io.send(*cmd, args);
        }
        io.send(COMMIT_TRANSACTION, &[]);
    }

    /// Sends a transaction and blocks until the frame that applied it.
    ///
    /// Returns `false` when the core shut down or the commit timed out;
    /// the batch may still apply later in the timeout case.
    pub fn commit_sync(&self, transaction: Transaction) -> bool {
        let mut io = self.io.lock().unwrap();
        for (cmd, args) in &transaction.ops {
            io.send(*cmd, args);
        }
        io.call(COMMIT_TRANSACTION, &[], Some(self.transaction_timeout))
            .is_ok()
    }

    /// Suspends presentation; damage accumulates until thaw.
    ///
    /// A freeze with no matching [`unfreeze_display`](Self::unfreeze_display)
    /// thaws by itself after the configured freeze timeout.
    pub fn freeze_display(&self) {
        self.io.lock().unwrap().send(FREEZE_DISPLAY, &[]);
    }

    /// Resumes presentation and schedules a catch-up frame.
    pub fn unfreeze_display(&self) {
        self.io.lock().unwrap().send(UNFREEZE_DISPLAY, &[]);
    }

    /// Asks for a compositor frame once the command queue drains.
    pub fn signal_frame(&self) {
        self.io.lock().unwrap().send(SIGNAL_FRAME, &[]);
    }

    /// Returns the next message the core posted, if any.
    pub fn poll_message(&self, timeout: Option<Duration>) -> Option<ClientMessage> {
        let message = self.io.lock().unwrap().poll_message(timeout)?;
        ClientMessage::from_io(message)
    }

    /// Whether screen capture is currently permitted.
    ///
    /// False while a secure layer is visible, as of the last frame.
    #[must_use]
    pub fn capture_allowed(&self) -> bool {
        self.shared.capture_allowed.load(Ordering::Acquire)
    }

    /// Snapshot of the core thread's dispatch liveness.
    #[must_use]
    pub fn watchdog_report(&self) -> WatchdogReport {
        self.watchdog.report(duration_nanos(self.epoch.elapsed()))
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Ok(mut io) = self.io.lock() {
            io.send(QUIT, &[]);
            io.shutdown();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn io_error(e: IoError) -> ContextError {
    match e {
        IoError::TimedOut => ContextError::TimedOut,
        IoError::ShutDown => ContextError::ShutDown,
    }
}

#[cfg(test)]
mod tests {
    use strata_core::composer::{CompositionItem, DriverError, GraphicsDriver, NullDriver};
    use strata_core::geometry::Rect;

    use super::*;
    use crate::error::ErrorCode;

    const WAIT: Option<Duration> = Some(Duration::from_secs(5));

    #[derive(Default)]
    struct DriverLog {
        /// (buffer handle, display frame) per GPU draw.
        draws: Vec<(u64, Rect)>,
        /// Damage of each presented swap.
        swaps: Vec<Region>,
    }

    struct RecordingDriver {
        log: Arc<Mutex<DriverLog>>,
        init_error: Option<DriverError>,
        swap_error: Option<DriverError>,
    }

    impl RecordingDriver {
        fn new(log: &Arc<Mutex<DriverLog>>) -> Self {
            Self {
                log: Arc::clone(log),
                init_error: None,
                swap_error: None,
            }
        }
    }

    impl GraphicsDriver for RecordingDriver {
        fn init_graphics(&mut self) -> Result<(), DriverError> {
            match self.init_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn shutdown_graphics(&mut self) {}

        fn set_surface(&mut self, _width: u32, _height: u32) {}

        fn draw_layer(&mut self, item: &CompositionItem, _damage: &Region) {
            let handle = item.buffer.map_or(0, |b| b.0);
            self.log.lock().unwrap().draws.push((handle, item.display_frame));
        }

        fn swap_buffers(&mut self, damage: &Region) -> Result<(), DriverError> {
            if let Some(e) = self.swap_error {
                return Err(e);
            }
            self.log.lock().unwrap().swaps.push(damage.clone());
            Ok(())
        }
    }

    fn small_display() -> RuntimeConfig {
        RuntimeConfig::with_display(DisplayInfo {
            width: 320,
            height: 240,
            ..DisplayInfo::default()
        })
    }

    fn opaque() -> LayerFlags {
        LayerFlags {
            opaque: true,
            ..LayerFlags::default()
        }
    }

    fn full(width: i32, height: i32) -> Region {
        Region::from_rect(Rect::new(0, 0, width, height))
    }

    #[test]
    fn driver_init_failure_fails_construction() {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let driver = RecordingDriver {
            init_error: Some(DriverError::Fatal("egl init failed")),
            ..RecordingDriver::new(&log)
        };
        match Runtime::new(small_display(), Box::new(driver)) {
            Err(ContextError::GraphicsInit(reason)) => assert_eq!(reason, "egl init failed"),
            other => panic!("expected a graphics init error, got {other:?}"),
        }
    }

    #[test]
    fn posted_buffers_become_screen_damage() {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let rt = Runtime::new(small_display(), Box::new(RecordingDriver::new(&log))).unwrap();

        let layer = rt.create_layer(100, 100, opaque()).unwrap();
        assert!(rt.commit_sync(Transaction::new().position(&layer, 10, 10)));

        let slot = layer.dequeue().unwrap();
        layer
            .queue(slot, BufferHandle(7), &Region::from_rect(Rect::new(0, 0, 50, 50)))
            .unwrap();
        assert!(rt.commit_sync(Transaction::new()));

        let log = log.lock().unwrap();
        assert_eq!(
            log.swaps[0].as_slice(),
            &[Rect::new(10, 10, 110, 110)],
            "the first frame shows the whole new layer"
        );
        assert_eq!(
            log.swaps.last().unwrap().as_slice(),
            &[Rect::new(10, 10, 60, 60)],
            "the posted dirty half lands offset by the layer position"
        );
        assert_eq!(log.draws.last().unwrap().0, 7, "newest buffer is on screen");
    }

    #[test]
    fn batched_mutations_never_apply_halfway() {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let rt = Runtime::new(small_display(), Box::new(RecordingDriver::new(&log))).unwrap();
        let layer = rt.create_layer(64, 64, opaque()).unwrap();
        assert!(rt.commit_sync(Transaction::new()));

        // Hammer the core with frame signals so frames run between the
        // mutations of a batch; none of those frames may observe half
        // of one.
        let stop = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    rt.signal_frame();
                    thread::yield_now();
                }
            });
            for step in 0..30_i32 {
                let width = 64 + u32::try_from(step).unwrap();
                let moved = Transaction::new()
                    .position(&layer, step, step)
                    .size(&layer, width, 64);
                assert!(rt.commit_sync(moved));
            }
            stop.store(true, Ordering::Relaxed);
        });

        let log = log.lock().unwrap();
        assert!(!log.draws.is_empty());
        for &(_, frame) in &log.draws {
            assert_eq!(frame.left, frame.top, "position applied as a pair");
            assert_eq!(
                frame.right - frame.left,
                64 + frame.left,
                "size from the same batch as the position"
            );
        }
    }

    #[test]
    fn commands_for_a_removed_layer_post_an_error() {
        let rt = Runtime::new(small_display(), Box::new(NullDriver)).unwrap();
        let doomed = rt.create_layer(32, 32, opaque()).unwrap();

        let late = Transaction::new().position(&doomed, 5, 5);
        doomed.remove();
        rt.commit(late);

        match rt.poll_message(WAIT) {
            Some(ClientMessage::Error { code }) => assert_eq!(code, ErrorCode::BadValue),
            other => panic!("expected a stale-handle error, got {other:?}"),
        }
    }

    #[test]
    fn a_fatal_driver_error_tears_the_runtime_down() {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let driver = RecordingDriver {
            swap_error: Some(DriverError::Fatal("device lost")),
            ..RecordingDriver::new(&log)
        };
        let rt = Runtime::new(small_display(), Box::new(driver)).unwrap();
        let layer = rt.create_layer(64, 64, opaque()).unwrap();

        assert!(
            !rt.commit_sync(Transaction::new().position(&layer, 1, 1)),
            "the commit's frame hit the fatal error"
        );
        match rt.poll_message(WAIT) {
            Some(ClientMessage::Error { code }) => assert_eq!(code, ErrorCode::FatalDriver),
            other => panic!("expected the fatal driver error, got {other:?}"),
        }

        // The pool registry is cleared on teardown, so producers get a
        // detach instead of waiting out their timeout.
        for _ in 0..3 {
            let slot = layer.dequeue().unwrap();
            layer.queue(slot, BufferHandle(1), &full(64, 64)).unwrap();
        }
        assert_eq!(layer.dequeue(), Err(QueueError::Detached));
    }

    #[test]
    fn freezing_suppresses_presentation_and_thaw_catches_up() {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let rt = Runtime::new(small_display(), Box::new(RecordingDriver::new(&log))).unwrap();
        let layer = rt.create_layer(64, 64, opaque()).unwrap();
        assert!(rt.commit_sync(Transaction::new()));
        let swaps_before = log.lock().unwrap().swaps.len();

        rt.freeze_display();
        let slot = layer.dequeue().unwrap();
        layer.queue(slot, BufferHandle(2), &full(64, 64)).unwrap();
        assert!(rt.commit_sync(Transaction::new()));
        assert_eq!(
            log.lock().unwrap().swaps.len(),
            swaps_before,
            "nothing reaches the display while frozen"
        );

        rt.unfreeze_display();
        assert!(rt.commit_sync(Transaction::new()));
        let log = log.lock().unwrap();
        assert!(log.swaps.len() > swaps_before);
        assert_eq!(
            log.swaps.last().unwrap().as_slice(),
            &[Rect::new(0, 0, 64, 64)],
            "accumulated damage presents on thaw"
        );
    }

    #[test]
    fn buffers_hand_over_in_queue_order() {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let rt = Runtime::new(small_display(), Box::new(RecordingDriver::new(&log))).unwrap();
        let layer = rt.create_layer(64, 64, opaque()).unwrap();
        assert!(rt.commit_sync(Transaction::new()));

        // More buffers than slots: dequeue must block on the frame loop
        // recycling them, never hand out a busy slot, and the display
        // must see handles in order.
        for handle in 1..=50_u64 {
            let slot = layer.dequeue().unwrap();
            layer.queue(slot, BufferHandle(handle), &full(64, 64)).unwrap();
        }
        assert!(rt.commit_sync(Transaction::new()));

        let log = log.lock().unwrap();
        let handles: Vec<u64> = log.draws.iter().map(|&(handle, _)| handle).collect();
        assert!(
            handles.windows(2).all(|pair| pair[0] <= pair[1]),
            "buffers may be skipped but never reordered: {handles:?}"
        );
        assert_eq!(*handles.last().unwrap(), 50, "the newest buffer wins");
    }

    #[test]
    fn secure_layers_flip_the_capture_verdict() {
        let rt = Runtime::new(small_display(), Box::new(NullDriver)).unwrap();
        assert!(rt.capture_allowed());

        let secure = rt
            .create_layer(
                64,
                64,
                LayerFlags {
                    secure: true,
                    opaque: true,
                    ..LayerFlags::default()
                },
            )
            .unwrap();
        assert!(rt.commit_sync(Transaction::new()));
        assert!(!rt.capture_allowed());

        secure.remove();
        assert!(rt.commit_sync(Transaction::new()));
        assert!(rt.capture_allowed());
    }

    #[test]
    fn the_watchdog_sees_frames_and_idle_dispatch() {
        let rt = Runtime::new(small_display(), Box::new(NullDriver)).unwrap();
        let report = rt.watchdog_report();
        assert_eq!(report.frames, 0);

        assert!(rt.commit_sync(Transaction::new()));
        let report = rt.watchdog_report();
        assert_eq!(report.frames, 1);

        // The reply lands just before the dispatch bookkeeping closes,
        // so give the core a moment to go idle.
        let deadline = Instant::now() + Duration::from_secs(5);
        while rt.watchdog_report().in_dispatch {
            assert!(Instant::now() < deadline, "core never left dispatch");
            thread::yield_now();
        }
        assert_eq!(rt.watchdog_report().command, COMMIT_TRANSACTION);
    }

    #[test]
    fn dropping_the_runtime_stops_the_core_thread() {
        let rt = Runtime::new(small_display(), Box::new(NullDriver)).unwrap();
        let layer = rt.create_layer(16, 16, opaque()).unwrap();
        drop(rt);

        // Late traffic from a surviving handle is silently dropped; once
        // the slots run out the handle reports the detach instead of
        // blocking out its timeout.
        for _ in 0..3 {
            let slot = layer.dequeue().unwrap();
            layer.queue(slot, BufferHandle(1), &full(16, 16)).unwrap();
        }
        assert_eq!(layer.dequeue(), Err(QueueError::Detached));
        drop(layer);
    }
}

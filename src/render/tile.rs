//! Per-tile worker thread lifecycle (spec.md §4.9 "Tile worker lifecycle",
//! §5 "Concurrency & Resource Model").
//!
//! One [`TileWorker`] owns one dedicated background thread for its entire
//! life; [`TileWorker::dispatch`] hands it a tile to render and
//! [`TileWorker::abort`] tears it down. The dispatch handshake is a
//! manual-reset event built on `parking_lot`'s `Mutex`/`Condvar` — the same
//! lock type the teacher's `astraweave-context`/`astraweave-rag` crates use
//! throughout in place of `std::sync` for its faster, non-poisoning
//! semantics.

use super::buffer::{Int2, PixelAccumulator, RenderBuffer};
use crate::arena::Allocator;
use crate::error::{InvalidStateError, Result};
use crate::evaluate::PixelEvaluator;
use crate::math::Ray;
use crate::sampling::continuous::golden_ratio_spiral;
use crate::sampling::ContinuousDistribution;
use crate::scene::Scene;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// The out-of-scope camera collaborator (spec.md §1's Non-goals exclude the
/// surrounding application, but the tile worker still needs *a* way to turn
/// a pixel's sample-space offset into a world-space ray): `uv` is in
/// `[-0.5, 0.5]^2` with the y-axis already divided by aspect, matching
/// spec.md §4.9 step 2 exactly.
pub trait CameraRays: Send + Sync {
    fn ray(&self, uv: (f32, f32)) -> Ray;
}

/// Operation state transitions a tile worker serializes through (spec.md
/// §5): `Unassigned -> Running <-> Awaiting <-> Pausing <-> Paused`, or
/// `Running -> Aborting -> Unassigned`. `Awaiting`/`Pausing`/`Paused` are
/// reachable through [`CheckSchedule`]-style cooperative hooks the
/// evaluator calls between pixel samples (spec.md §5 "Suspension points");
/// this crate's evaluator never suspends mid-trace, so in practice a
/// dispatched tile moves `Running -> Unassigned` (done) or
/// `Running -> Aborting -> Unassigned` (canceled).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Unassigned,
    Running,
    Awaiting,
    Pausing,
    Paused,
    Aborting,
}

/// Stays signaled until explicitly [`reset`](ManualResetEvent::reset), the
/// handshake primitive spec.md §4.9's "Work loop: wait on dispatch event...
/// at end reset the dispatch event" describes.
struct ManualResetEvent {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl ManualResetEvent {
    fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn set(&self) {
        let mut guard = self.signaled.lock();
        *guard = true;
        self.condvar.notify_all();
    }

    fn reset(&self) {
        *self.signaled.lock() = false;
    }

    fn wait(&self) {
        let mut guard = self.signaled.lock();
        while !*guard {
            self.condvar.wait(&mut guard);
        }
    }
}

/// Cross-thread control block: everything [`TileWorker`]'s public methods
/// touch from the calling thread, separate from the state the work loop
/// owns exclusively (scene, evaluator, per-worker distribution/arena).
struct TileShared {
    state: Mutex<TileState>,
    dispatch_event: ManualResetEvent,
    abort: AtomicBool,
    offset: Mutex<Int2>,
    total_pixel: Mutex<usize>,
    completed_pixel: AtomicU64,
    completed_sample: AtomicU64,
}

/// Fixed-size table of sub-pixel offsets reused (mod its length) across a
/// tile's initial deterministic sample pass (spec.md §4.5 golden-ratio
/// spiral, §4.9 step 2 `spiralOffsets[i mod M]`).
const SPIRAL_TABLE_SIZE: usize = 256;

/// Owns one dedicated background thread bound to one tile at a time
/// (spec.md §4.9 "Tile worker lifecycle"). Construct with [`TileWorker::spawn`],
/// then drive it with [`reset`](TileWorker::reset)/[`dispatch`](TileWorker::dispatch)/
/// [`abort`](TileWorker::abort).
pub struct TileWorker {
    shared: Arc<TileShared>,
    thread: Option<JoinHandle<()>>,
}

impl TileWorker {
    /// Spawns the worker's background thread immediately (spec.md's
    /// "starts the background worker thread on first call" is simplified
    /// here to "on construction", which this crate's tests treat as
    /// equivalent since no tile is dispatched until the first
    /// [`TileWorker::reset`]/[`TileWorker::dispatch`] pair).
    ///
    /// `on_completed` fires once per finished tile with `(worker_id,
    /// offset)`; a [`Device`](super::device::Device) uses it to requeue the
    /// worker with the next pending tile.
    pub fn spawn(
        worker_id: usize,
        scene: Arc<Scene>,
        camera: Arc<dyn CameraRays>,
        evaluator: Arc<dyn PixelEvaluator>,
        buffer: Arc<Mutex<RenderBuffer>>,
        tile_size: i32,
        pixel_sample: u32,
        adaptive_sample: u32,
        jitter: bool,
        worker_seed: u64,
        on_completed: impl Fn(usize, Int2) + Send + Sync + 'static,
    ) -> Self {
        let shared = Arc::new(TileShared {
            state: Mutex::new(TileState::Unassigned),
            dispatch_event: ManualResetEvent::new(),
            abort: AtomicBool::new(false),
            offset: Mutex::new(Int2::default()),
            total_pixel: Mutex::new(0),
            completed_pixel: AtomicU64::new(0),
            completed_sample: AtomicU64::new(0),
        });

        let thread_shared = shared.clone();
        let spiral = golden_ratio_spiral(SPIRAL_TABLE_SIZE.min(pixel_sample.max(1) as usize * 4));
        let mut dist = ContinuousDistribution::new(pixel_sample as usize, adaptive_sample.max(1) as usize, jitter, worker_seed);
        let mut arena = Allocator::new();

        let thread = std::thread::Builder::new()
            .name(format!("echo-tile-worker-{worker_id}"))
            .spawn(move || loop {
                thread_shared.dispatch_event.wait();
                if thread_shared.abort.load(Ordering::Acquire) {
                    *thread_shared.state.lock() = TileState::Unassigned;
                    return;
                }

                let offset = *thread_shared.offset.lock();
                let buffer_size = {
                    let b = buffer.lock();
                    Int2::new(b.width(), b.height())
                };
                let aspect = buffer_size.x as f32 / buffer_size.y as f32;

                'tile: for ty in 0..tile_size {
                    for tx in 0..tile_size {
                        if thread_shared.abort.load(Ordering::Acquire) {
                            break 'tile;
                        }
                        let position = Int2::new(offset.x + tx, offset.y + ty);
                        if position.x >= buffer_size.x || position.y >= buffer_size.y {
                            continue;
                        }
                        let accumulator = work_pixel(
                            &scene,
                            camera.as_ref(),
                            evaluator.as_ref(),
                            &mut dist,
                            &mut arena,
                            position,
                            buffer_size,
                            aspect,
                            &spiral,
                            pixel_sample,
                            adaptive_sample,
                        );
                        thread_shared.completed_sample.fetch_add(accumulator.count(), Ordering::Relaxed);
                        {
                            let mut b = buffer.lock();
                            b.set_pixel(position, accumulator.mean(), accumulator.albedo_mean(), accumulator.normal_mean());
                        }
                        thread_shared.completed_pixel.fetch_add(1, Ordering::Relaxed);
                    }
                }

                thread_shared.dispatch_event.reset();
                *thread_shared.state.lock() = TileState::Unassigned;
                on_completed(worker_id, offset);
            })
            .expect("failed to spawn tile worker thread");

        Self { shared, thread: Some(thread) }
    }

    /// Sets the tile origin and clears per-tile counters. Disallowed while
    /// `Running` (spec.md §4.9 "Disallowed while Working").
    pub fn reset(&self, offset: Int2, buffer_size: Int2, tile_size: i32) -> Result<()> {
        {
            let state = self.shared.state.lock();
            if *state == TileState::Running {
                return Err(InvalidStateError::ResetWhileWorking.into());
            }
        }
        *self.shared.offset.lock() = offset;
        let clamped_w = (buffer_size.x - offset.x).clamp(0, tile_size) as usize;
        let clamped_h = (buffer_size.y - offset.y).clamp(0, tile_size) as usize;
        *self.shared.total_pixel.lock() = clamped_w * clamped_h;
        self.shared.completed_pixel.store(0, Ordering::Relaxed);
        self.shared.completed_sample.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Signals the dispatch event, waking the work loop to render the tile
    /// set by the last [`TileWorker::reset`]. Fails if already `Running`
    /// (spec.md §7 `InvalidState` "tile worker dispatched twice").
    pub fn dispatch(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if *state == TileState::Running {
                return Err(InvalidStateError::AlreadyWorking.into());
            }
            *state = TileState::Running;
        }
        self.shared.dispatch_event.set();
        Ok(())
    }

    /// Cancels the token, wakes the worker if it's waiting, and joins the
    /// thread (spec.md §5 "Cancellation").
    pub fn abort(&mut self) {
        self.shared.abort.store(true, Ordering::Release);
        self.shared.dispatch_event.set();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    pub fn state(&self) -> TileState {
        *self.shared.state.lock()
    }

    pub fn is_working(&self) -> bool {
        self.state() == TileState::Running
    }

    pub fn completed_pixel(&self) -> u64 {
        self.shared.completed_pixel.load(Ordering::Relaxed)
    }

    pub fn completed_sample(&self) -> u64 {
        self.shared.completed_sample.load(Ordering::Relaxed)
    }

    pub fn total_pixel(&self) -> usize {
        *self.shared.total_pixel.lock()
    }
}

impl Drop for TileWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.abort();
        }
    }
}

/// Evaluates one pixel's initial deterministic pass plus its adaptive extra
/// samples (spec.md §4.9 `WorkPixel`), returning the folded accumulator and
/// how many samples it accepted.
#[allow(clippy::too_many_arguments)]
fn work_pixel(
    scene: &Scene,
    camera: &dyn CameraRays,
    evaluator: &dyn PixelEvaluator,
    dist: &mut ContinuousDistribution,
    arena: &mut Allocator,
    position: Int2,
    buffer_size: Int2,
    aspect: f32,
    spiral: &[crate::math::Sample2D],
    pixel_sample: u32,
    adaptive_sample: u32,
) -> PixelAccumulator {
    let mut accumulator = PixelAccumulator::new();
    dist.begin_pixel((position.x, position.y));

    for i in 0..pixel_sample as usize {
        let offset = spiral[i % spiral.len()];
        let uv_x = (position.x as f32 + offset.x) / buffer_size.x as f32 - 0.5;
        let uv_y = ((position.y as f32 + offset.y) / buffer_size.y as f32 - 0.5) / aspect;

        dist.begin_sample(i);
        let ray = camera.ray((uv_x, uv_y));
        let sample = evaluator.evaluate(scene, ray, dist, arena);
        accumulator.accumulate(sample.radiance, sample.albedo, sample.normal);
    }

    let extra = (accumulator.deviation() * adaptive_sample as f32).round() as u32;
    for i in 0..extra {
        let offset = dist.next_2d();
        let uv_x = (position.x as f32 + offset.x) / buffer_size.x as f32 - 0.5;
        let uv_y = ((position.y as f32 + offset.y) / buffer_size.y as f32 - 0.5) / aspect;

        dist.begin_sample((pixel_sample as usize) + i as usize);
        let ray = camera.ray((uv_x, uv_y));
        let sample = evaluator.evaluate(scene, ray, dist, arena);
        accumulator.accumulate(sample.radiance, sample.albedo, sample.normal);
    }

    accumulator
}

//! The device: owns a pool of [`TileWorker`]s and hands them tiles from a
//! shared work queue until every tile in a render buffer is done (spec.md
//! §5 "A `Device` owns `N` worker threads").

use super::buffer::{Int2, RenderBuffer};
use super::tile::{CameraRays, TileWorker};
use super::RenderProfile;
use crate::error::{InvalidStateError, Result};
use crate::evaluate::PixelEvaluator;
use crate::scene::Scene;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Totals collected once every tile has completed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderStats {
    pub completed_pixel: u64,
    pub completed_sample: u64,
    pub tile_count: usize,
}

/// Row-major list of tile origins covering `buffer_size` in `tile_size`
/// steps (spec.md §4.9 "Reset(offset)... intersection of the
/// `[offset, offset+size)` square with the buffer" — the intersection
/// itself is computed per-tile by [`TileWorker::reset`]; this just
/// enumerates the origins).
fn tile_grid(buffer_size: Int2, tile_size: i32) -> Vec<Int2> {
    let mut tiles = Vec::new();
    let mut y = 0;
    while y < buffer_size.y {
        let mut x = 0;
        while x < buffer_size.x {
            tiles.push(Int2::new(x, y));
            x += tile_size;
        }
        y += tile_size;
    }
    tiles
}

fn worker_seed(worker_index: usize) -> u64 {
    (worker_index as u64)
        .wrapping_mul(0x9E3779B97F4A7C15)
        ^ 0xD1B5_4A32_D192_ED03
}

/// Owns `N` worker threads (spec.md §5), each a dedicated [`TileWorker`],
/// and drives them through every tile of a [`RenderBuffer`] via a shared
/// work queue. One [`Device::render`] call is a single, blocking,
/// synchronous render pass; concurrent calls on the same `Device` are
/// rejected (spec.md §7 `InvalidState` "device operation invoked in a
/// disallowed state").
pub struct Device {
    worker_count: usize,
    busy: AtomicBool,
}

impl Device {
    /// `worker_count` is typically `std::thread::available_parallelism()`
    /// (spec.md §5 "N ~= hardware concurrency").
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
            busy: AtomicBool::new(false),
        }
    }

    /// Renders every tile of `buffer` using `scene`/`camera`/`evaluator`
    /// under `profile`, blocking until complete. Validates `profile` before
    /// dispatching any tile (spec.md §7 "Policy": configuration failures
    /// are fatal and surfaced before any tile is dispatched).
    pub fn render(
        &self,
        scene: Arc<Scene>,
        camera: Arc<dyn CameraRays>,
        evaluator: Arc<dyn PixelEvaluator>,
        buffer: Arc<Mutex<RenderBuffer>>,
        profile: &RenderProfile,
    ) -> Result<RenderStats> {
        profile.validate()?;
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(InvalidStateError::DeviceNotIdle.into());
        }
        let result = self.render_inner(scene, camera, evaluator, buffer, profile);
        self.busy.store(false, Ordering::Release);
        result
    }

    fn render_inner(
        &self,
        scene: Arc<Scene>,
        camera: Arc<dyn CameraRays>,
        evaluator: Arc<dyn PixelEvaluator>,
        buffer: Arc<Mutex<RenderBuffer>>,
        profile: &RenderProfile,
    ) -> Result<RenderStats> {
        let buffer_size = buffer.lock().size();
        let tiles = tile_grid(buffer_size, profile.tile_size);
        let tile_count = tiles.len();

        tracing::debug!(
            worker_count = self.worker_count,
            tile_count,
            tile_size = profile.tile_size,
            pixel_sample = profile.pixel_sample,
            "dispatching render"
        );

        let queue = Arc::new(Mutex::new(tiles.into_iter().collect::<VecDeque<_>>()));
        let remaining = Arc::new((Mutex::new(tile_count), Condvar::new()));
        let workers_cell: Arc<OnceLock<Vec<TileWorker>>> = Arc::new(OnceLock::new());
        let tile_size = profile.tile_size;

        // Device-lifetime totals: each worker's own counters are reset by
        // `TileWorker::reset` at the start of every tile it's handed, so the
        // running total across every tile the device dispatches has to be
        // folded in here, once per finished tile, before that reset happens.
        let total_completed_pixel = Arc::new(AtomicU64::new(0));
        let total_completed_sample = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(self.worker_count);
        for id in 0..self.worker_count {
            let queue = queue.clone();
            let remaining = remaining.clone();
            let workers_cell = workers_cell.clone();
            let total_completed_pixel = total_completed_pixel.clone();
            let total_completed_sample = total_completed_sample.clone();

            let worker = TileWorker::spawn(
                id,
                scene.clone(),
                camera.clone(),
                evaluator.clone(),
                buffer.clone(),
                tile_size,
                profile.pixel_sample as u32,
                profile.adaptive_sample as u32,
                profile.jitter,
                worker_seed(id),
                move |worker_id, _offset| {
                    let next = queue.lock().pop_front();
                    {
                        let (lock, condvar) = &*remaining;
                        let mut left = lock.lock();
                        *left -= 1;
                        if *left == 0 {
                            condvar.notify_all();
                        }
                    }
                    if let Some(workers) = workers_cell.get() {
                        let worker = &workers[worker_id];
                        total_completed_pixel.fetch_add(worker.completed_pixel(), Ordering::Relaxed);
                        total_completed_sample.fetch_add(worker.completed_sample(), Ordering::Relaxed);
                        if let Some(next_offset) = next {
                            if worker.reset(next_offset, buffer_size, tile_size).is_ok() {
                                let _ = worker.dispatch();
                            }
                        }
                    }
                },
            );
            workers.push(worker);
        }
        workers_cell
            .set(workers)
            .unwrap_or_else(|_| panic!("workers_cell set exactly once per render call"));
        let workers = workers_cell.get().expect("workers were just set");

        // Prime up to `worker_count` tiles; any surplus stays queued and is
        // picked up by `on_completed` as workers free up.
        {
            let mut q = queue.lock();
            for worker in workers.iter() {
                match q.pop_front() {
                    Some(offset) => {
                        worker.reset(offset, buffer_size, tile_size)?;
                        worker.dispatch()?;
                    }
                    None => break,
                }
            }
        }

        let (lock, condvar) = &*remaining;
        let mut left = lock.lock();
        while *left > 0 {
            condvar.wait(&mut left);
        }

        let completed_pixel = total_completed_pixel.load(Ordering::Relaxed);
        let completed_sample = total_completed_sample.load(Ordering::Relaxed);
        tracing::debug!(completed_pixel, completed_sample, tile_count, "render complete");
        Ok(RenderStats {
            completed_pixel,
            completed_sample,
            tile_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AcceleratorProfile as AggregatorProfile;
    use crate::arena::Allocator;
    use crate::evaluate::{PixelEvaluator, PixelSample};
    use crate::instance::PreparedPack;
    use crate::material::swatch::PreparedSwatch;
    use crate::material::touch::Touch;
    use crate::material::Material;
    use crate::math::{Ray, RGB128};
    use crate::sampling::ContinuousDistribution;
    use crate::scene::Ambient;
    use glam::Vec3;

    struct Inert;
    impl Material for Inert {
        fn scatter<'a>(&self, _touch: &mut Touch<'a>, _arena: &'a Allocator) {}
    }

    struct FlatEvaluator;
    impl PixelEvaluator for FlatEvaluator {
        fn evaluate(&self, _scene: &Scene, _ray: Ray, _dist: &mut ContinuousDistribution, _arena: &mut Allocator) -> PixelSample {
            PixelSample { radiance: RGB128::splat(1.0), albedo: RGB128::BLACK, normal: Vec3::ZERO }
        }
    }

    struct OrthoCamera;
    impl CameraRays for OrthoCamera {
        fn ray(&self, uv: (f32, f32)) -> Ray {
            Ray::new(Vec3::new(uv.0, uv.1, -10.0), Vec3::Z)
        }
    }

    fn empty_scene() -> Arc<Scene> {
        let swatch = PreparedSwatch::new(vec![Arc::new(Inert)]);
        let pack = Arc::new(PreparedPack::build(vec![], vec![], vec![], swatch, &AggregatorProfile::default()));
        Arc::new(Scene::new(pack, Ambient::Constant(RGB128::BLACK)))
    }

    #[test]
    fn renders_every_pixel_of_a_multi_tile_buffer() {
        let buffer = Arc::new(Mutex::new(RenderBuffer::new(32, 17)));
        let device = Device::new(4);
        let profile = RenderProfile {
            tile_size: 8,
            pixel_sample: 2,
            adaptive_sample: 0,
            jitter: false,
            ..RenderProfile::default()
        };

        let stats = device
            .render(empty_scene(), Arc::new(OrthoCamera), Arc::new(FlatEvaluator), buffer.clone(), &profile)
            .expect("render should succeed");

        assert_eq!(stats.completed_pixel, 32 * 17);
        assert_eq!(stats.completed_sample, (32 * 17 * 2) as u64);

        let b = buffer.lock();
        for y in 0..17 {
            for x in 0..32 {
                assert_eq!(b.color(Int2::new(x, y)), RGB128::splat(1.0));
            }
        }
    }

    #[test]
    fn rejects_invalid_profile_before_dispatching_any_tile() {
        let device = Device::new(2);
        let buffer = Arc::new(Mutex::new(RenderBuffer::new(8, 8)));
        let profile = RenderProfile { tile_size: 0, ..RenderProfile::default() };
        let err = device
            .render(empty_scene(), Arc::new(OrthoCamera), Arc::new(FlatEvaluator), buffer, &profile)
            .unwrap_err();
        assert!(err.to_string().contains("tile size"));
    }
}

//! Debug evaluator: visualizes aggregator traversal cost instead of
//! radiance (spec.md §4.7 "AcceleratorQualityWorker").
//!
//! Reports three numbers per sample: this pixel's own cost, and the running
//! `(sum, count)` shared across every worker thread so a caller can compute
//! a live average — the same atomic-counter pattern spec.md's tile worker
//! uses for its own `completedSample`/`completedPixel` totals.

use super::{PixelEvaluator, PixelSample};
use crate::arena::Allocator;
use crate::math::{Ray, RGB128};
use crate::sampling::ContinuousDistribution;
use crate::scene::Scene;
use std::sync::atomic::{AtomicU64, Ordering};

/// One pixel's cost reading plus the accumulator state after it was folded
/// in, returned alongside the false-color [`PixelSample`].
#[derive(Debug, Clone, Copy)]
pub struct QualityReading {
    pub cost_this_pixel: u32,
    pub sum_so_far: u64,
    pub sample_count_so_far: u64,
}

/// False-color aggregator traversal cost. The `intensity_scale` maps a raw
/// leaf/node visit count to `[0, 1]`-ish radiance for display; it has no
/// bearing on the shared atomic totals, which always report the raw cost.
pub struct AcceleratorQualityWorker {
    intensity_scale: f32,
    total_cost: AtomicU64,
    total_samples: AtomicU64,
}

impl AcceleratorQualityWorker {
    pub fn new(intensity_scale: f32) -> Self {
        Self {
            intensity_scale,
            total_cost: AtomicU64::new(0),
            total_samples: AtomicU64::new(0),
        }
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost.load(Ordering::Relaxed)
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::Relaxed)
    }

    pub fn mean_cost(&self) -> f64 {
        let samples = self.total_samples();
        if samples == 0 {
            0.0
        } else {
            self.total_cost() as f64 / samples as f64
        }
    }

    /// Traces once for its cost only (no interaction, no scattering) and
    /// folds the result into the shared atomic totals.
    pub fn sample_with_stats(&self, scene: &Scene, ray: Ray) -> (PixelSample, QualityReading) {
        let cost = scene.trace_cost(&ray, f32::INFINITY);
        let sum_so_far = self.total_cost.fetch_add(cost as u64, Ordering::Relaxed) + cost as u64;
        let sample_count_so_far = self.total_samples.fetch_add(1, Ordering::Relaxed) + 1;

        let intensity = (cost as f32 * self.intensity_scale).clamp(0.0, 1.0);
        let sample = PixelSample {
            radiance: RGB128::splat(intensity),
            albedo: RGB128::BLACK,
            normal: glam::Vec3::ZERO,
        };
        let reading = QualityReading {
            cost_this_pixel: cost,
            sum_so_far,
            sample_count_so_far,
        };
        (sample, reading)
    }
}

impl Default for AcceleratorQualityWorker {
    fn default() -> Self {
        Self::new(1.0 / 64.0)
    }
}

impl PixelEvaluator for AcceleratorQualityWorker {
    fn evaluate(&self, scene: &Scene, ray: Ray, _dist: &mut ContinuousDistribution, _arena: &mut Allocator) -> PixelSample {
        self.sample_with_stats(scene, ray).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AcceleratorProfile;
    use crate::geometry::PreparedSphere;
    use crate::instance::PreparedPack;
    use crate::material::swatch::PreparedSwatch;
    use crate::material::touch::Touch;
    use crate::material::{Material, MaterialIndex};
    use crate::scene::Ambient;
    use glam::Vec3;
    use std::sync::Arc;

    struct Inert;
    impl Material for Inert {
        fn scatter<'a>(&self, _touch: &mut Touch<'a>, _arena: &'a Allocator) {}
    }

    #[test]
    fn running_totals_accumulate_across_calls() {
        let swatch = PreparedSwatch::new(vec![Arc::new(Inert)]);
        let pack = Arc::new(PreparedPack::build(
            vec![],
            vec![PreparedSphere::new(Vec3::ZERO, 1.0, MaterialIndex::new(0))],
            vec![],
            swatch,
            &AcceleratorProfile::default(),
        ));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::BLACK));
        let worker = AcceleratorQualityWorker::default();

        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        let (_, first) = worker.sample_with_stats(&scene, ray);
        let (_, second) = worker.sample_with_stats(&scene, ray);

        assert_eq!(first.sample_count_so_far, 1);
        assert_eq!(second.sample_count_so_far, 2);
        assert_eq!(second.sum_so_far, first.sum_so_far + second.cost_this_pixel as u64);
        assert_eq!(worker.total_samples(), 2);
    }

    #[test]
    fn intensity_is_clamped_to_unit_range() {
        let swatch = PreparedSwatch::new(vec![Arc::new(Inert)]);
        let pack = Arc::new(PreparedPack::build(vec![], vec![], vec![], swatch, &AcceleratorProfile::default()));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::BLACK));
        let worker = AcceleratorQualityWorker::new(1000.0);

        let (sample, _) = worker.sample_with_stats(&scene, Ray::new(Vec3::ZERO, Vec3::Z));
        assert!(sample.radiance.r <= 1.0);
        assert!(sample.radiance.r >= 0.0);
    }
}

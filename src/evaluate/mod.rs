//! The brute-force path tracer and its debug variants (spec.md §4.7).
//!
//! All three pixel workers share one contract — [`PixelEvaluator`] — so the
//! tile worker (`src/render/tile.rs`) can run whichever one a render profile
//! selects without knowing which it got, the same "single capability"
//! pattern spec.md §9 asks for in the aggregator and material layers.

pub mod albedo;
pub mod quality;

pub use albedo::AlbedoPixelWorker;
pub use quality::AcceleratorQualityWorker;

use crate::arena::Allocator;
use crate::material::onb::Frame;
use crate::material::touch::Touch;
use crate::math::{Ray, RGB128};
use crate::sampling::ContinuousDistribution;
use crate::scene::Scene;
use crate::token::TokenHierarchy;
use glam::Vec3;

/// One evaluated camera ray: the radiance estimate plus the first hit's
/// albedo/normal, consumed by the pixel accumulator's auxiliary layers
/// (spec.md §4.9 "Auxiliary: separate running sums for albedo and normal").
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelSample {
    pub radiance: RGB128,
    pub albedo: RGB128,
    pub normal: Vec3,
}

/// Single capability every pixel worker exposes: consume one camera ray, one
/// sample-stream draw, and the per-sample arena, produce one estimate.
pub trait PixelEvaluator: Send + Sync {
    fn evaluate(&self, scene: &Scene, ray: Ray, dist: &mut ContinuousDistribution, arena: &mut Allocator) -> PixelSample;
}

/// The default, full brute-force path tracer (spec.md §4.7's pseudocode).
/// `bounce_limit` is the hard depth cap (spec.md §6 "BounceLimit").
pub struct PathTracer {
    pub bounce_limit: u32,
}

impl PathTracer {
    pub fn new(bounce_limit: u32) -> Self {
        Self { bounce_limit }
    }
}

impl PixelEvaluator for PathTracer {
    fn evaluate(&self, scene: &Scene, ray: Ray, dist: &mut ContinuousDistribution, arena: &mut Allocator) -> PixelSample {
        evaluate_path(scene, ray, dist, arena, self.bounce_limit)
    }
}

/// What the next bounce does to the running ray/throughput, decided while
/// the current hit's `Touch` (and its arena-backed `bsdf`) is still in
/// scope — the match below picks one before the borrow ends, so the arena
/// can be restarted again on the next iteration (spec.md §5 "Arena
/// contract": lifetime is one sample, never longer).
enum Bounce {
    /// The hit surface had no scattering function: pass straight through,
    /// throughput unchanged (spec.md §4.7 "`touch.bsdf` is null").
    PassThrough { point: Vec3, direction: Vec3, emitted: RGB128 },
    /// A scattering direction was sampled with nonzero measure.
    Scatter {
        point: Vec3,
        direction: Vec3,
        emitted: RGB128,
        throughput_scale: RGB128,
    },
    /// The sample was degenerate (`pdf == 0` or `f` black): stop here.
    Terminate { emitted: RGB128 },
}

/// Depth-limited, explicitly-looped (no tail-call assumption, per spec.md
/// §4.7) brute-force path trace of a single camera ray.
pub fn evaluate_path(scene: &Scene, primary_ray: Ray, dist: &mut ContinuousDistribution, arena: &mut Allocator, bounce_limit: u32) -> PixelSample {
    let mut radiance = RGB128::BLACK;
    let mut throughput = RGB128::WHITE;
    let mut ray = primary_ray;
    let mut ignore = TokenHierarchy::new();
    let mut first_hit: Option<(RGB128, Vec3)> = None;
    let mut depth = bounce_limit;

    while depth > 0 {
        depth -= 1;
        arena.restart();
        let query = scene.trace(ray, f32::INFINITY, ignore);
        if !query.has_hit() {
            radiance += throughput * scene.ambient(ray.direction);
            break;
        }

        let bounce = {
            let (mut touch, swatch) = scene.interact(&ray, &query);
            let material = swatch.get(touch.material);
            material.scatter(&mut touch, &*arena);

            if first_hit.is_none() {
                first_hit = Some((estimate_albedo(&touch), touch.normal));
            }

            let emitted = material.as_emissive().map_or(RGB128::BLACK, |e| e.emit(touch.point, touch.outgoing));

            if touch.bsdf.is_empty() {
                Bounce::PassThrough {
                    point: touch.point,
                    direction: ray.direction,
                    emitted,
                }
            } else {
                let frame = Frame::from_normal(touch.normal);
                let outgoing_local = frame.to_local(touch.outgoing);
                match touch.bsdf.sample(outgoing_local, dist.next_2d()) {
                    Some(sample) if sample.pdf > 0.0 && !sample.f.is_black() => {
                        let incident_world = frame.to_world(sample.incident);
                        let cos_term = incident_world.dot(touch.normal).abs();
                        Bounce::Scatter {
                            point: touch.point,
                            direction: incident_world,
                            emitted,
                            throughput_scale: sample.f * (cos_term / sample.pdf),
                        }
                    }
                    _ => Bounce::Terminate { emitted },
                }
            }
        };

        ignore = query.token;
        match bounce {
            Bounce::Terminate { emitted } => {
                radiance += throughput * emitted;
                break;
            }
            Bounce::PassThrough { point, direction, emitted } => {
                radiance += throughput * emitted;
                ray = Ray::new(point, direction);
            }
            Bounce::Scatter { point, direction, emitted, throughput_scale } => {
                radiance += throughput * emitted;
                throughput = throughput * throughput_scale;
                ray = Ray::new(point, direction);
            }
        }
    }

    let (albedo, normal) = first_hit.unwrap_or_default();
    PixelSample { radiance, albedo, normal }
}

/// Cheap albedo estimate for the auxiliary AOV: a Lambertian's `f(wo, wo) *
/// pi` recovers its albedo exactly, and delta BxDFs contribute zero (their
/// `evaluate` returns black off their analytic direction), so this under-
/// reports specular surfaces' albedo rather than guessing at one.
pub(crate) fn estimate_albedo(touch: &Touch) -> RGB128 {
    if touch.bsdf.is_empty() {
        return RGB128::BLACK;
    }
    let frame = Frame::from_normal(touch.normal);
    let outgoing_local = frame.to_local(touch.outgoing);
    touch.bsdf.evaluate(outgoing_local, outgoing_local) * std::f32::consts::PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AcceleratorProfile;
    use crate::arena::Allocator;
    use crate::geometry::PreparedSphere;
    use crate::instance::PreparedPack;
    use crate::material::lambertian::Lambertian;
    use crate::material::swatch::PreparedSwatch;
    use crate::material::{bsdf_set::BsdfSetBuilder, Material, MaterialIndex};
    use crate::scene::Ambient;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    struct LambertianMaterial(RGB128);
    impl Material for LambertianMaterial {
        fn scatter<'a>(&self, touch: &mut Touch<'a>, arena: &'a Allocator) {
            let mut builder = BsdfSetBuilder::new(arena);
            builder.push(Lambertian::new(self.0));
            touch.bsdf = builder.finish();
        }
    }

    #[test]
    fn scenario_1_sphere_under_constant_ambient_matches_spec_value() {
        // spec.md §8 scenario 1: unit sphere, albedo (0.8,0.8,0.8), constant
        // ambient (1,1,1), depth=2 -> ~0.8 per channel (f=albedo/pi times the
        // cosine-sampled incident ray recovering pi/albedo's normalization).
        let swatch = PreparedSwatch::new(vec![Arc::new(LambertianMaterial(RGB128::splat(0.8)))]);
        let pack = Arc::new(PreparedPack::build(
            vec![],
            vec![PreparedSphere::new(Vec3::ZERO, 1.0, MaterialIndex::new(0))],
            vec![],
            swatch,
            &AcceleratorProfile::default(),
        ));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::WHITE));

        let mut arena = Allocator::new();
        let mut dist = ContinuousDistribution::new(1, 1, false, 0);
        dist.begin_pixel((0, 0));

        let mut total = RGB128::BLACK;
        let n = 512;
        for i in 0..n {
            dist.begin_sample(0);
            let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
            let sample = evaluate_path(&scene, ray, &mut dist, &mut arena, 2);
            total += sample.radiance;
            let _ = i;
        }
        let mean = total * (1.0 / n as f32);
        assert_relative_eq!(mean.r, 0.8, epsilon = 0.15);
    }

    #[test]
    fn miss_returns_ambient_with_no_bounces_spent() {
        let swatch = PreparedSwatch::new(vec![Arc::new(LambertianMaterial(RGB128::splat(0.5)))]);
        let pack = Arc::new(PreparedPack::build(vec![], vec![], vec![], swatch, &AcceleratorProfile::default()));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::splat(0.3)));

        let mut arena = Allocator::new();
        let mut dist = ContinuousDistribution::new(1, 1, false, 0);
        dist.begin_pixel((0, 0));
        dist.begin_sample(0);

        let sample = evaluate_path(&scene, Ray::new(Vec3::ZERO, Vec3::Z), &mut dist, &mut arena, 8);
        assert_eq!(sample.radiance, RGB128::splat(0.3));
    }

    #[test]
    fn zero_bounce_limit_returns_black_immediately() {
        let swatch = PreparedSwatch::new(vec![Arc::new(LambertianMaterial(RGB128::splat(0.5)))]);
        let pack = Arc::new(PreparedPack::build(vec![], vec![], vec![], swatch, &AcceleratorProfile::default()));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::WHITE));

        let mut arena = Allocator::new();
        let mut dist = ContinuousDistribution::new(1, 1, false, 0);
        dist.begin_pixel((0, 0));
        dist.begin_sample(0);

        let sample = evaluate_path(&scene, Ray::new(Vec3::ZERO, Vec3::Z), &mut dist, &mut arena, 0);
        assert_eq!(sample.radiance, RGB128::BLACK);
    }
}

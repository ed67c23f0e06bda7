//! Debug evaluator: first-hit albedo only, no bounces (spec.md §4.7
//! "AlbedoPixelWorker").

use super::{estimate_albedo, PixelEvaluator, PixelSample};
use crate::arena::Allocator;
use crate::math::Ray;
use crate::sampling::ContinuousDistribution;
use crate::scene::Scene;
use crate::token::TokenHierarchy;

/// Visualizes a single first-hit albedo estimate per pixel, skipping the
/// recursive bounce loop entirely. Useful for sanity-checking materials and
/// UVs without paying for full path tracing.
pub struct AlbedoPixelWorker;

impl PixelEvaluator for AlbedoPixelWorker {
    fn evaluate(&self, scene: &Scene, ray: Ray, _dist: &mut ContinuousDistribution, arena: &mut Allocator) -> PixelSample {
        arena.restart();
        let query = scene.trace(ray, f32::INFINITY, TokenHierarchy::new());
        if !query.has_hit() {
            return PixelSample {
                radiance: scene.ambient(ray.direction),
                albedo: crate::math::RGB128::BLACK,
                normal: glam::Vec3::ZERO,
            };
        }

        let (mut touch, swatch) = scene.interact(&ray, &query);
        let material = swatch.get(touch.material);
        material.scatter(&mut touch, &*arena);

        let albedo = estimate_albedo(&touch);
        PixelSample {
            radiance: albedo,
            albedo,
            normal: touch.normal,
        }
    }
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
    use crate::material::touch::Touch;
    use crate::material::{bsdf_set::BsdfSetBuilder, Material, MaterialIndex};
    use crate::math::RGB128;
    use crate::scene::Ambient;
    use approx::assert_relative_eq;
    use glam::Vec3;
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
    fn hit_reports_the_surface_albedo_directly_as_radiance() {
        let swatch = PreparedSwatch::new(vec![Arc::new(LambertianMaterial(RGB128::splat(0.6)))]);
        let pack = Arc::new(PreparedPack::build(
            vec![],
            vec![PreparedSphere::new(Vec3::ZERO, 1.0, MaterialIndex::new(0))],
            vec![],
            swatch,
            &AcceleratorProfile::default(),
        ));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::WHITE));

        let worker = AlbedoPixelWorker;
        let mut arena = Allocator::new();
        let mut dist = ContinuousDistribution::new(1, 1, false, 0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        let sample = worker.evaluate(&scene, ray, &mut dist, &mut arena);

        assert_relative_eq!(sample.radiance.r, 0.6, epsilon = 1e-4);
        assert_relative_eq!(sample.albedo.r, 0.6, epsilon = 1e-4);
    }

    #[test]
    fn miss_falls_back_to_ambient_with_black_albedo() {
        let swatch = PreparedSwatch::new(vec![Arc::new(LambertianMaterial(RGB128::splat(0.6)))]);
        let pack = Arc::new(PreparedPack::build(vec![], vec![], vec![], swatch, &AcceleratorProfile::default()));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::splat(0.2)));

        let worker = AlbedoPixelWorker;
        let mut arena = Allocator::new();
        let mut dist = ContinuousDistribution::new(1, 1, false, 0);
        let sample = worker.evaluate(&scene, Ray::new(Vec3::ZERO, Vec3::Z), &mut dist, &mut arena);

        assert_eq!(sample.radiance, RGB128::splat(0.2));
        assert_eq!(sample.albedo, RGB128::BLACK);
    }
}

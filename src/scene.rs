//! The evaluator's sole entry point into prepared geometry: traces/occludes
//! through the root [`PreparedPack`] and resolves a traced hit into a
//! world-space [`Touch`] (spec.md §2 "an evaluator drives rays through the
//! aggregator, at each hit obtains an interaction").

use crate::aggregator::{OccludeQuery, TraceQuery};
use crate::geometry::UV;
use crate::instance::PreparedPack;
use crate::material::swatch::PreparedSwatch;
use crate::material::touch::Touch;
use crate::math::{Ray, RGB128};
use crate::texture::DirectionalTexture;
use crate::token::{EntityToken, EntityType, TokenHierarchy};
use glam::Vec3;
use std::sync::Arc;

/// The out-of-scene fallback radiance a ray that never hits anything
/// returns (spec.md §4.7 "ambient(query.ray.direction)").
pub enum Ambient {
    Constant(RGB128),
    Directional(DirectionalTexture),
}

impl Ambient {
    pub fn evaluate(&self, direction: Vec3) -> RGB128 {
        match self {
            Ambient::Constant(c) => *c,
            Ambient::Directional(tex) => tex.evaluate(direction).0,
        }
    }
}

/// The prepared scene an evaluator runs against: a root [`PreparedPack`] plus
/// its ambient/environment fallback.
pub struct Scene {
    root: Arc<PreparedPack>,
    ambient: Ambient,
}

impl Scene {
    pub fn new(root: Arc<PreparedPack>, ambient: Ambient) -> Self {
        Self { root, ambient }
    }

    pub fn root(&self) -> &Arc<PreparedPack> {
        &self.root
    }

    pub fn ambient(&self, direction: Vec3) -> RGB128 {
        self.ambient.evaluate(direction)
    }

    /// Finds the nearest hit, respecting `ignore`. World-space `distance` is
    /// exact even through instance recursion: affine transforms (uniform
    /// scale included) preserve the ray parameter, so no rescale is needed
    /// on return (spec.md §4.4, `instance.rs` module doc).
    pub fn trace(&self, ray: Ray, max_distance: f32, ignore: TokenHierarchy) -> TraceQuery {
        let mut query = TraceQuery::new(ray, max_distance, ignore);
        self.root.trace(&mut query);
        query
    }

    pub fn occlude(&self, ray: Ray, travel: f32, ignore: TokenHierarchy) -> bool {
        let query = OccludeQuery::new(ray, travel, ignore);
        self.root.occlude(&query)
    }

    pub fn trace_cost(&self, ray: &Ray, max_distance: f32) -> u32 {
        self.root.trace_cost(ray, max_distance)
    }

    /// Resolves a traced hit into a world-space [`Touch`] plus the leaf
    /// pack's material table, walking down the token path one instance at a
    /// time. `ray` must be the same world-space ray that produced `query`.
    pub fn interact<'a>(&'a self, ray: &Ray, query: &TraceQuery) -> (Touch<'a>, &'a PreparedSwatch) {
        let path = query.token.as_slice();
        debug_assert!(!path.is_empty(), "interact called on a query with no hit");

        let mut pack: &PreparedPack = self.root.as_ref();
        let mut forwards = Vec::with_capacity(path.len() - 1);
        let mut inverses = Vec::with_capacity(path.len() - 1);
        for &token in &path[..path.len() - 1] {
            debug_assert_eq!(token.kind(), EntityType::Instance);
            let instance = pack.instance(token.index() as usize);
            forwards.push(instance.forward_transform());
            inverses.push(instance.inverse_transform());
            pack = instance.pack().as_ref();
        }

        let leaf: EntityToken = path[path.len() - 1];
        let world_point = ray.at(query.distance);
        let mut local_point = world_point;
        for f in &forwards {
            local_point = f.transform_point3(local_point);
        }

        let (normal_local, uv, material) = match leaf.kind() {
            EntityType::Triangle => {
                let tri = pack.triangle(leaf.index() as usize);
                (
                    tri.interpolated_normal(query.uv.0, query.uv.1),
                    tri.interpolated_uv(query.uv.0, query.uv.1),
                    tri.material,
                )
            }
            EntityType::Sphere => {
                let sphere = pack.sphere(leaf.index() as usize);
                (sphere.normal_at(local_point), UV::default(), sphere.material)
            }
            other => unreachable!("unexpected leaf token kind in a trace result: {other:?}"),
        };

        let mut normal_world = normal_local;
        for inv in inverses.iter().rev() {
            normal_world = inv.transform_vector3(normal_world);
        }
        if !inverses.is_empty() && normal_world.length_squared() > 0.0 {
            normal_world = normal_world.normalize();
        }

        let touch = Touch::new(world_point, normal_world, -ray.direction, uv, material);
        (touch, pack.swatch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AcceleratorProfile;
    use crate::arena::Allocator;
    use crate::geometry::PreparedSphere;
    use crate::material::{Emissive, Material, MaterialIndex};
    use approx::assert_relative_eq;
    use glam::{Mat4, Quat, Vec3};

    struct NonEmitter;
    impl Material for NonEmitter {
        fn scatter<'a>(&self, _touch: &mut Touch<'a>, _arena: &'a Allocator) {}
    }

    struct Emitter(RGB128);
    impl Material for Emitter {
        fn scatter<'a>(&self, _touch: &mut Touch<'a>, _arena: &'a Allocator) {}
        fn as_emissive(&self) -> Option<&dyn Emissive> {
            Some(self)
        }
    }
    impl Emissive for Emitter {
        fn emit(&self, _origin: Vec3, _outgoing: Vec3) -> RGB128 {
            self.0
        }
        fn average_radiance(&self) -> f32 {
            self.0.average()
        }
    }

    #[test]
    fn unit_sphere_at_origin_reports_outward_world_normal() {
        let swatch = PreparedSwatch::new(vec![Arc::new(NonEmitter)]);
        let pack = Arc::new(PreparedPack::build(
            vec![],
            vec![PreparedSphere::new(Vec3::ZERO, 1.0, MaterialIndex::new(0))],
            vec![],
            swatch,
            &AcceleratorProfile::default(),
        ));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::WHITE));

        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        let query = scene.trace(ray, f32::INFINITY, TokenHierarchy::new());
        assert!(query.has_hit());

        let (touch, _swatch) = scene.interact(&ray, &query);
        assert_relative_eq!(touch.point.z, -1.0, epsilon = 1e-4);
        assert_relative_eq!(touch.normal.z, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn miss_returns_ambient_fallback() {
        let swatch = PreparedSwatch::new(vec![Arc::new(NonEmitter)]);
        let pack = Arc::new(PreparedPack::build(vec![], vec![], vec![], swatch, &AcceleratorProfile::default()));
        let scene = Scene::new(pack, Ambient::Constant(RGB128::splat(0.5)));

        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let query = scene.trace(ray, f32::INFINITY, TokenHierarchy::new());
        assert!(!query.has_hit());
        assert_eq!(scene.ambient(ray.direction), RGB128::splat(0.5));
    }

    #[test]
    fn nested_instance_hit_transforms_normal_to_world() {
        use crate::instance::PreparedInstance;

        let swatch = PreparedSwatch::new(vec![Arc::new(NonEmitter)]);
        let inner = Arc::new(PreparedPack::build(
            vec![],
            vec![PreparedSphere::new(Vec3::ZERO, 1.0, MaterialIndex::new(0))],
            vec![],
            swatch,
            &AcceleratorProfile::default(),
        ));

        let inverse = Mat4::from_scale_rotation_translation(Vec3::splat(2.0), Quat::IDENTITY, Vec3::new(0.0, 0.0, -5.0));
        let forward = inverse.inverse();
        let instance = Arc::new(PreparedInstance::new(inner, forward, inverse, 2.0));

        let outer_swatch = PreparedSwatch::new(vec![Arc::new(NonEmitter)]);
        let outer = Arc::new(PreparedPack::build(vec![], vec![], vec![instance], outer_swatch, &AcceleratorProfile::default()));
        let scene = Scene::new(outer, Ambient::Constant(RGB128::BLACK));

        let ray = Ray::new(Vec3::new(0.0, 0.0, -10.0), Vec3::Z);
        let query = scene.trace(ray, f32::INFINITY, TokenHierarchy::new());
        assert!(query.has_hit());

        let (touch, _swatch) = scene.interact(&ray, &query);
        assert_relative_eq!(touch.point.z, -7.0, epsilon = 1e-3);
        assert_relative_eq!(touch.normal.z, -1.0, epsilon = 1e-3);
    }
}

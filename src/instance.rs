//! The immutable, prepared scene representation: [`PreparedPack`],
//! [`PreparedInstance`], and the [`PowerDistribution`] that samples
//! emissive geometry by radiant power.

use crate::aggregator::{
    Aggregator, AcceleratorProfile, OccludeQuery, PrimitiveHit, PrimitiveStore, TraceQuery,
};
use crate::geometry::{PreparedSphere, PreparedTriangle};
use crate::material::{MaterialIndex, PreparedSwatch};
use crate::math::{Probable, Ray, AABB};
use crate::sampling::DiscreteDistribution1D;
use crate::token::{EntityToken, EntityType};
use glam::Mat4;
use std::sync::Arc;

/// Per-pack primitive tallies, reported by preparation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryCounts {
    pub triangles: usize,
    pub spheres: usize,
    pub instances: usize,
}

impl GeometryCounts {
    pub fn total(&self) -> usize {
        self.triangles + self.spheres + self.instances
    }
}

/// A weighted segmented sampler over a pack's emissive tokens: local
/// emissive triangles/spheres (weight = area times emitted radiance) and
/// nested emissive instances (weight = cached instance power). Built only
/// when the pack has at least one emissive contributor.
#[derive(Debug, Clone)]
pub struct PowerDistribution {
    tokens: Vec<EntityToken>,
    distribution: DiscreteDistribution1D,
}

impl PowerDistribution {
    /// `weighted` is `(token, area * radiant power)` pairs; entries with a
    /// non-positive weight are dropped before the partition is built.
    /// Returns `None` when nothing remains.
    pub fn build(weighted: Vec<(EntityToken, f32)>) -> Option<PowerDistribution> {
        let weighted: Vec<(EntityToken, f32)> = weighted.into_iter().filter(|(_, w)| *w > 0.0).collect();
        if weighted.is_empty() {
            return None;
        }
        let tokens: Vec<EntityToken> = weighted.iter().map(|(t, _)| *t).collect();
        let weights: Vec<f32> = weighted.iter().map(|(_, w)| *w).collect();
        Some(PowerDistribution {
            tokens,
            distribution: DiscreteDistribution1D::new(&weights),
        })
    }

    /// Picks one token proportional to its share of the total weight.
    pub fn pick(&self, sample: f32) -> Probable<EntityToken> {
        let picked = self.distribution.pick(sample);
        Probable::new(self.tokens[picked.value], picked.pdf)
    }

    /// Sum of every segment's weight, the pack's (unscaled) total radiant
    /// power, used by [`PreparedInstance`] to derive its cached power.
    pub fn total(&self) -> f32 {
        self.distribution.integral()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// The immutable, query-optimized scene pack produced by preparation.
/// Shared (via `Arc`) by every [`PreparedInstance`] that references the
/// same underlying geometry.
pub struct PreparedPack {
    triangles: Vec<PreparedTriangle>,
    spheres: Vec<PreparedSphere>,
    instances: Vec<Arc<PreparedInstance>>,
    aggregator: Box<dyn Aggregator>,
    swatch: PreparedSwatch,
    counts: GeometryCounts,
    power: Option<PowerDistribution>,
}

impl PreparedPack {
    /// Assembles the aggregator over every local triangle/sphere/instance
    /// AABB and the pack's own power distribution (local emissive geometry
    /// plus nested emissive instances), then picks an aggregator variant
    /// per `profile`.
    pub fn build(
        triangles: Vec<PreparedTriangle>,
        spheres: Vec<PreparedSphere>,
        instances: Vec<Arc<PreparedInstance>>,
        swatch: PreparedSwatch,
        profile: &AcceleratorProfile,
    ) -> PreparedPack {
        let mut entries: Vec<(EntityToken, AABB)> = Vec::with_capacity(triangles.len() + spheres.len() + instances.len());
        let mut weighted_emissive = Vec::new();

        for (i, t) in triangles.iter().enumerate() {
            let token = EntityToken::new(EntityType::Triangle, i as u32);
            entries.push((token, t.bounds()));
            if let Some(emissive) = swatch.get(t.material).as_emissive() {
                weighted_emissive.push((token, t.area() * emissive.average_radiance()));
            }
        }
        for (i, s) in spheres.iter().enumerate() {
            let token = EntityToken::new(EntityType::Sphere, i as u32);
            entries.push((token, s.bounds()));
            if let Some(emissive) = swatch.get(s.material).as_emissive() {
                weighted_emissive.push((token, s.area() * emissive.average_radiance()));
            }
        }
        for (i, inst) in instances.iter().enumerate() {
            let token = EntityToken::new(EntityType::Instance, i as u32);
            entries.push((token, inst.world_bounds()));
            if inst.power > 0.0 {
                weighted_emissive.push((token, inst.power));
            }
        }

        let has_instances = !instances.is_empty();
        let aggregator = profile.build(&entries, has_instances);
        let counts = GeometryCounts {
            triangles: triangles.len(),
            spheres: spheres.len(),
            instances: instances.len(),
        };

        tracing::debug!(
            triangles = counts.triangles,
            spheres = counts.spheres,
            instances = counts.instances,
            "prepared pack built"
        );

        PreparedPack {
            triangles,
            spheres,
            instances,
            aggregator,
            swatch,
            counts,
            power: PowerDistribution::build(weighted_emissive),
        }
    }

    pub fn trace(&self, query: &mut TraceQuery) {
        self.aggregator.trace(query, self);
    }

    pub fn occlude(&self, query: &OccludeQuery) -> bool {
        self.aggregator.occlude(query, self)
    }

    pub fn trace_cost(&self, ray: &Ray, max_distance: f32) -> u32 {
        self.aggregator.trace_cost(ray, max_distance, self)
    }

    pub fn aggregator(&self) -> &dyn Aggregator {
        self.aggregator.as_ref()
    }

    pub fn swatch(&self) -> &PreparedSwatch {
        &self.swatch
    }

    pub fn counts(&self) -> GeometryCounts {
        self.counts
    }

    pub fn power_distribution(&self) -> Option<&PowerDistribution> {
        self.power.as_ref()
    }

    pub fn triangle(&self, index: usize) -> &PreparedTriangle {
        &self.triangles[index]
    }

    pub fn sphere(&self, index: usize) -> &PreparedSphere {
        &self.spheres[index]
    }

    pub fn instance(&self, index: usize) -> &Arc<PreparedInstance> {
        &self.instances[index]
    }

    /// Resolves a leaf [`MaterialIndex`] for a triangle/sphere token.
    pub fn material_of(&self, token: EntityToken) -> Option<MaterialIndex> {
        match token.kind() {
            EntityType::Triangle => self.triangles.get(token.index() as usize).map(|t| t.material),
            EntityType::Sphere => self.spheres.get(token.index() as usize).map(|s| s.material),
            _ => None,
        }
    }
}

impl PrimitiveStore for PreparedPack {
    fn intersect(&self, token: EntityToken, ray: &Ray, max_distance: f32, find_far: bool) -> Option<PrimitiveHit> {
        match token.kind() {
            EntityType::Triangle => {
                let tri = &self.triangles[token.index() as usize];
                tri.intersect(ray, max_distance).map(|h| PrimitiveHit {
                    distance: h.distance,
                    uv: (h.u, h.v),
                })
            }
            EntityType::Sphere => {
                let sphere = &self.spheres[token.index() as usize];
                sphere.intersect(ray, max_distance, find_far).map(|d| PrimitiveHit {
                    distance: d,
                    uv: (0.0, 0.0),
                })
            }
            _ => None,
        }
    }

    fn occludes(&self, token: EntityToken, ray: &Ray, travel: f32) -> bool {
        match token.kind() {
            EntityType::Triangle => self.triangles[token.index() as usize].occludes(ray, travel),
            EntityType::Sphere => self.spheres[token.index() as usize].occludes(ray, travel),
            _ => false,
        }
    }

    fn bounds(&self, token: EntityToken) -> AABB {
        match token.kind() {
            EntityType::Triangle => self.triangles[token.index() as usize].bounds(),
            EntityType::Sphere => self.spheres[token.index() as usize].bounds(),
            EntityType::Instance => self.instances[token.index() as usize].world_bounds(),
            _ => AABB::EMPTY,
        }
    }

    fn recurse_instance(&self, token: EntityToken, query: &mut TraceQuery) {
        self.instances[token.index() as usize].trace(token, query);
    }

    fn occlude_instance(&self, token: EntityToken, query: &OccludeQuery) -> bool {
        self.instances[token.index() as usize].occludes(token, query)
    }

    fn instance_cost(&self, token: EntityToken, ray: &Ray, max_distance: f32) -> u32 {
        self.instances[token.index() as usize].trace_cost(ray, max_distance)
    }
}

/// A placed, uniformly-scaled reference to a shared [`PreparedPack`].
///
/// `forward_transform`/`inverse_transform` are the full parent<->local
/// affine maps, uniform scale included: transforming a ray's origin and
/// direction by the same affine matrix preserves the intersection
/// parameter exactly (`t_local == t_world`), so `Trace`/`Occlude` recursion
/// never needs a separate distance rescale. The one place scale must be
/// handled explicitly is radiometric: emitted power scales with area, so
/// `scale` is kept alongside the matrices purely to weight this instance
/// in its parent's [`PowerDistribution`].
pub struct PreparedInstance {
    pack: Arc<PreparedPack>,
    forward_transform: Mat4,
    inverse_transform: Mat4,
    scale: f32,
    /// `pack`'s own emissive power times `scale^2`, cached so a parent
    /// pack's power distribution doesn't need to walk this instance's pack
    /// to weight it.
    power: f32,
}

impl PreparedInstance {
    /// `scale` is the uniform world-size-over-local-size factor baked into
    /// `inverse_transform`'s linear part (and its reciprocal into
    /// `forward_transform`'s); callers validate it's uniform before this
    /// point.
    pub fn new(pack: Arc<PreparedPack>, forward_transform: Mat4, inverse_transform: Mat4, scale: f32) -> Self {
        let power = pack.power_distribution().map_or(0.0, |d| d.total()) * scale * scale;
        Self {
            pack,
            forward_transform,
            inverse_transform,
            scale,
            power,
        }
    }

    pub fn pack(&self) -> &Arc<PreparedPack> {
        &self.pack
    }

    pub fn power(&self) -> f32 {
        self.power
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Parent-to-local affine map, used by [`crate::scene::Scene::interact`]
    /// to localize a world-space hit point while walking down an instance
    /// chain.
    pub fn forward_transform(&self) -> Mat4 {
        self.forward_transform
    }

    /// Local-to-parent affine map, used to bring a leaf's local-space
    /// shading normal back to world space.
    pub fn inverse_transform(&self) -> Mat4 {
        self.inverse_transform
    }

    /// Conservative parent-space AABB of the nested pack's aggregator,
    /// consumed by the enclosing pack's own aggregator build.
    pub fn world_bounds(&self) -> AABB {
        self.pack.aggregator().transformed_aabb(&self.inverse_transform)
    }

    /// Transforms the ray into local space, pushes `token` onto
    /// `query.current`, delegates to the nested pack, then restores.
    pub fn trace(&self, token: EntityToken, query: &mut TraceQuery) {
        let saved_ray = query.ray;
        query.ray = saved_ray.transformed(&self.forward_transform);
        query.current.push(token);

        self.pack.trace(query);

        query.current.pop();
        query.ray = saved_ray;
    }

    /// `Occlude` counterpart. Builds a transformed copy of `query` rather
    /// than mutating in place, since [`OccludeQuery`] is shared by value
    /// through the aggregator's `occlude` contract.
    pub fn occludes(&self, token: EntityToken, query: &OccludeQuery) -> bool {
        let mut local_current = query.current;
        local_current.push(token);
        let local_query = OccludeQuery {
            ray: query.ray.transformed(&self.forward_transform),
            travel: query.travel,
            ignore: query.ignore,
            current: local_current,
        };
        self.pack.occlude(&local_query)
    }

    pub fn trace_cost(&self, ray: &Ray, max_distance: f32) -> u32 {
        let local_ray = ray.transformed(&self.forward_transform);
        self.pack.trace_cost(&local_ray, max_distance)
    }
}

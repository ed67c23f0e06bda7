//! BVH/QBVH/Linear trace throughput over a random triangle soup (spec.md
//! §4.3, §8 testable scenario 5: "10 000 triangles and 10 000 random rays").

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use echo_renderer::aggregator::{Aggregator, Bvh, LinearAggregator, PrimitiveHit, PrimitiveStore, Qbvh, TraceQuery};
use echo_renderer::geometry::{PreparedTriangle, UV};
use echo_renderer::material::MaterialIndex;
use echo_renderer::math::{Ray, AABB};
use echo_renderer::token::{EntityToken, EntityType, TokenHierarchy};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

struct TriangleStore {
    triangles: Vec<PreparedTriangle>,
}

impl PrimitiveStore for TriangleStore {
    fn intersect(&self, token: EntityToken, ray: &Ray, max_distance: f32, _find_far: bool) -> Option<PrimitiveHit> {
        self.triangles[token.index() as usize]
            .intersect(ray, max_distance)
            .map(|hit| PrimitiveHit { distance: hit.distance, uv: (hit.u, hit.v) })
    }

    fn occludes(&self, token: EntityToken, ray: &Ray, travel: f32) -> bool {
        self.triangles[token.index() as usize].occludes(ray, travel)
    }

    fn bounds(&self, token: EntityToken) -> AABB {
        self.triangles[token.index() as usize].bounds()
    }
}

fn random_scene(n: usize) -> (TriangleStore, Vec<(EntityToken, AABB)>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut triangles = Vec::with_capacity(n);
    let mut entries = Vec::with_capacity(n);
    for i in 0..n {
        let center = Vec3::new(
            rng.random_range(-50.0..50.0),
            rng.random_range(-50.0..50.0),
            rng.random_range(-50.0..50.0),
        );
        let v0 = center;
        let v1 = center + Vec3::new(1.0, 0.0, 0.0);
        let v2 = center + Vec3::new(0.0, 1.0, 0.0);
        let tri = PreparedTriangle::new(v0, v1, v2, [Vec3::Z; 3], [UV::default(); 3], MaterialIndex::new(0));
        entries.push((EntityToken::new(EntityType::Triangle, i as u32), tri.bounds()));
        triangles.push(tri);
    }
    (TriangleStore { triangles }, entries)
}

fn random_rays(n: usize) -> Vec<Ray> {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    (0..n)
        .map(|_| {
            let origin = Vec3::new(
                rng.random_range(-60.0..60.0),
                rng.random_range(-60.0..60.0),
                rng.random_range(-60.0..60.0),
            );
            let raw = Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            let direction = if raw.length_squared() > 1e-6 { raw.normalize() } else { Vec3::Z };
            Ray::new(origin, direction)
        })
        .collect()
}

fn trace_all(aggregator: &dyn Aggregator, store: &dyn PrimitiveStore, rays: &[Ray]) -> usize {
    let mut hits = 0;
    for ray in rays {
        let mut query = TraceQuery::new(*ray, f32::INFINITY, TokenHierarchy::new());
        aggregator.trace(&mut query, store);
        if query.has_hit() {
            hits += 1;
        }
    }
    hits
}

fn trace_10k_triangles(c: &mut Criterion) {
    let (store, entries) = random_scene(10_000);
    let rays = random_rays(10_000);

    let linear = LinearAggregator::build(&entries);
    let bvh = Bvh::build(&entries);
    let qbvh = Qbvh::build(&entries);

    let mut group = c.benchmark_group("trace_10k_triangles_10k_rays");
    group.bench_function(BenchmarkId::new("aggregator", "linear"), |b| {
        b.iter(|| black_box(trace_all(&linear, &store, black_box(&rays))));
    });
    group.bench_function(BenchmarkId::new("aggregator", "bvh"), |b| {
        b.iter(|| black_box(trace_all(&bvh, &store, black_box(&rays))));
    });
    group.bench_function(BenchmarkId::new("aggregator", "qbvh"), |b| {
        b.iter(|| black_box(trace_all(&qbvh, &store, black_box(&rays))));
    });
    group.finish();
}

criterion_group!(benches, trace_10k_triangles);
criterion_main!(benches);

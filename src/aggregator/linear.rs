//! Linear aggregator: primitives packed in groups of four with a 4-wide
//! SIMD AABB test (spec.md §4.3). Used below ~32 primitives or at the
//! caller's explicit request.

use super::{full_path, Aggregator, OccludeQuery, PrimitiveStore, TraceQuery};
use crate::math::{Ray, AABB};
use crate::token::{EntityToken, EntityType};
use glam::{BVec4, Vec4};

pub struct LinearAggregator {
    tokens: Vec<EntityToken>,
    bounds: Vec<AABB>,
    total_bounds: AABB,
}

impl LinearAggregator {
    pub fn build(entries: &[(EntityToken, AABB)]) -> Self {
        let tokens = entries.iter().map(|(t, _)| *t).collect();
        let bounds = entries.iter().map(|(_, b)| *b).collect();
        let total_bounds = entries.iter().fold(AABB::EMPTY, |acc, (_, b)| acc.union(b));
        Self {
            tokens,
            bounds,
            total_bounds,
        }
    }

    fn lane_distances(&self, group: &[AABB], ray: &Ray, max_distance: f32) -> [f32; 4] {
        let pad = AABB::EMPTY;
        let b0 = group.first().unwrap_or(&pad);
        let b1 = group.get(1).unwrap_or(&pad);
        let b2 = group.get(2).unwrap_or(&pad);
        let b3 = group.get(3).unwrap_or(&pad);

        let inv_dir = glam::Vec3::ONE / ray.direction;

        let min_x = Vec4::new(b0.min.x, b1.min.x, b2.min.x, b3.min.x);
        let max_x = Vec4::new(b0.max.x, b1.max.x, b2.max.x, b3.max.x);
        let min_y = Vec4::new(b0.min.y, b1.min.y, b2.min.y, b3.min.y);
        let max_y = Vec4::new(b0.max.y, b1.max.y, b2.max.y, b3.max.y);
        let min_z = Vec4::new(b0.min.z, b1.min.z, b2.min.z, b3.min.z);
        let max_z = Vec4::new(b0.max.z, b1.max.z, b2.max.z, b3.max.z);

        let t0x = (min_x - Vec4::splat(ray.origin.x)) * inv_dir.x;
        let t1x = (max_x - Vec4::splat(ray.origin.x)) * inv_dir.x;
        let t0y = (min_y - Vec4::splat(ray.origin.y)) * inv_dir.y;
        let t1y = (max_y - Vec4::splat(ray.origin.y)) * inv_dir.y;
        let t0z = (min_z - Vec4::splat(ray.origin.z)) * inv_dir.z;
        let t1z = (max_z - Vec4::splat(ray.origin.z)) * inv_dir.z;

        let tmin = t0x.min(t1x).max(t0y.min(t1y)).max(t0z.min(t1z));
        let tmax = t0x.max(t1x).min(t0y.max(t1y)).min(t0z.max(t1z));

        let enter = tmin.max(Vec4::ZERO);
        let exit = tmax.min(Vec4::splat(max_distance));
        let hit: BVec4 = enter.cmple(exit);
        Vec4::select(hit, enter, Vec4::splat(f32::INFINITY)).to_array()
    }

    fn group_count(&self) -> usize {
        self.tokens.len().div_ceil(4)
    }

    fn group(&self, index: usize) -> (&[EntityToken], &[AABB]) {
        let start = index * 4;
        let end = (start + 4).min(self.tokens.len());
        (&self.tokens[start..end], &self.bounds[start..end])
    }
}

impl Aggregator for LinearAggregator {
    fn trace(&self, query: &mut TraceQuery, store: &dyn PrimitiveStore) {
        for g in 0..self.group_count() {
            let (tokens, bounds) = self.group(g);
            let lanes = self.lane_distances(bounds, &query.ray, query.distance);
            for (i, &token) in tokens.iter().enumerate() {
                if !lanes[i].is_finite() {
                    continue;
                }
                let full = full_path(&query.current, token);
                if full.matches(&query.ignore) {
                    continue;
                }
                if token.kind() == EntityType::Instance {
                    store.recurse_instance(token, query);
                    continue;
                }
                if let Some(hit) = store.intersect(token, &query.ray, query.distance, false) {
                    if hit.distance < query.distance {
                        query.distance = hit.distance;
                        query.uv = hit.uv;
                        query.token = full;
                    }
                }
            }
        }
    }

    fn occlude(&self, query: &OccludeQuery, store: &dyn PrimitiveStore) -> bool {
        for g in 0..self.group_count() {
            let (tokens, bounds) = self.group(g);
            let lanes = self.lane_distances(bounds, &query.ray, query.travel);
            for (i, &token) in tokens.iter().enumerate() {
                if !lanes[i].is_finite() {
                    continue;
                }
                let full = full_path(&query.current, token);
                if full.matches(&query.ignore) {
                    continue;
                }
                if token.kind() == EntityType::Instance {
                    if store.occlude_instance(token, query) {
                        return true;
                    }
                    continue;
                }
                if store.occludes(token, &query.ray, query.travel) {
                    return true;
                }
            }
        }
        false
    }

    fn trace_cost(&self, ray: &Ray, max_distance: f32, store: &dyn PrimitiveStore) -> u32 {
        let mut cost = 0u32;
        for g in 0..self.group_count() {
            let (tokens, bounds) = self.group(g);
            cost += 1; // one group AABB test
            let lanes = self.lane_distances(bounds, ray, max_distance);
            for (i, &token) in tokens.iter().enumerate() {
                if !lanes[i].is_finite() {
                    continue;
                }
                cost += if token.kind() == EntityType::Instance {
                    store.instance_cost(token, ray, max_distance)
                } else {
                    1
                };
            }
        }
        cost
    }

    fn bounds(&self) -> AABB {
        self.total_bounds
    }
}

//! 4-wide QBVH: groups four BVH children per node and tests all four AABBs
//! at once (spec.md §4.3). Auto-selected at ≥512 primitives.

use super::build::{bounds_of, sah_split, BuildPrimitive};
use super::{full_path, Aggregator, OccludeQuery, PrimitiveStore, TraceQuery};
use crate::math::{Ray, AABB};
use crate::token::{EntityToken, EntityType};
use glam::{BVec4, Vec4};

#[derive(Clone, Copy)]
enum Child {
    Empty,
    Leaf(EntityToken),
    Inner(u32),
}

struct Node {
    bounds: [AABB; 4],
    children: [Child; 4],
}

/// A 4-wide BVH: each node groups up to four children (inner or leaf),
/// hit-ordered by distance (tie-break: lane index ascending) after a single
/// SIMD AABB test.
pub struct Qbvh {
    nodes: Vec<Node>,
    root: Option<u32>,
    total_bounds: AABB,
}

impl Qbvh {
    pub fn build(entries: &[(EntityToken, AABB)]) -> Self {
        let mut prims: Vec<BuildPrimitive> = entries.iter().map(|(t, b)| BuildPrimitive::new(*t, *b)).collect();
        let total_bounds = bounds_of(&prims);
        if prims.is_empty() {
            return Self {
                nodes: Vec::new(),
                root: None,
                total_bounds,
            };
        }
        let mut nodes = Vec::with_capacity(entries.len());
        let root = match build_child(&mut prims, &mut nodes) {
            Child::Inner(index) => index,
            Child::Leaf(token) => {
                // A single primitive still needs a node so the root type is uniform.
                nodes.push(Node {
                    bounds: [bounds_of(&prims), AABB::EMPTY, AABB::EMPTY, AABB::EMPTY],
                    children: [Child::Leaf(token), Child::Empty, Child::Empty, Child::Empty],
                });
                (nodes.len() - 1) as u32
            }
            Child::Empty => unreachable!("non-empty primitive slice never builds an empty child"),
        };
        Self {
            nodes,
            root: Some(root),
            total_bounds,
        }
    }

    fn lane_test(&self, node: &Node, ray: &Ray, max_distance: f32) -> [f32; 4] {
        let inv_dir = glam::Vec3::ONE / ray.direction;
        let b = &node.bounds;
        let min_x = Vec4::new(b[0].min.x, b[1].min.x, b[2].min.x, b[3].min.x);
        let max_x = Vec4::new(b[0].max.x, b[1].max.x, b[2].max.x, b[3].max.x);
        let min_y = Vec4::new(b[0].min.y, b[1].min.y, b[2].min.y, b[3].min.y);
        let max_y = Vec4::new(b[0].max.y, b[1].max.y, b[2].max.y, b[3].max.y);
        let min_z = Vec4::new(b[0].min.z, b[1].min.z, b[2].min.z, b[3].min.z);
        let max_z = Vec4::new(b[0].max.z, b[1].max.z, b[2].max.z, b[3].max.z);

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

    fn trace_node(&self, index: u32, query: &mut TraceQuery, store: &dyn PrimitiveStore) {
        let node = &self.nodes[index as usize];
        let mut lanes = self.lane_test(node, &query.ray, query.distance);
        let mut order = [0usize, 1, 2, 3];
        order.sort_by(|&a, &b| lanes[a].partial_cmp(&lanes[b]).unwrap());

        for &lane in &order {
            if !lanes[lane].is_finite() || lanes[lane] >= query.distance {
                continue;
            }
            match node.children[lane] {
                Child::Empty => {}
                Child::Leaf(token) => {
                    let full = full_path(&query.current, token);
                    if full.matches(&query.ignore) {
                        continue;
                    }
                    if token.kind() == EntityType::Instance {
                        store.recurse_instance(token, query);
                    } else if let Some(hit) = store.intersect(token, &query.ray, query.distance, false) {
                        if hit.distance < query.distance {
                            query.distance = hit.distance;
                            query.uv = hit.uv;
                            query.token = full;
                        }
                    }
                }
                Child::Inner(child_index) => {
                    self.trace_node(child_index, query, store);
                }
            }
            // Re-test: query.distance may have shrunk, invalidating later lanes.
            lanes = self.lane_test(node, &query.ray, query.distance);
        }
    }

    fn occlude_node(&self, index: u32, query: &OccludeQuery, store: &dyn PrimitiveStore) -> bool {
        let node = &self.nodes[index as usize];
        let lanes = self.lane_test(node, &query.ray, query.travel);
        for lane in 0..4 {
            if !lanes[lane].is_finite() {
                continue;
            }
            match node.children[lane] {
                Child::Empty => {}
                Child::Leaf(token) => {
                    let full = full_path(&query.current, token);
                    if full.matches(&query.ignore) {
                        continue;
                    }
                    if token.kind() == EntityType::Instance {
                        if store.occlude_instance(token, query) {
                            return true;
                        }
                    } else if store.occludes(token, &query.ray, query.travel) {
                        return true;
                    }
                }
                Child::Inner(child_index) => {
                    if self.occlude_node(child_index, query, store) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

fn build_child(prims: &mut [BuildPrimitive], nodes: &mut Vec<Node>) -> Child {
    if prims.is_empty() {
        return Child::Empty;
    }
    if prims.len() == 1 {
        return Child::Leaf(prims[0].token);
    }

    let split = sah_split(prims);
    let (left, right) = prims.split_at_mut(split);

    let (left_groups, right_groups) = if left.len() >= 2 && right.len() >= 2 {
        let ls = sah_split(left);
        let rs = sah_split(right);
        let (ll, lr) = left.split_at_mut(ls);
        let (rl, rr) = right.split_at_mut(rs);
        (vec![ll, lr], vec![rl, rr])
    } else {
        (vec![left], vec![right])
    };

    let mut groups: Vec<&mut [BuildPrimitive]> = Vec::with_capacity(4);
    groups.extend(left_groups);
    groups.extend(right_groups);

    let mut bounds = [AABB::EMPTY; 4];
    let mut children = [Child::Empty; 4];
    for (slot, group) in groups.into_iter().enumerate() {
        bounds[slot] = bounds_of(group);
        children[slot] = build_child(group, nodes);
    }

    nodes.push(Node { bounds, children });
    Child::Inner((nodes.len() - 1) as u32)
}

impl Aggregator for Qbvh {
    fn trace(&self, query: &mut TraceQuery, store: &dyn PrimitiveStore) {
        if let Some(root) = self.root {
            self.trace_node(root, query, store);
        }
    }

    fn occlude(&self, query: &OccludeQuery, store: &dyn PrimitiveStore) -> bool {
        self.root.map(|root| self.occlude_node(root, query, store)).unwrap_or(false)
    }

    fn trace_cost(&self, ray: &Ray, max_distance: f32, store: &dyn PrimitiveStore) -> u32 {
        let Some(root) = self.root else { return 0 };
        let mut query = TraceQuery::new(*ray, max_distance, Default::default());
        self.trace_node(root, &mut query, store);
        1 + self.nodes.len() as u32 // coarse: one SIMD test per visited node upper bound
    }

    fn bounds(&self) -> AABB {
        self.total_bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::EntityType;
    use glam::Vec3;

    struct SphereStore {
        centers: Vec<Vec3>,
        radius: f32,
    }

    impl PrimitiveStore for SphereStore {
        fn intersect(&self, token: EntityToken, ray: &Ray, max_distance: f32, _find_far: bool) -> Option<super::super::PrimitiveHit> {
            let center = self.centers[token.index() as usize];
            let oc = ray.origin - center;
            let b = oc.dot(ray.direction);
            let c = oc.length_squared() - self.radius * self.radius;
            let disc = b * b - c;
            if disc < 0.0 {
                return None;
            }
            let t = -b - disc.sqrt();
            if t >= 0.0 && t < max_distance {
                Some(super::super::PrimitiveHit { distance: t, uv: (0.0, 0.0) })
            } else {
                None
            }
        }

        fn occludes(&self, token: EntityToken, ray: &Ray, travel: f32) -> bool {
            self.intersect(token, ray, travel, false).is_some()
        }

        fn bounds(&self, token: EntityToken) -> AABB {
            let center = self.centers[token.index() as usize];
            AABB::new(center - Vec3::splat(self.radius), center + Vec3::splat(self.radius))
        }
    }

    fn build_scene(n: usize) -> (Qbvh, SphereStore) {
        let centers: Vec<Vec3> = (0..n).map(|i| Vec3::new(i as f32 * 3.0, 0.0, 0.0)).collect();
        let store = SphereStore { centers: centers.clone(), radius: 1.0 };
        let entries: Vec<_> = centers
            .iter()
            .enumerate()
            .map(|(i, &c)| (EntityToken::new(EntityType::Sphere, i as u32), AABB::new(c - Vec3::splat(1.0), c + Vec3::splat(1.0))))
            .collect();
        (Qbvh::build(&entries), store)
    }

    #[test]
    fn finds_nearest_sphere_among_many() {
        let (qbvh, store) = build_scene(40);
        let mut query = TraceQuery::new(Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X), f32::INFINITY, Default::default());
        qbvh.trace(&mut query, &store);
        assert!(query.has_hit());
        assert_eq!(query.token.as_slice().last().unwrap().index(), 0);
    }

    #[test]
    fn empty_qbvh_returns_miss() {
        let qbvh = Qbvh::build(&[]);
        let store = SphereStore { centers: vec![], radius: 1.0 };
        let mut query = TraceQuery::new(Ray::new(Vec3::ZERO, Vec3::Z), f32::INFINITY, Default::default());
        qbvh.trace(&mut query, &store);
        assert!(!query.has_hit());
    }

    #[test]
    fn single_primitive_matches_direct_intersection() {
        let (qbvh, store) = build_scene(1);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let mut query = TraceQuery::new(ray, f32::INFINITY, Default::default());
        qbvh.trace(&mut query, &store);
        let direct = store.intersect(EntityToken::new(EntityType::Sphere, 0), &ray, f32::INFINITY, false).unwrap();
        assert!((query.distance - direct.distance).abs() < 1e-4);
    }
}

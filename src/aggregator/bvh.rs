//! Binary BVH built top-down with the surface-area heuristic (spec.md
//! §4.3).

use super::build::{bounds_of, sah_split, BuildPrimitive};
use super::{full_path, Aggregator, OccludeQuery, PrimitiveStore, TraceQuery};
use crate::math::{Ray, AABB};
use crate::token::{EntityToken, EntityType};

struct Node {
    bounds: AABB,
    left: u32,
    right: u32,
    token: EntityToken,
    is_leaf: bool,
}

/// Binary BVH: leaves hold one primitive token; inner nodes hold two child
/// indices and their AABBs. Traversal recurses into the nearer child first
/// and prunes the farther one once `query.distance` has shrunk past it.
pub struct Bvh {
    nodes: Vec<Node>,
    root: u32,
}

impl Bvh {
    pub fn build(entries: &[(EntityToken, AABB)]) -> Self {
        let mut prims: Vec<BuildPrimitive> = entries.iter().map(|(t, b)| BuildPrimitive::new(*t, *b)).collect();
        let mut nodes = Vec::with_capacity(entries.len().max(1) * 2);
        if prims.is_empty() {
            return Self { nodes, root: 0 };
        }
        let root = build_node(&mut prims, &mut nodes);
        Self { nodes, root }
    }

    fn node_bounds(&self, index: u32) -> AABB {
        self.nodes[index as usize].bounds
    }

    fn trace_node(&self, index: u32, query: &mut TraceQuery, store: &dyn PrimitiveStore, cost: &mut u32) {
        let node = &self.nodes[index as usize];
        *cost += 1;
        if !node.bounds.intersect(&query.ray, query.distance).is_finite() {
            return;
        }
        if node.is_leaf {
            let full = full_path(&query.current, node.token);
            if full.matches(&query.ignore) {
                return;
            }
            *cost += 1;
            if node.token.kind() == EntityType::Instance {
                store.recurse_instance(node.token, query);
                return;
            }
            if let Some(hit) = store.intersect(node.token, &query.ray, query.distance, false) {
                if hit.distance < query.distance {
                    query.distance = hit.distance;
                    query.uv = hit.uv;
                    query.token = full;
                }
            }
            return;
        }

        let left_t = self.node_bounds(node.left).intersect(&query.ray, query.distance);
        let right_t = self.node_bounds(node.right).intersect(&query.ray, query.distance);
        let (near, near_t, far, far_t) = if left_t <= right_t {
            (node.left, left_t, node.right, right_t)
        } else {
            (node.right, right_t, node.left, left_t)
        };
        if near_t.is_finite() {
            self.trace_node(near, query, store, cost);
        }
        if far_t.is_finite() && far_t < query.distance {
            self.trace_node(far, query, store, cost);
        }
    }

    fn occlude_node(&self, index: u32, query: &OccludeQuery, store: &dyn PrimitiveStore) -> bool {
        let node = &self.nodes[index as usize];
        if !node.bounds.intersect(&query.ray, query.travel).is_finite() {
            return false;
        }
        if node.is_leaf {
            let full = full_path(&query.current, node.token);
            if full.matches(&query.ignore) {
                return false;
            }
            if node.token.kind() == EntityType::Instance {
                return store.occlude_instance(node.token, query);
            }
            return store.occludes(node.token, &query.ray, query.travel);
        }
        self.occlude_node(node.left, query, store) || self.occlude_node(node.right, query, store)
    }
}

fn build_node(prims: &mut [BuildPrimitive], nodes: &mut Vec<Node>) -> u32 {
    let bounds = bounds_of(prims);
    if prims.len() == 1 {
        nodes.push(Node {
            bounds,
            left: 0,
            right: 0,
            token: prims[0].token,
            is_leaf: true,
        });
        return (nodes.len() - 1) as u32;
    }

    let split = sah_split(prims);
    let (left_slice, right_slice) = prims.split_at_mut(split);
    let left = build_node(left_slice, nodes);
    let right = build_node(right_slice, nodes);
    nodes.push(Node {
        bounds,
        left,
        right,
        token: EntityToken::EMPTY,
        is_leaf: false,
    });
    (nodes.len() - 1) as u32
}

impl Aggregator for Bvh {
    fn trace(&self, query: &mut TraceQuery, store: &dyn PrimitiveStore) {
        if self.nodes.is_empty() {
            return;
        }
        let mut cost = 0;
        self.trace_node(self.root, query, store, &mut cost);
    }

    fn occlude(&self, query: &OccludeQuery, store: &dyn PrimitiveStore) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.occlude_node(self.root, query, store)
    }

    fn trace_cost(&self, ray: &Ray, max_distance: f32, store: &dyn PrimitiveStore) -> u32 {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut query = TraceQuery::new(*ray, max_distance, Default::default());
        let mut cost = 0;
        self.trace_node(self.root, &mut query, store, &mut cost);
        cost
    }

    fn bounds(&self) -> AABB {
        if self.nodes.is_empty() {
            AABB::EMPTY
        } else {
            self.node_bounds(self.root)
        }
    }
}

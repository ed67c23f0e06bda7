//! Shared top-down SAH split logic used by the binary BVH and QBVH builders
//! (spec.md §4.3).

use crate::math::AABB;
use crate::token::EntityToken;
use glam::Vec3;

#[derive(Clone, Copy)]
pub struct BuildPrimitive {
    pub token: EntityToken,
    pub bounds: AABB,
    pub centroid: Vec3,
}

impl BuildPrimitive {
    pub fn new(token: EntityToken, bounds: AABB) -> Self {
        Self {
            token,
            bounds,
            centroid: bounds.center(),
        }
    }
}

fn axis_component(v: Vec3, axis: usize) -> f32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

pub fn bounds_of(prims: &[BuildPrimitive]) -> AABB {
    prims.iter().fold(AABB::EMPTY, |acc, p| acc.union(&p.bounds))
}

/// Sorts `prims` along the bounding box's largest-extent axis and returns the
/// split index minimizing `A_left*n_left + A_right*n_right`, sampled at
/// ~7 stride-spaced candidates. Falls back to an equal partition when every
/// candidate ties (degenerate/coincident bounds), per spec.md §7.
pub fn sah_split(prims: &mut [BuildPrimitive]) -> usize {
    let n = prims.len();
    debug_assert!(n >= 2);
    let bounds = bounds_of(prims);
    let axis = bounds.major_axis();
    prims.sort_by(|a, b| {
        axis_component(a.centroid, axis)
            .partial_cmp(&axis_component(b.centroid, axis))
            .unwrap()
    });

    let mut prefix = vec![AABB::EMPTY; n + 1];
    let mut suffix = vec![AABB::EMPTY; n + 1];
    for i in 0..n {
        prefix[i + 1] = prefix[i].union(&prims[i].bounds);
    }
    for i in (0..n).rev() {
        suffix[i] = suffix[i + 1].union(&prims[i].bounds);
    }

    const CANDIDATES: usize = 7;
    let mut best_cost = f32::INFINITY;
    let mut best_split = n / 2;
    for c in 1..=CANDIDATES {
        let split = ((c * n) / (CANDIDATES + 1)).clamp(1, n - 1);
        let cost = prefix[split].surface_area() * split as f32 + suffix[split].surface_area() * (n - split) as f32;
        if cost < best_cost {
            best_cost = cost;
            best_split = split;
        }
    }
    best_split
}

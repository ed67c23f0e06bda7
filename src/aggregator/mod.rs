//! Ray aggregator contract and its three implementations (spec.md §4.3).
//!
//! An aggregator answers `Trace`/`Occlude` queries over a fixed set of
//! leaves, each addressed by an [`EntityToken`]; it never interprets the
//! leaf's geometry itself — that indirection is [`PrimitiveStore`], so the
//! same aggregator code serves triangles, spheres, and nested instances.

pub mod bvh;
mod build;
pub mod linear;
pub mod profile;
pub mod qbvh;

pub use bvh::Bvh;
pub use linear::LinearAggregator;
pub use profile::{AcceleratorProfile, AcceleratorType};
pub use qbvh::Qbvh;

use crate::math::{Ray, AABB};
use crate::token::{EntityToken, TokenHierarchy};
use glam::Mat4;

/// Result of a single leaf-geometry intersection (triangle or sphere), ahead
/// of the ignore-path check and the `query.distance` comparison a
/// [`PrimitiveStore`] applies.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveHit {
    pub distance: f32,
    pub uv: (f32, f32),
}

/// Leaf-geometry indirection: the aggregator knows only [`EntityToken`]s and
/// [`AABB`]s; a `PrimitiveStore` resolves a token against the live query,
/// mutating it on a closer hit. Instance tokens recurse into a nested pack's
/// own aggregator (pushing onto `query.current` for the duration), so the
/// ignore-path comparison — full instance chain plus leaf — is entirely the
/// store's responsibility, not the aggregator's (spec.md §4.1 "PreparedPack",
/// §4.4).
pub trait PrimitiveStore: Sync {
    fn intersect(&self, token: EntityToken, ray: &Ray, max_distance: f32, find_far: bool) -> Option<PrimitiveHit>;
    fn occludes(&self, token: EntityToken, ray: &Ray, travel: f32) -> bool;
    fn bounds(&self, token: EntityToken) -> AABB;

    /// Recurse a `Trace` into the nested pack an instance token refers to,
    /// mutating `query` in place: push `token` onto `query.current`,
    /// transform the ray and distance bound into the instance's local
    /// space, delegate to the nested aggregator, then restore (spec.md
    /// §4.4). The default panics: only [`crate::instance::PreparedPack`],
    /// the one store that can hold instance tokens, overrides it.
    fn recurse_instance(&self, _token: EntityToken, _query: &mut TraceQuery) {
        unreachable!("recurse_instance called on a store with no instance tokens")
    }

    /// `Occlude` counterpart of [`Self::recurse_instance`]. Takes `query` by
    /// shared reference because occlusion recursion only needs a transformed
    /// *copy* of the query, not in-place mutation (spec.md §4.4).
    fn occlude_instance(&self, _token: EntityToken, _query: &OccludeQuery) -> bool {
        unreachable!("occlude_instance called on a store with no instance tokens")
    }

    /// `TraceCost` counterpart: transform `ray`/`max_distance` into the
    /// instance's local space and return the nested aggregator's cost.
    fn instance_cost(&self, _token: EntityToken, _ray: &Ray, _max_distance: f32) -> u32 {
        1
    }
}

/// Find-nearest-hit query (spec.md §3 `TraceQuery`). `distance` starts at the
/// caller's upper bound and only ever shrinks; `token` accumulates the full
/// instance path to the winning leaf.
#[derive(Debug, Clone)]
pub struct TraceQuery {
    pub ray: Ray,
    pub distance: f32,
    pub uv: (f32, f32),
    pub ignore: TokenHierarchy,
    pub current: TokenHierarchy,
    pub token: TokenHierarchy,
}

impl TraceQuery {
    pub fn new(ray: Ray, max_distance: f32, ignore: TokenHierarchy) -> Self {
        Self {
            ray,
            distance: max_distance,
            uv: (0.0, 0.0),
            ignore,
            current: TokenHierarchy::new(),
            token: TokenHierarchy::new(),
        }
    }

    pub fn has_hit(&self) -> bool {
        self.distance.is_finite()
    }
}

/// Any-hit-before-a-limit query (spec.md §3 `OccludeQuery`).
#[derive(Debug, Clone)]
pub struct OccludeQuery {
    pub ray: Ray,
    pub travel: f32,
    pub ignore: TokenHierarchy,
    pub current: TokenHierarchy,
}

impl OccludeQuery {
    pub fn new(ray: Ray, travel: f32, ignore: TokenHierarchy) -> Self {
        Self {
            ray,
            travel,
            ignore,
            current: TokenHierarchy::new(),
        }
    }
}

/// `current + leaf`, compared against `ignore` to suppress self-intersection
/// across the full instance path, not just the leaf token (spec.md §4.4).
fn full_path(current: &TokenHierarchy, leaf: EntityToken) -> TokenHierarchy {
    let mut full = *current;
    full.push(leaf);
    full
}

/// Single capability every aggregator variant exposes (spec.md §4.3): trace,
/// occlude, a cost estimate for the quality worker, and a conservative
/// transformed bound for parent-level AABB assembly.
pub trait Aggregator: Send + Sync {
    fn trace(&self, query: &mut TraceQuery, store: &dyn PrimitiveStore);
    fn occlude(&self, query: &OccludeQuery, store: &dyn PrimitiveStore) -> bool;
    fn trace_cost(&self, ray: &Ray, max_distance: f32, store: &dyn PrimitiveStore) -> u32;
    fn bounds(&self) -> AABB;

    fn transformed_aabb(&self, transform: &Mat4) -> AABB {
        self.bounds().transformed(transform)
    }
}

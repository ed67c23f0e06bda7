//! Leaf math primitives shared by every other module.
//!
//! Mirrors the way `astraweave-math`/`astraweave-physics` wrap `glam` types
//! in small domain structs instead of inventing a parallel vector library:
//! every primitive here is either a thin wrapper around `glam::Vec3` or a
//! plain-old-data tuple type.

use glam::{Mat4, Vec3};
use std::ops::{Add, AddAssign, Mul, Sub};

/// A world- or local-space ray: an origin plus a direction that callers are
/// expected to keep unit length (see [`Ray::is_direction_unit`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Invariant check used by debug assertions and tests: direction must be
    /// unit-length within `1e-5` (spec.md §3).
    pub fn is_direction_unit(&self) -> bool {
        (self.direction.length() - 1.0).abs() < 1e-5
    }

    /// Transform this ray by an affine matrix, without renormalizing the
    /// direction (callers that need a unit direction apply the instance's
    /// scale factor themselves, per spec.md §4.4).
    pub fn transformed(&self, transform: &Mat4) -> Ray {
        Ray {
            origin: transform.transform_point3(self.origin),
            direction: transform.transform_vector3(self.direction),
        }
    }
}

/// Axis-aligned bounding box. Invariant: `min <= max` componentwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub const EMPTY: AABB = AABB {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y && min.z <= max.z);
        Self { min, max }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn union_point(&self, p: Vec3) -> AABB {
        AABB {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest-extent axis (0 = x, 1 = y, 2 = z), used by the BVH's SAH
    /// split-axis selection (spec.md §4.3).
    pub fn major_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    pub fn surface_area(&self) -> f32 {
        let e = self.extent();
        if e.x < 0.0 || e.y < 0.0 || e.z < 0.0 {
            return 0.0;
        }
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Slab-method intersection: returns the entry distance, or `+inf` on a
    /// miss, never farther than `max_distance`.
    pub fn intersect(&self, ray: &Ray, max_distance: f32) -> f32 {
        let inv_dir = Vec3::ONE / ray.direction;
        let t0 = (self.min - ray.origin) * inv_dir;
        let t1 = (self.max - ray.origin) * inv_dir;
        let tmin = t0.min(t1);
        let tmax = t0.max(t1);
        let enter = tmin.x.max(tmin.y).max(tmin.z).max(0.0);
        let exit = tmax.x.min(tmax.y).min(tmax.z).min(max_distance);
        if enter <= exit {
            enter
        } else {
            f32::INFINITY
        }
    }

    /// Conservative AABB of this box's eight corners under an affine
    /// transform (spec.md §4.3 `GetTransformedAABB`).
    pub fn transformed(&self, transform: &Mat4) -> AABB {
        let mut result = AABB::EMPTY;
        for i in 0..8u8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            result = result.union_point(transform.transform_point3(corner));
        }
        result
    }
}

impl Default for AABB {
    fn default() -> Self {
        AABB::EMPTY
    }
}

/// Linear, energy-preserving RGB color in double precision channel sums but
/// stored at `f32` for throughput math (spec.md §3 `RGB128`).
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct RGB128 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RGB128 {
    pub const BLACK: RGB128 = RGB128 { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: RGB128 = RGB128 { r: 1.0, g: 1.0, b: 1.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn splat(v: f32) -> Self {
        Self { r: v, g: v, b: v }
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    pub fn is_black(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }

    pub fn average(&self) -> f32 {
        (self.r + self.g + self.b) / 3.0
    }

    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Add for RGB128 {
    type Output = RGB128;
    fn add(self, rhs: RGB128) -> RGB128 {
        RGB128::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl AddAssign for RGB128 {
    fn add_assign(&mut self, rhs: RGB128) {
        *self = *self + rhs;
    }
}

impl Sub for RGB128 {
    type Output = RGB128;
    fn sub(self, rhs: RGB128) -> RGB128 {
        RGB128::new(self.r - rhs.r, self.g - rhs.g, self.b - rhs.b)
    }
}

impl Mul<f32> for RGB128 {
    type Output = RGB128;
    fn mul(self, rhs: f32) -> RGB128 {
        RGB128::new(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

impl Mul<RGB128> for RGB128 {
    type Output = RGB128;
    fn mul(self, rhs: RGB128) -> RGB128 {
        RGB128::new(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b)
    }
}

impl Default for RGB128 {
    fn default() -> Self {
        RGB128::BLACK
    }
}

/// A single scalar sample in `[0, 1)` drawn from a [`crate::sampling::continuous::ContinuousDistribution`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample1D(pub f32);

/// A 2D sample in `[0, 1)^2`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample2D {
    pub x: f32,
    pub y: f32,
}

impl Sample2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// `(value, pdf)` pair. Convention: `pdf == 0.0` means the sample is
/// degenerate and `value` must not be trusted (glossary: `Probable<T>`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probable<T> {
    pub value: T,
    pub pdf: f32,
}

impl<T> Probable<T> {
    pub fn new(value: T, pdf: f32) -> Self {
        Self { value, pdf }
    }

    pub fn is_degenerate(&self) -> bool {
        self.pdf <= 0.0
    }
}

/// Kahan-compensated running sum, used wherever many small radiance
/// contributions are accumulated in sequence (the pixel accumulator's
/// per-sample merge and the directional texture's row-weight integral).
#[derive(Debug, Clone, Copy, Default)]
pub struct Summation {
    sum: f64,
    compensation: f64,
}

impl Summation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    pub fn total(&self) -> f64 {
        self.sum
    }
}

/// Clamp to `[-1, 1]` before `acos`/`asin`, as spec.md §4.6 requires for all
/// Fresnel inputs.
#[inline]
pub fn clamp_unit(x: f32) -> f32 {
    x.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn aabb_slab_intersect_hits_and_misses() {
        let b = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let hit = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert_relative_eq!(b.intersect(&hit, f32::INFINITY), 4.0, epsilon = 1e-5);

        let miss = Ray::new(Vec3::new(5.0, 5.0, -5.0), Vec3::Z);
        assert_eq!(b.intersect(&miss, f32::INFINITY), f32::INFINITY);
    }

    #[test]
    fn aabb_bound_respects_max_distance() {
        let b = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert_eq!(b.intersect(&ray, 2.0), f32::INFINITY);
    }

    #[test]
    fn rgb_arithmetic() {
        let a = RGB128::new(0.1, 0.2, 0.3);
        let b = RGB128::new(0.2, 0.1, 0.0);
        assert_relative_eq!((a + b).r, 0.3, epsilon = 1e-6);
        assert_relative_eq!((a * 2.0).g, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn summation_matches_naive_sum_within_tolerance() {
        let mut s = Summation::new();
        let mut naive = 0.0f64;
        for i in 0..100_000 {
            let v = (i as f64).sin();
            s.add(v);
            naive += v;
        }
        assert_relative_eq!(s.total(), naive, epsilon = 1e-6);
    }

    #[test]
    fn probable_degenerate_when_pdf_zero() {
        let p = Probable::new(RGB128::BLACK, 0.0);
        assert!(p.is_degenerate());
    }
}

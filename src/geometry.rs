//! Prepared, immutable geometry primitives (spec.md §3/§4.2
//! `PreparedTriangle`, `PreparedSphere`).

use crate::material::MaterialIndex;
use crate::math::{Ray, Sample2D, AABB};
use crate::token::{EntityToken, TokenHierarchy};
use glam::Vec3;

/// A 2D UV pair, unnormalized when used as barycentric weights during
/// triangle sampling (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UV {
    pub u: f32,
    pub v: f32,
}

impl UV {
    pub fn new(u: f32, v: f32) -> Self {
        Self { u, v }
    }
}

/// A triangle flattened into the Möller–Trumbore edge form, with its
/// (unnormalized, barycentrically-interpolated) shading data.
#[derive(Debug, Clone, Copy)]
pub struct PreparedTriangle {
    pub vertex0: Vec3,
    pub edge1: Vec3,
    pub edge2: Vec3,
    pub normals: [Vec3; 3],
    pub uvs: [UV; 3],
    pub material: MaterialIndex,
}

/// Result of a triangle intersection: barycentric `(u, v)` plus distance.
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    pub distance: f32,
    pub u: f32,
    pub v: f32,
}

impl PreparedTriangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, normals: [Vec3; 3], uvs: [UV; 3], material: MaterialIndex) -> Self {
        Self {
            vertex0: v0,
            edge1: v1 - v0,
            edge2: v2 - v0,
            normals,
            uvs,
            material,
        }
    }

    pub fn vertex1(&self) -> Vec3 {
        self.vertex0 + self.edge1
    }

    pub fn vertex2(&self) -> Vec3 {
        self.vertex0 + self.edge2
    }

    /// Triangle area: `½|edge1 × edge2|` (spec.md §4.1).
    pub fn area(&self) -> f32 {
        self.edge1.cross(self.edge2).length() * 0.5
    }

    pub fn bounds(&self) -> AABB {
        AABB::from_point(self.vertex0)
            .union_point(self.vertex1())
            .union_point(self.vertex2())
    }

    /// Möller–Trumbore intersection. Returns `+inf` on a parallel ray or a
    /// miss; never returns a negative distance.
    pub fn intersect(&self, ray: &Ray, max_distance: f32) -> Option<TriangleHit> {
        let p = ray.direction.cross(self.edge2);
        let det = self.edge1.dot(p);
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let t_vec = ray.origin - self.vertex0;
        let u = t_vec.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = t_vec.cross(self.edge1);
        let v = ray.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = self.edge2.dot(q) * inv_det;
        if t < 0.0 || t >= max_distance {
            return None;
        }
        Some(TriangleHit { distance: t, u, v })
    }

    /// Shares the same rejection branches as [`Self::intersect`] but skips
    /// the final division and early-exits once `t < travel` is known
    /// (spec.md §4.2 occlude variant).
    pub fn occludes(&self, ray: &Ray, travel: f32) -> bool {
        let p = ray.direction.cross(self.edge2);
        let det = self.edge1.dot(p);
        if det.abs() < f32::EPSILON {
            return false;
        }
        let inv_det = 1.0 / det;
        let t_vec = ray.origin - self.vertex0;
        let u = t_vec.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return false;
        }
        let q = t_vec.cross(self.edge1);
        let v = ray.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return false;
        }
        let t = self.edge2.dot(q) * inv_det;
        t >= 0.0 && t < travel
    }

    /// Barycentrically interpolated shading normal:
    /// `normalize((1-u-v)*n0 + u*n1 + v*n2)`.
    pub fn interpolated_normal(&self, u: f32, v: f32) -> Vec3 {
        let n = self.normals[0] * (1.0 - u - v) + self.normals[1] * u + self.normals[2] * v;
        if n.length_squared() > 0.0 {
            n.normalize()
        } else {
            Vec3::ZERO
        }
    }

    /// Barycentrically interpolated UV, left unnormalized as spec.md §4.2
    /// requires.
    pub fn interpolated_uv(&self, u: f32, v: f32) -> UV {
        let w0 = 1.0 - u - v;
        UV::new(
            self.uvs[0].u * w0 + self.uvs[1].u * u + self.uvs[2].u * v,
            self.uvs[0].v * w0 + self.uvs[1].v * u + self.uvs[2].v * v,
        )
    }

    /// Uniform barycentric sample: `(u, v) = (1 - sqrt(xi1), xi2*sqrt(xi1))`.
    pub fn sample_barycentric(&self, sample: Sample2D) -> (f32, f32, Vec3) {
        let sqrt_xi1 = sample.x.sqrt();
        let u = 1.0 - sqrt_xi1;
        let v = sample.y * sqrt_xi1;
        let point = self.vertex0 + self.edge1 * u + self.edge2 * v;
        (u, v, point)
    }

    /// Solid-angle pdf of a direct area-light sample: `d^2 / (|n.w| * A)`.
    pub fn solid_angle_pdf(&self, distance: f32, cos_theta: f32) -> f32 {
        let area = self.area();
        if area <= 0.0 || cos_theta.abs() <= 0.0 {
            return 0.0;
        }
        (distance * distance) / (cos_theta.abs() * area)
    }
}

/// A sphere primitive (spec.md §3/§4.2 `PreparedSphere`).
#[derive(Debug, Clone, Copy)]
pub struct PreparedSphere {
    pub center: Vec3,
    pub radius: f32,
    pub material: MaterialIndex,
}

impl PreparedSphere {
    pub fn new(center: Vec3, radius: f32, material: MaterialIndex) -> Self {
        Self { center, radius, material }
    }

    pub fn area(&self) -> f32 {
        4.0 * std::f32::consts::PI * self.radius * self.radius
    }

    pub fn bounds(&self) -> AABB {
        let r = Vec3::splat(self.radius);
        AABB::new(self.center - r, self.center + r)
    }

    /// Solves `|o + td - c|^2 = r^2` with a numerically safe formulation:
    /// recenter at the origin, then a Horner-form discriminant. `find_far`
    /// selects the second root, used to suppress self-occlusion when an
    /// emissive sphere samples its own surface (spec.md §4.2).
    pub fn intersect(&self, ray: &Ray, max_distance: f32, find_far: bool) -> Option<f32> {
        let oc = ray.origin - self.center;
        let a = ray.direction.length_squared();
        let half_b = oc.dot(ray.direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrt_d = discriminant.sqrt();
        let near = (-half_b - sqrt_d) / a;
        let far = (-half_b + sqrt_d) / a;

        let t = if find_far {
            far
        } else if near >= 0.0 {
            near
        } else {
            far
        };

        if t < 0.0 || t >= max_distance {
            None
        } else {
            Some(t)
        }
    }

    pub fn occludes(&self, ray: &Ray, travel: f32) -> bool {
        self.intersect(ray, travel, false).is_some()
    }

    pub fn normal_at(&self, point: Vec3) -> Vec3 {
        (point - self.center).normalize()
    }
}

/// Either geometry primitive, addressed by an [`EntityToken`], the aggregator
/// builder's common input (spec.md §4.1 "AABB assembly").
#[derive(Debug, Clone, Copy)]
pub enum GeometryRef {
    Triangle(usize),
    Sphere(usize),
}

impl GeometryRef {
    pub fn as_token(&self) -> EntityToken {
        match *self {
            GeometryRef::Triangle(i) => EntityToken::new(crate::token::EntityType::Triangle, i as u32),
            GeometryRef::Sphere(i) => EntityToken::new(crate::token::EntityType::Sphere, i as u32),
        }
    }
}

/// Used by [`crate::aggregator`] to tag a traced hit with the path it was
/// reached through, so a spawned shadow ray can ignore its own origin
/// surface (spec.md §3 `TokenHierarchy`).
pub fn push_leaf(current: &mut TokenHierarchy, leaf: EntityToken) {
    current.push(leaf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialIndex;
    use approx::assert_relative_eq;

    fn unit_triangle() -> PreparedTriangle {
        PreparedTriangle::new(
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            [Vec3::Z; 3],
            [UV::default(), UV::new(1.0, 0.0), UV::new(0.0, 1.0)],
            MaterialIndex::new(0),
        )
    }

    #[test]
    fn triangle_hit_matches_scenario_2_of_spec() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = tri.intersect(&ray, f32::INFINITY).expect("must hit");
        assert_relative_eq!(hit.distance, 1.0, epsilon = 1e-5);
        assert_relative_eq!(hit.u, 0.25, epsilon = 1e-5);
        assert_relative_eq!(hit.v, 0.25, epsilon = 1e-5);
    }

    #[test]
    fn triangle_parallel_ray_returns_none() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(tri.intersect(&ray, f32::INFINITY).is_none());
    }

    #[test]
    fn triangle_area_is_half_cross_product() {
        let tri = unit_triangle();
        assert_relative_eq!(tri.area(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn sphere_center_on_ray_origin_hits_at_radius() {
        let sphere = PreparedSphere::new(Vec3::ZERO, 2.0, MaterialIndex::new(0));
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let near = sphere.intersect(&ray, f32::INFINITY, false).unwrap();
        let far = sphere.intersect(&ray, f32::INFINITY, true).unwrap();
        assert_relative_eq!(near, 2.0, epsilon = 1e-5);
        assert_relative_eq!(far, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn sphere_area_matches_four_pi_r_squared() {
        let sphere = PreparedSphere::new(Vec3::ZERO, 1.0, MaterialIndex::new(0));
        assert_relative_eq!(sphere.area(), 4.0 * std::f32::consts::PI, epsilon = 1e-4);
    }
}

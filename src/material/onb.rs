//! Local shading frame: normal along `+Z` (spec.md §4.6).

use glam::Vec3;

/// Orthonormal basis built from a single normal, used to rotate world-space
/// directions into the local BxDF frame and back.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    tangent: Vec3,
    bitangent: Vec3,
    normal: Vec3,
}

impl Frame {
    /// Branchless tangent-frame construction (Duff et al., "Building an
    /// Orthonormal Basis, Revisited").
    pub fn from_normal(normal: Vec3) -> Self {
        let sign = 1.0f32.copysign(normal.z);
        let a = -1.0 / (sign + normal.z);
        let b = normal.x * normal.y * a;
        let tangent = Vec3::new(1.0 + sign * normal.x * normal.x * a, sign * b, -sign * normal.x);
        let bitangent = Vec3::new(b, sign + normal.y * normal.y * a, -normal.y);
        Self {
            tangent,
            bitangent,
            normal,
        }
    }

    pub fn to_local(&self, world: Vec3) -> Vec3 {
        Vec3::new(world.dot(self.tangent), world.dot(self.bitangent), world.dot(self.normal))
    }

    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.tangent * local.x + self.bitangent * local.y + self.normal * local.z
    }
}

/// `cos(theta)` in the local frame: just the `z` component.
#[inline]
pub fn cosine(v: Vec3) -> f32 {
    v.z
}

#[inline]
pub fn cosine2(v: Vec3) -> f32 {
    v.z * v.z
}

/// `sin(theta)`, clamped to avoid `NaN` from floating-point error pushing
/// `1 - cos^2` slightly negative.
#[inline]
pub fn sine(v: Vec3) -> f32 {
    (1.0 - cosine2(v)).max(0.0).sqrt()
}

#[inline]
pub fn tangent_ratio(v: Vec3) -> f32 {
    let s = sine(v);
    if s == 0.0 {
        0.0
    } else {
        cosine(v) / s
    }
}

/// `cos(phi)`, defined as `1.0` when `sin(theta) == 0` to avoid a `NaN` from
/// `0 / 0` (spec.md §4.6).
#[inline]
pub fn cosine_phi(v: Vec3) -> f32 {
    let s = sine(v);
    if s == 0.0 {
        1.0
    } else {
        (v.x / s).clamp(-1.0, 1.0)
    }
}

/// `sin(phi)`, `0.0` when `sin(theta) == 0`.
#[inline]
pub fn sine_phi(v: Vec3) -> f32 {
    let s = sine(v);
    if s == 0.0 {
        0.0
    } else {
        (v.y / s).clamp(-1.0, 1.0)
    }
}

#[inline]
pub fn same_hemisphere(a: Vec3, b: Vec3) -> bool {
    a.z * b.z > 0.0
}

#[inline]
pub fn reflect(v: Vec3) -> Vec3 {
    Vec3::new(-v.x, -v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frame_round_trips_world_directions() {
        let frame = Frame::from_normal(Vec3::new(0.3, 0.6, 0.742).normalize());
        let world = Vec3::new(0.2, -0.5, 0.843).normalize();
        let local = frame.to_local(world);
        let back = frame.to_world(local);
        assert_relative_eq!(back.x, world.x, epsilon = 1e-4);
        assert_relative_eq!(back.y, world.y, epsilon = 1e-4);
        assert_relative_eq!(back.z, world.z, epsilon = 1e-4);
    }

    #[test]
    fn sine_is_zero_at_poles_without_nan() {
        let pole = Vec3::Z;
        assert_relative_eq!(sine(pole), 0.0, epsilon = 1e-6);
        assert_eq!(cosine_phi(pole), 1.0);
        assert_eq!(sine_phi(pole), 0.0);
    }

    #[test]
    fn reflect_flips_only_tangential_components() {
        let v = Vec3::new(0.5, 0.2, 0.8);
        let r = reflect(v);
        assert_eq!(r, Vec3::new(-0.5, -0.2, 0.8));
    }
}

//! Fresnel reflectance terms (spec.md §4.6). Inputs are clamped to
//! `[-1, 1]` before any inverse trig.

use crate::math::{clamp_unit, RGB128};

/// Schlick's approximation for dielectric Fresnel reflectance.
pub fn schlick(cos_theta: f32, r0: f32) -> f32 {
    let c = clamp_unit(cos_theta).abs();
    r0 + (1.0 - r0) * (1.0 - c).powi(5)
}

/// Full Fresnel equations for an unpolarized dielectric interface, honoring
/// total internal reflection.
pub fn dielectric(cos_theta_i: f32, eta_i: f32, eta_t: f32) -> f32 {
    let cos_i = clamp_unit(cos_theta_i);
    let (eta_i, eta_t, cos_i) = if cos_i > 0.0 {
        (eta_i, eta_t, cos_i)
    } else {
        (eta_t, eta_i, -cos_i)
    };

    let sin_t2 = (eta_i / eta_t).powi(2) * (1.0 - cos_i * cos_i).max(0.0);
    if sin_t2 >= 1.0 {
        return 1.0; // total internal reflection
    }
    let cos_t = (1.0 - sin_t2).max(0.0).sqrt();

    let r_parallel = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let r_perpendicular = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    (r_parallel * r_parallel + r_perpendicular * r_perpendicular) * 0.5
}

/// Fresnel reflectance at a conductor (metal) interface, complex
/// index-of-refraction variant: `eta` and `k` are per-channel.
pub fn conductor(cos_theta_i: f32, eta: RGB128, k: RGB128) -> RGB128 {
    let cos_i = clamp_unit(cos_theta_i).abs();
    let cos_i2 = cos_i * cos_i;
    let sin_i2 = 1.0 - cos_i2;

    let channel = |eta: f32, k: f32| -> f32 {
        let eta2 = eta * eta;
        let k2 = k * k;
        let t0 = eta2 - k2 - sin_i2;
        let a2plusb2 = (t0 * t0 + 4.0 * eta2 * k2).max(0.0).sqrt();
        let t1 = a2plusb2 + cos_i2;
        let a = (0.5 * (a2plusb2 + t0)).max(0.0).sqrt();
        let t2 = 2.0 * a * cos_i;
        let rs = (t1 - t2) / (t1 + t2);

        let t3 = cos_i2 * a2plusb2 + sin_i2 * sin_i2;
        let t4 = t2 * sin_i2;
        let rp = rs * (t3 - t4) / (t3 + t4);

        0.5 * (rp + rs)
    };

    RGB128::new(
        channel(eta.r, k.r),
        channel(eta.g, k.g),
        channel(eta.b, k.b),
    )
}

/// Snell's law refraction of `incident` (pointing away from the surface,
/// local `+Z` frame) across an interface with ratio `eta = eta_above /
/// eta_below`. Returns `None` on total internal reflection.
pub fn refract(incident: glam::Vec3, eta: f32) -> Option<glam::Vec3> {
    let cos_i = incident.z;
    let sin2_i = (1.0 - cos_i * cos_i).max(0.0);
    let sin2_t = eta * eta * sin2_i;
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).max(0.0).sqrt();
    let cos_t = cos_t.copysign(-cos_i);
    Some(glam::Vec3::new(-eta * incident.x, -eta * incident.y, cos_t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schlick_is_full_reflectance_at_grazing_angle() {
        assert!((schlick(0.0, 0.04) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn dielectric_matches_schlick_roughly_at_normal_incidence() {
        let exact = dielectric(1.0, 1.0, 1.5);
        let r0 = ((1.5 - 1.0) / (1.5 + 1.0)).powi(2);
        assert!((exact - r0).abs() < 1e-4);
    }

    #[test]
    fn total_internal_reflection_returns_full_reflectance() {
        // Going from dense (1.5) to rare (1.0) medium at grazing incidence.
        let cos_i = 0.05;
        let f = dielectric(cos_i, 1.5, 1.0);
        assert!(f > 0.9);
    }

    #[test]
    fn refract_none_on_total_internal_reflection() {
        let incident = glam::Vec3::new(0.99, 0.0, 0.1).normalize();
        assert!(refract(incident, 1.5).is_none());
    }
}

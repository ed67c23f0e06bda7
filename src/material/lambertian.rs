//! Perfectly diffuse reflectance: `f = albedo / pi` (spec.md §4.6).

use super::bxdf::{cosine_sample_hemisphere, Bxdf, BxdfSample, BxdfType};
use super::onb::same_hemisphere;
use crate::math::{RGB128, Sample2D};
use glam::Vec3;
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy)]
pub struct Lambertian {
    pub albedo: RGB128,
}

impl Lambertian {
    pub fn new(albedo: RGB128) -> Self {
        Self { albedo }
    }
}

impl Bxdf for Lambertian {
    fn kind(&self) -> BxdfType {
        BxdfType::REFLECTION | BxdfType::DIFFUSE
    }

    fn evaluate(&self, outgoing: Vec3, incident: Vec3) -> RGB128 {
        if !same_hemisphere(outgoing, incident) {
            return RGB128::BLACK;
        }
        self.albedo * (1.0 / PI)
    }

    fn sample(&self, outgoing: Vec3, sample: Sample2D) -> Option<BxdfSample> {
        let incident = cosine_sample_hemisphere(sample, outgoing);
        let pdf = self.probability_density(outgoing, incident);
        if pdf <= 0.0 {
            return None;
        }
        Some(BxdfSample {
            incident,
            f: self.evaluate(outgoing, incident),
            pdf,
        })
    }

    fn probability_density(&self, outgoing: Vec3, incident: Vec3) -> f32 {
        if same_hemisphere(outgoing, incident) {
            incident.z.abs() / PI
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lambertian_f_is_albedo_over_pi() {
        let b = Lambertian::new(RGB128::splat(0.8));
        let f = b.evaluate(Vec3::Z, Vec3::Z);
        assert_relative_eq!(f.r, 0.8 / PI, epsilon = 1e-6);
    }

    #[test]
    fn lambertian_sample_pdf_matches_cosine_law() {
        let b = Lambertian::new(RGB128::splat(0.5));
        let s = b.sample(Vec3::Z, Sample2D::new(0.2, 0.6)).unwrap();
        assert_relative_eq!(s.pdf, s.incident.z.abs() / PI, epsilon = 1e-6);
    }
}

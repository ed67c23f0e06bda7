//! Delta BxDFs: perfect specular reflection and transmission (spec.md
//! §4.6).

use super::bxdf::{Bxdf, BxdfSample, BxdfType};
use super::fresnel;
use super::onb::reflect;
use crate::math::{Sample2D, RGB128};
use glam::Vec3;

/// The Fresnel model a [`SpecularReflection`] evaluates at the hit cosine.
#[derive(Debug, Clone, Copy)]
pub enum FresnelKind {
    Dielectric { eta_i: f32, eta_t: f32 },
    Conductor { eta: RGB128, k: RGB128 },
    Schlick { r0: f32 },
}

impl FresnelKind {
    fn evaluate(&self, cos_theta: f32) -> RGB128 {
        match *self {
            FresnelKind::Dielectric { eta_i, eta_t } => RGB128::splat(fresnel::dielectric(cos_theta, eta_i, eta_t)),
            FresnelKind::Conductor { eta, k } => fresnel::conductor(cos_theta, eta, k),
            FresnelKind::Schlick { r0 } => RGB128::splat(fresnel::schlick(cos_theta, r0)),
        }
    }
}

/// Delta BxDF: `incident = reflect(outgoing)`, `value = F(cos theta) *
/// reflectance / |cos theta|` (spec.md §4.6).
#[derive(Debug, Clone, Copy)]
pub struct SpecularReflection {
    pub reflectance: RGB128,
    pub fresnel: FresnelKind,
}

impl SpecularReflection {
    pub fn new(reflectance: RGB128, fresnel: FresnelKind) -> Self {
        Self { reflectance, fresnel }
    }
}

impl Bxdf for SpecularReflection {
    fn kind(&self) -> BxdfType {
        BxdfType::REFLECTION | BxdfType::SPECULAR
    }

    fn evaluate(&self, _outgoing: Vec3, _incident: Vec3) -> RGB128 {
        RGB128::BLACK // delta: zero measure except at the analytic direction
    }

    fn sample(&self, outgoing: Vec3, _sample: Sample2D) -> Option<BxdfSample> {
        let incident = reflect(outgoing);
        if incident.z.abs() <= 0.0 {
            return None;
        }
        let f = self.fresnel.evaluate(outgoing.z) * self.reflectance * (1.0 / incident.z.abs());
        Some(BxdfSample { incident, f, pdf: 1.0 })
    }

    fn probability_density(&self, _outgoing: Vec3, _incident: Vec3) -> f32 {
        0.0
    }
}

/// Delta BxDF: refracts through the interface via `refract(outgoing,
/// eta_above, eta_below)`; value = `(1-F)*transmittance*eta'^2/eta^2 *
/// 1/|cos theta|` (spec.md §4.6 — the "standard formulation", per
/// `SPEC_FULL.md` Open Question 1).
#[derive(Debug, Clone, Copy)]
pub struct SpecularTransmission {
    pub transmittance: RGB128,
    pub eta_above: f32,
    pub eta_below: f32,
}

impl SpecularTransmission {
    pub fn new(transmittance: RGB128, eta_above: f32, eta_below: f32) -> Self {
        Self {
            transmittance,
            eta_above,
            eta_below,
        }
    }
}

impl Bxdf for SpecularTransmission {
    fn kind(&self) -> BxdfType {
        BxdfType::TRANSMISSION | BxdfType::SPECULAR
    }

    fn evaluate(&self, _outgoing: Vec3, _incident: Vec3) -> RGB128 {
        RGB128::BLACK
    }

    fn sample(&self, outgoing: Vec3, _sample: Sample2D) -> Option<BxdfSample> {
        let entering = outgoing.z > 0.0;
        let (eta_i, eta_t) = if entering {
            (self.eta_above, self.eta_below)
        } else {
            (self.eta_below, self.eta_above)
        };
        let eta = eta_i / eta_t;

        let incident = fresnel::refract(outgoing, eta)?;
        if incident.z.abs() <= 0.0 {
            return None;
        }

        let fresnel_term = fresnel::dielectric(outgoing.z, eta_i, eta_t);
        let eta_prime_sq = eta * eta;
        let f = self.transmittance * (1.0 - fresnel_term) * eta_prime_sq * (1.0 / incident.z.abs());
        Some(BxdfSample { incident, f, pdf: 1.0 })
    }

    fn probability_density(&self, _outgoing: Vec3, _incident: Vec3) -> f32 {
        0.0
    }
}

//! BxDF trait and its bitmask type (spec.md §4.6).

use crate::math::{RGB128, Sample2D};
use bitflags::bitflags;
use glam::Vec3;

bitflags! {
    /// Bitmask over a BxDF's scattering behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BxdfType: u8 {
        const REFLECTION   = 0b0000_0001;
        const TRANSMISSION = 0b0000_0010;
        const DIFFUSE      = 0b0000_0100;
        const GLOSSY       = 0b0000_1000;
        const SPECULAR     = 0b0001_0000;
    }
}

/// A single sampled scattering event: the chosen direction, its value, and
/// its pdf (`pdf == 1.0` for delta BxDFs, by convention).
#[derive(Debug, Clone, Copy)]
pub struct BxdfSample {
    pub incident: Vec3,
    pub f: RGB128,
    pub pdf: f32,
}

/// One bidirectional scattering distribution component, evaluated in the
/// local shading frame (normal along `+Z`).
pub trait Bxdf: Send + Sync {
    fn kind(&self) -> BxdfType;

    /// `f(outgoing, incident)`.
    fn evaluate(&self, outgoing: Vec3, incident: Vec3) -> RGB128;

    /// Draw `incident` and return `(f, pdf)`. Non-delta BxDFs cosine-sample
    /// the hemisphere; delta BxDFs compute `incident` analytically with
    /// `pdf = 1.0`.
    fn sample(&self, outgoing: Vec3, sample: Sample2D) -> Option<BxdfSample>;

    /// `>= 0`; zero outside the supported hemisphere (unless the BxDF is
    /// transmissive).
    fn probability_density(&self, outgoing: Vec3, incident: Vec3) -> f32;

    fn matches(&self, mask: BxdfType) -> bool {
        self.kind().intersects(mask)
    }

    fn is_specular(&self) -> bool {
        self.kind().contains(BxdfType::SPECULAR)
    }
}

/// Cosine-weighted hemisphere sample via the Malley concentric-disk
/// mapping, flipped into whichever local hemisphere `outgoing` sits in.
pub fn cosine_sample_hemisphere(sample: Sample2D, same_side_as: Vec3) -> Vec3 {
    let (dx, dy) = concentric_disk(sample);
    let z = (1.0 - dx * dx - dy * dy).max(0.0).sqrt();
    let dir = Vec3::new(dx, dy, z);
    if same_side_as.z < 0.0 {
        Vec3::new(dir.x, dir.y, -dir.z)
    } else {
        dir
    }
}

fn concentric_disk(sample: Sample2D) -> (f32, f32) {
    let ox = 2.0 * sample.x - 1.0;
    let oy = 2.0 * sample.y - 1.0;
    if ox == 0.0 && oy == 0.0 {
        return (0.0, 0.0);
    }
    let (r, theta) = if ox.abs() > oy.abs() {
        (ox, std::f32::consts::FRAC_PI_4 * (oy / ox))
    } else {
        (oy, std::f32::consts::FRAC_PI_2 - std::f32::consts::FRAC_PI_4 * (ox / oy))
    };
    (r * theta.cos(), r * theta.sin())
}

//! Directional (environment) texture: a grid of radiance values sampled by
//! direction, with precomputed importance sampling over the full sphere
//! (spec.md §4.8).
//!
//! The grid uses the standard cylindrical (equirectangular) parameterization
//! `u in [0,1) -> longitude`, `v in [0,1) -> colatitude`; `sin(pi*v)` is the
//! Jacobian of that parameterization and weights every row before the 2D
//! discrete distribution is built, so rows near the poles (small Jacobian)
//! are sampled less often than their raw radiance alone would suggest.

use crate::math::{Probable, RGB128, Sample2D};
use crate::sampling::DiscreteDistribution2D;
use glam::Vec3;
use std::f32::consts::PI;

/// Result of importance-sampling a direction from a [`DirectionalTexture`].
/// `pdf == 0.0` (and `direction` undefined) below the texture's horizon band
/// where `sin(phi) <= 0`.
#[derive(Debug, Clone, Copy)]
pub struct DirectionSample {
    pub direction: Vec3,
    pub pdf: f32,
    pub radiance: RGB128,
}

/// A `width x height` grid of radiance values plus the discrete distribution
/// built over it for importance sampling (spec.md §4.8).
pub struct DirectionalTexture {
    width: usize,
    height: usize,
    radiance: Vec<RGB128>,
    distribution: DiscreteDistribution2D,
    average: RGB128,
}

impl DirectionalTexture {
    /// `radiance` is row-major, `width * height` long.
    pub fn new(width: usize, height: usize, radiance: Vec<RGB128>) -> Self {
        assert_eq!(radiance.len(), width * height, "radiance grid size must match width*height");
        let mut weights = Vec::with_capacity(width * height);
        let mut sum = RGB128::BLACK;
        for y in 0..height {
            let jacobian = (PI * (y as f32 + 0.5) / height as f32).sin();
            for x in 0..width {
                let l = radiance[y * width + x];
                weights.push(l.luminance() * jacobian);
                sum += l * jacobian;
            }
        }
        let distribution = DiscreteDistribution2D::new(&weights, width, height);
        let average = sum * (2.0 * PI * PI / (width * height) as f32);
        Self {
            width,
            height,
            radiance,
            distribution,
            average,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Weighted radiance integral over the grid, `Sum(L * sin(pi*v)) *
    /// 2*pi^2/(W*H)` (spec.md §4.8 `Average`).
    pub fn average(&self) -> RGB128 {
        self.average
    }

    fn texel(&self, u: f32, v: f32) -> RGB128 {
        let x = ((u.rem_euclid(1.0) * self.width as f32) as usize).min(self.width - 1);
        let y = ((v.clamp(0.0, 1.0) * self.height as f32) as usize).min(self.height - 1);
        self.radiance[y * self.width + x]
    }

    /// Draws a direction proportional to the texture's weighted radiance.
    /// `theta = 2*pi*u`, `phi = pi*v`, `direction = (-sin(phi)*sin(theta),
    /// -cos(phi), -sin(phi)*cos(theta))`; returns a degenerate sample
    /// (`pdf = 0`) when `sin(phi) <= 0`.
    pub fn sample(&self, sample: Sample2D) -> DirectionSample {
        let picked: Probable<Sample2D> = self.distribution.pick(sample);
        let (u, v) = (picked.value.x, picked.value.y);
        let theta = 2.0 * PI * u;
        let phi = PI * v;
        let sin_phi = phi.sin();
        if sin_phi <= 0.0 {
            return DirectionSample {
                direction: Vec3::ZERO,
                pdf: 0.0,
                radiance: RGB128::BLACK,
            };
        }
        let direction = Vec3::new(-sin_phi * theta.sin(), -phi.cos(), -sin_phi * theta.cos());
        let pdf = picked.pdf * (1.0 / (2.0 * PI * PI)) / sin_phi;
        DirectionSample {
            direction,
            pdf,
            radiance: self.texel(u, v),
        }
    }

    /// Inverts a known direction back into its `(radiance, pdf)` pair,
    /// applying the same Jacobian the forward mapping used (spec.md §4.8
    /// "Evaluation of a given direction inverts the mapping").
    pub fn evaluate(&self, direction: Vec3) -> (RGB128, f32) {
        let cos_phi = crate::math::clamp_unit(-direction.y);
        let phi = cos_phi.acos();
        let sin_phi = phi.sin();
        if sin_phi <= 1e-6 {
            return (RGB128::BLACK, 0.0);
        }
        let sin_theta = -direction.x / sin_phi;
        let cos_theta = -direction.z / sin_phi;
        let mut theta = sin_theta.atan2(cos_theta);
        if theta < 0.0 {
            theta += 2.0 * PI;
        }
        let u = theta / (2.0 * PI);
        let v = phi / PI;
        let pdf_uv = self.distribution.pdf_at(Sample2D::new(u, v));
        let pdf = pdf_uv * (1.0 / (2.0 * PI * PI)) / sin_phi;
        (self.texel(u, v), pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform(width: usize, height: usize, radiance: f32) -> DirectionalTexture {
        DirectionalTexture::new(width, height, vec![RGB128::splat(radiance); width * height])
    }

    fn delta_spot(width: usize, height: usize) -> DirectionalTexture {
        let mut grid = vec![RGB128::BLACK; width * height];
        let (x, y) = (width / 2, height / 2);
        grid[y * width + x] = RGB128::splat(1000.0);
        DirectionalTexture::new(width, height, grid)
    }

    #[test]
    fn sample_skips_below_horizon_band() {
        let texture = uniform(8, 8, 1.0);
        let below = texture.sample(Sample2D::new(0.5, 0.999));
        assert_eq!(below.pdf, 0.0);
    }

    #[test]
    fn bright_spot_is_sampled_with_far_above_uniform_pdf() {
        let texture = delta_spot(32, 16);
        let (x, y) = (16, 8);
        let u = (x as f32 + 0.5) / 32.0;
        let v = (y as f32 + 0.5) / 16.0;
        let sample = texture.sample(Sample2D::new(u, v));
        let uniform_pdf = 1.0 / (4.0 * PI);
        assert!(sample.pdf > uniform_pdf * 10.0, "expected the delta spot's pdf to dominate, got {}", sample.pdf);
    }

    #[test]
    fn evaluate_recovers_sampled_direction_pdf() {
        let texture = delta_spot(32, 16);
        let (x, y) = (16, 8);
        let u = (x as f32 + 0.5) / 32.0;
        let v = (y as f32 + 0.5) / 16.0;
        let sample = texture.sample(Sample2D::new(u, v));
        let (radiance, pdf) = texture.evaluate(sample.direction);
        assert_relative_eq!(pdf, sample.pdf, epsilon = 1e-3);
        assert!(radiance.luminance() > 0.0);
    }

    #[test]
    fn pdf_domain_area_integrates_close_to_one_over_the_sphere() {
        let texture = uniform(64, 32, 1.0);
        let n = 4096;
        let mut total = 0.0f64;
        let mut counted = 0u32;
        for i in 0..n {
            let u = (i as f32 + 0.5) / n as f32;
            let v = ((i * 31) % n) as f32 / n as f32;
            let sample = texture.sample(Sample2D::new(u, v));
            if sample.pdf > 0.0 {
                total += 1.0 / sample.pdf as f64;
                counted += 1;
            }
        }
        // Monte Carlo estimate of the sphere's solid angle (4*pi) via
        // importance sampling's E[1/pdf] identity, normalized to 1.
        let estimate = (total / counted as f64) / (4.0 * std::f64::consts::PI);
        assert_relative_eq!(estimate, 1.0, epsilon = 0.05);
    }

    #[test]
    fn average_of_a_uniform_texture_scales_with_radiance() {
        let low = uniform(16, 8, 1.0).average().r;
        let high = uniform(16, 8, 2.0).average().r;
        assert_relative_eq!(high, low * 2.0, epsilon = 1e-4);
    }
}

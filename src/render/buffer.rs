//! Online per-pixel estimator and the 2D render target it writes into
//! (spec.md §3 `Pixel`/`RenderBuffer`, §4.9 "Pixel Accumulator").

use crate::math::RGB128;
use glam::Vec3;

/// Online mean/variance accumulator for one pixel's radiance samples, plus
/// the auxiliary albedo/normal running sums (spec.md §3 `Pixel`). Lives on
/// the tile worker's stack for the duration of one `WorkPixel` call — it is
/// never shared across threads, unlike the device-wide atomic counters in
/// `src/render/device.rs`.
#[derive(Debug, Clone, Copy)]
pub struct PixelAccumulator {
    mean: [f64; 3],
    m2: [f64; 3],
    count: u64,
    rejected: u64,
    albedo_sum: [f64; 3],
    normal_sum: Vec3,
}

impl PixelAccumulator {
    pub fn new() -> Self {
        Self {
            mean: [0.0; 3],
            m2: [0.0; 3],
            count: 0,
            rejected: 0,
            albedo_sum: [0.0; 3],
            normal_sum: Vec3::ZERO,
        }
    }

    /// Folds one radiance sample in via Welford's algorithm. Non-finite
    /// samples are rejected (not merged) and counted separately, per spec.md
    /// §7 "Numerical" policy: "non-finite sample (silently rejected,
    /// counted in `rejectedSample`)". Returns whether the sample was
    /// accepted.
    pub fn accumulate(&mut self, radiance: RGB128, albedo: RGB128, normal: Vec3) -> bool {
        if !radiance.is_finite() {
            self.rejected += 1;
            return false;
        }
        self.count += 1;
        let n = self.count as f64;
        let x = [radiance.r as f64, radiance.g as f64, radiance.b as f64];
        for c in 0..3 {
            let delta = x[c] - self.mean[c];
            self.mean[c] += delta / n;
            let delta2 = x[c] - self.mean[c];
            self.m2[c] += delta * delta2;
        }
        self.albedo_sum[0] += albedo.r as f64;
        self.albedo_sum[1] += albedo.g as f64;
        self.albedo_sum[2] += albedo.b as f64;
        self.normal_sum += normal;
        true
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn mean(&self) -> RGB128 {
        RGB128::new(self.mean[0] as f32, self.mean[1] as f32, self.mean[2] as f32)
    }

    pub fn albedo_mean(&self) -> RGB128 {
        if self.count == 0 {
            return RGB128::BLACK;
        }
        let n = self.count as f64;
        RGB128::new(
            (self.albedo_sum[0] / n) as f32,
            (self.albedo_sum[1] / n) as f32,
            (self.albedo_sum[2] / n) as f32,
        )
    }

    /// Average of the accumulated shading normals, renormalized — the raw
    /// sum is only unit length when every sample agreed (spec.md §4.9
    /// "normal is normalized at the end").
    pub fn normal_mean(&self) -> Vec3 {
        if self.normal_sum.length_squared() > 0.0 {
            self.normal_sum.normalize()
        } else {
            Vec3::ZERO
        }
    }

    /// Normalized standard deviation used to drive the tile worker's
    /// adaptive pass: `sqrt(M2.avg/n) / max(mean.avg, 0.3)` (spec.md §4.9).
    pub fn deviation(&self) -> f32 {
        if self.count < 2 {
            return 1.0;
        }
        let n = self.count as f64;
        let variance_avg = (self.m2[0] + self.m2[1] + self.m2[2]) / (3.0 * n);
        let mean_avg = (self.mean[0] + self.mean[1] + self.mean[2]) / 3.0;
        (variance_avg.sqrt() / mean_avg.max(0.3)) as f32
    }

    /// Population variance per channel (`M2/n`), the quantity spec.md §8's
    /// Welford testable property checks against a two-pass reference.
    pub fn variance(&self) -> RGB128 {
        if self.count == 0 {
            return RGB128::BLACK;
        }
        let n = self.count as f64;
        RGB128::new((self.m2[0] / n) as f32, (self.m2[1] / n) as f32, (self.m2[2] / n) as f32)
    }
}

impl Default for PixelAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer pixel coordinate, `(0, 0)` at the bottom-left after serialization
/// flip (spec.md §6 "Render buffer").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Int2 {
    pub x: i32,
    pub y: i32,
}

impl Int2 {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The canonical render output: a bounds-checked `(x, y) -> RGB128` color
/// grid plus parallel albedo/normal auxiliary layers (spec.md §3
/// `RenderBuffer`, §6 "Render buffer is the canonical output").
pub struct RenderBuffer {
    width: i32,
    height: i32,
    color: Vec<RGB128>,
    albedo: Vec<RGB128>,
    normal: Vec<Vec3>,
}

impl RenderBuffer {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "render buffer dimensions must be positive");
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            color: vec![RGB128::BLACK; len],
            albedo: vec![RGB128::BLACK; len],
            normal: vec![Vec3::ZERO; len],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn size(&self) -> Int2 {
        Int2::new(self.width, self.height)
    }

    pub fn contains(&self, position: Int2) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.width && position.y < self.height
    }

    #[inline]
    fn index(&self, position: Int2) -> usize {
        (position.y as usize) * (self.width as usize) + position.x as usize
    }

    pub fn color(&self, position: Int2) -> RGB128 {
        self.color[self.index(position)]
    }

    /// Writes one pixel's color/albedo/normal. Tiles never overlap, so
    /// concurrent writes to disjoint positions need no locking (spec.md §5
    /// "Render buffer writes are per-position").
    pub fn set_pixel(&mut self, position: Int2, color: RGB128, albedo: RGB128, normal: Vec3) {
        assert!(self.contains(position), "pixel write out of bounds: {position:?}");
        let i = self.index(position);
        self.color[i] = color;
        self.albedo[i] = albedo;
        self.normal[i] = normal;
    }

    pub fn albedo(&self, position: Int2) -> RGB128 {
        self.albedo[self.index(position)]
    }

    pub fn normal(&self, position: Int2) -> Vec3 {
        self.normal[self.index(position)]
    }

    pub fn color_slice(&self) -> &[RGB128] {
        &self.color
    }

    pub fn albedo_slice(&self) -> &[RGB128] {
        &self.albedo
    }

    pub fn normal_slice(&self) -> &[Vec3] {
        &self.normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn welford_matches_two_pass_mean_and_variance() {
        let samples = [0.2f32, 0.5, 0.1, 0.9, 0.4, 0.3, 0.6];
        let mut acc = PixelAccumulator::new();
        for &s in &samples {
            acc.accumulate(RGB128::splat(s), RGB128::BLACK, Vec3::ZERO);
        }

        let n = samples.len() as f64;
        let naive_mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let naive_var = samples.iter().map(|&s| (s as f64 - naive_mean).powi(2)).sum::<f64>() / n;

        assert_relative_eq!(acc.mean().r as f64, naive_mean, epsilon = 1e-9);
        assert_relative_eq!(acc.variance().r as f64, naive_var, epsilon = 1e-9);
    }

    #[test]
    fn non_finite_samples_are_rejected_and_counted() {
        let mut acc = PixelAccumulator::new();
        acc.accumulate(RGB128::splat(0.5), RGB128::BLACK, Vec3::ZERO);
        let accepted = acc.accumulate(RGB128::new(f32::NAN, 0.0, 0.0), RGB128::BLACK, Vec3::ZERO);
        assert!(!accepted);
        assert_eq!(acc.count(), 1);
        assert_eq!(acc.rejected(), 1);
    }

    #[test]
    fn normal_mean_is_renormalized() {
        let mut acc = PixelAccumulator::new();
        acc.accumulate(RGB128::BLACK, RGB128::BLACK, Vec3::new(2.0, 0.0, 0.0));
        acc.accumulate(RGB128::BLACK, RGB128::BLACK, Vec3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(acc.normal_mean().length(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn render_buffer_roundtrips_a_pixel_write() {
        let mut buffer = RenderBuffer::new(4, 4);
        let pos = Int2::new(2, 1);
        buffer.set_pixel(pos, RGB128::splat(0.5), RGB128::splat(0.1), Vec3::Y);
        assert_eq!(buffer.color(pos), RGB128::splat(0.5));
        assert_eq!(buffer.albedo(pos), RGB128::splat(0.1));
        assert_eq!(buffer.normal(pos), Vec3::Y);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn render_buffer_rejects_out_of_bounds_write() {
        let mut buffer = RenderBuffer::new(2, 2);
        buffer.set_pixel(Int2::new(2, 0), RGB128::BLACK, RGB128::BLACK, Vec3::ZERO);
    }
}

//! Per-pixel continuous sample stream: stratified single samples plus a
//! Latin-hypercube "array" block per pixel sample, with a uniform-PRNG
//! fallback once either is exhausted (spec.md §4.5).

use crate::math::{Sample1D, Sample2D};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Per-worker sample source. One instance lives on each tile worker thread;
/// [`ContinuousDistribution::replicate`] clones the configuration (not the
/// RNG state) for a freshly spawned worker, matching spec.md's "seeded
/// independently" requirement.
#[derive(Clone)]
pub struct ContinuousDistribution {
    rng: ChaCha8Rng,
    epoch: u64,
    pixel_sample_count: usize,
    array_capacity: usize,
    jitter: bool,

    single_1d: Vec<f32>,
    single_2d: Vec<Sample2D>,
    array_1d: Vec<Vec<f32>>,
    array_2d: Vec<Vec<Sample2D>>,

    sample_index: usize,
    cursor_1d: usize,
    cursor_2d: usize,
}

impl ContinuousDistribution {
    pub fn new(pixel_sample_count: usize, array_capacity: usize, jitter: bool, epoch: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(epoch),
            epoch,
            pixel_sample_count,
            array_capacity,
            jitter,
            single_1d: Vec::new(),
            single_2d: Vec::new(),
            array_1d: Vec::new(),
            array_2d: Vec::new(),
            sample_index: 0,
            cursor_1d: 0,
            cursor_2d: 0,
        }
    }

    /// Re-seed from `(position, epoch)` and regenerate the precomputed
    /// single-sample and per-sample array tables for this pixel.
    pub fn begin_pixel(&mut self, position: (i32, i32)) {
        let seed = hash_position(position, self.epoch);
        self.rng = ChaCha8Rng::seed_from_u64(seed);

        self.single_1d = stratified_1d(self.pixel_sample_count, self.jitter, &mut self.rng);
        self.single_2d = stratified_2d(self.pixel_sample_count, self.jitter, &mut self.rng);

        self.array_1d = (0..self.pixel_sample_count)
            .map(|_| stratified_1d(self.array_capacity, self.jitter, &mut self.rng))
            .collect();
        self.array_2d = (0..self.pixel_sample_count)
            .map(|_| latin_hypercube_2d(self.array_capacity, self.jitter, &mut self.rng))
            .collect();
    }

    /// Reset cursors for pixel sample index `i`.
    pub fn begin_sample(&mut self, i: usize) {
        self.sample_index = i;
        self.cursor_1d = 0;
        self.cursor_2d = 0;
    }

    pub fn next_1d(&mut self) -> Sample1D {
        let call = self.cursor_1d;
        self.cursor_1d += 1;

        if call == 0 {
            if let Some(&v) = self.single_1d.get(self.sample_index) {
                return Sample1D(v);
            }
        } else if let Some(values) = self.array_1d.get(self.sample_index) {
            if let Some(&v) = values.get(call - 1) {
                return Sample1D(v);
            }
        }
        Sample1D(self.rng.random::<f32>())
    }

    pub fn next_2d(&mut self) -> Sample2D {
        let call = self.cursor_2d;
        self.cursor_2d += 1;

        if call == 0 {
            if let Some(&v) = self.single_2d.get(self.sample_index) {
                return v;
            }
        } else if let Some(values) = self.array_2d.get(self.sample_index) {
            if let Some(&v) = values.get(call - 1) {
                return v;
            }
        }
        Sample2D::new(self.rng.random::<f32>(), self.rng.random::<f32>())
    }

    /// Clone the configuration for a new worker thread, reseeded
    /// independently so no two workers ever share PRNG state.
    pub fn replicate(&self, worker_seed: u64) -> ContinuousDistribution {
        ContinuousDistribution::new(
            self.pixel_sample_count,
            self.array_capacity,
            self.jitter,
            self.epoch ^ worker_seed.wrapping_mul(0x9E3779B97F4A7C15),
        )
    }
}

fn hash_position(position: (i32, i32), epoch: u64) -> u64 {
    let mut h = epoch ^ 0x9E3779B97F4A7C15;
    h ^= (position.0 as u32 as u64).wrapping_mul(0xC2B2AE3D27D4EB4F);
    h ^= (position.1 as u32 as u64).wrapping_mul(0x165667B19E3779F9);
    h = h.wrapping_mul(0xFF51AFD7ED558CCD);
    h ^ (h >> 33)
}

fn stratified_1d(n: usize, jitter: bool, rng: &mut ChaCha8Rng) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    let mut values: Vec<f32> = (0..n)
        .map(|i| {
            let j = if jitter { rng.random::<f32>() } else { 0.5 };
            (i as f32 + j) / n as f32
        })
        .collect();
    values.shuffle(rng);
    values
}

fn stratified_2d(n: usize, jitter: bool, rng: &mut ChaCha8Rng) -> Vec<Sample2D> {
    if n == 0 {
        return Vec::new();
    }
    let size_x = (n as f32).sqrt().ceil() as usize;
    let size_y = n.div_ceil(size_x.max(1));
    let mut cells = Vec::with_capacity(size_x * size_y);
    for y in 0..size_y {
        for x in 0..size_x {
            let jx = if jitter { rng.random::<f32>() } else { 0.5 };
            let jy = if jitter { rng.random::<f32>() } else { 0.5 };
            cells.push(Sample2D::new(
                (x as f32 + jx) / size_x as f32,
                (y as f32 + jy) / size_y as f32,
            ));
        }
    }
    cells.shuffle(rng);
    cells.truncate(n);
    cells
}

/// Latin hypercube sampling: shuffle `[0,n)` independently on each axis,
/// pair index-wise, offset by jitter (spec.md §4.5). Guarantees exactly one
/// sample per row and per column.
fn latin_hypercube_2d(n: usize, jitter: bool, rng: &mut ChaCha8Rng) -> Vec<Sample2D> {
    if n == 0 {
        return Vec::new();
    }
    let mut xs: Vec<usize> = (0..n).collect();
    let mut ys: Vec<usize> = (0..n).collect();
    xs.shuffle(rng);
    ys.shuffle(rng);

    (0..n)
        .map(|i| {
            let jx = if jitter { rng.random::<f32>() } else { 0.5 };
            let jy = if jitter { rng.random::<f32>() } else { 0.5 };
            Sample2D::new((xs[i] as f32 + jx) / n as f32, (ys[i] as f32 + jy) / n as f32)
        })
        .collect()
}

/// `square(theta) = 1 / (|cos(theta+pi/4)| + |sin(theta+pi/4)|)`, the
/// inverse-square-to-disk Jacobian correction used by the golden-ratio
/// spiral (spec.md §4.5).
fn square_correction(theta: f32) -> f32 {
    let shifted = theta + std::f32::consts::FRAC_PI_4;
    1.0 / (shifted.cos().abs() + shifted.sin().abs())
}

const GOLDEN_RATIO: f32 = 1.618_034;

/// Precomputed per-pixel sub-pixel offsets used by the tile worker for its
/// deterministic base sample pass (spec.md §4.5). Each point is offset so
/// `(0, 0)` sits at the pixel center's lower-left.
pub fn golden_ratio_spiral(m: usize) -> Vec<Sample2D> {
    (0..m)
        .map(|i| {
            let theta = 2.0 * std::f32::consts::PI * GOLDEN_RATIO * i as f32;
            let r = ((i as f32 + 0.5) / m as f32).sqrt() * std::f32::consts::SQRT_2
                * square_correction(theta)
                / 2.0;
            Sample2D::new(r * theta.cos() + 0.5, r * theta.sin() + 0.5)
        })
        .collect()
}

//! Weighted discrete 1D/2D distributions built from a piecewise-constant
//! function (spec.md §3 `PowerDistribution`, §4.8 directional textures).

use crate::math::{Probable, Sample2D};

/// A piecewise-constant function over `[0, n)` sampled by inverting its
/// CDF. Supports both a discrete index pick (area-light / power sampling)
/// and a continuous remap within the picked bucket (directional textures).
#[derive(Debug, Clone)]
pub struct DiscreteDistribution1D {
    func: Vec<f32>,
    cdf: Vec<f32>,
    func_integral: f32,
}

impl DiscreteDistribution1D {
    pub fn new(weights: &[f32]) -> Self {
        let n = weights.len();
        let mut cdf = vec![0.0f32; n + 1];
        for i in 0..n {
            cdf[i + 1] = cdf[i] + weights[i] / n.max(1) as f32;
        }
        let func_integral = cdf[n];
        if func_integral > 0.0 {
            for v in cdf.iter_mut() {
                *v /= func_integral;
            }
        } else {
            for (i, v) in cdf.iter_mut().enumerate() {
                *v = i as f32 / n.max(1) as f32;
            }
        }
        Self {
            func: weights.to_vec(),
            cdf,
            func_integral,
        }
    }

    pub fn len(&self) -> usize {
        self.func.len()
    }

    pub fn is_empty(&self) -> bool {
        self.func.is_empty()
    }

    pub fn integral(&self) -> f32 {
        self.func_integral
    }

    fn find_interval(&self, u: f32) -> usize {
        match self.cdf.binary_search_by(|v| v.partial_cmp(&u).unwrap()) {
            Ok(i) => i.min(self.func.len().saturating_sub(1)),
            Err(i) => i.saturating_sub(1).min(self.func.len().saturating_sub(1)),
        }
    }

    /// Pick a discrete index in `[0, len)`. `pdf == 0` only when every
    /// weight is zero.
    pub fn pick(&self, u: f32) -> Probable<usize> {
        if self.func.is_empty() {
            return Probable::new(0, 0.0);
        }
        let index = self.find_interval(u);
        let pdf = if self.func_integral > 0.0 {
            self.func[index] / self.func_integral
        } else {
            0.0
        };
        Probable::new(index, pdf)
    }

    /// Pick a continuous position in `[0, 1)`, remapped within the picked
    /// bucket, with the corresponding continuous-domain pdf.
    pub fn pick_continuous(&self, u: f32) -> Probable<f32> {
        if self.func.is_empty() {
            return Probable::new(0.0, 0.0);
        }
        let index = self.find_interval(u);
        let n = self.func.len() as f32;
        let (lo, hi) = (self.cdf[index], self.cdf[index + 1]);
        let du = if hi > lo { (u - lo) / (hi - lo) } else { 0.0 };
        let position = (index as f32 + du) / n;
        let pdf = if self.func_integral > 0.0 {
            self.func[index] / self.func_integral * n
        } else {
            0.0
        };
        Probable::new(position, pdf)
    }

    /// Continuous-domain pdf at a given position, for inverting a known
    /// direction back into a density (spec.md §4.8 evaluation).
    pub fn pdf_at(&self, position: f32) -> f32 {
        if self.func.is_empty() || self.func_integral <= 0.0 {
            return 0.0;
        }
        let index = ((position * self.func.len() as f32) as usize).min(self.func.len() - 1);
        self.func[index] / self.func_integral
    }
}

/// A 2D discrete distribution: one conditional [`DiscreteDistribution1D`]
/// per row plus a marginal over rows, exactly as spec.md §4.8 describes for
/// environment-texture importance sampling.
#[derive(Debug, Clone)]
pub struct DiscreteDistribution2D {
    conditional: Vec<DiscreteDistribution1D>,
    marginal: DiscreteDistribution1D,
    width: usize,
    height: usize,
}

impl DiscreteDistribution2D {
    /// `weights` is row-major, `width * height` long.
    pub fn new(weights: &[f32], width: usize, height: usize) -> Self {
        debug_assert_eq!(weights.len(), width * height);
        let conditional: Vec<DiscreteDistribution1D> = (0..height)
            .map(|y| DiscreteDistribution1D::new(&weights[y * width..(y + 1) * width]))
            .collect();
        let row_integrals: Vec<f32> = conditional.iter().map(|d| d.integral()).collect();
        let marginal = DiscreteDistribution1D::new(&row_integrals);
        Self {
            conditional,
            marginal,
            width,
            height,
        }
    }

    pub fn pick(&self, sample: Sample2D) -> Probable<Sample2D> {
        let row = self.marginal.pick_continuous(sample.y);
        let row_index = ((row.value * self.height as f32) as usize).min(self.height - 1);
        let col = self.conditional[row_index].pick_continuous(sample.x);
        Probable::new(Sample2D::new(col.value, row.value), row.pdf * col.pdf)
    }

    /// Invert a known `(u, v)` back into its joint pdf (spec.md §4.8
    /// evaluation of a given direction).
    pub fn pdf_at(&self, uv: Sample2D) -> f32 {
        let row_index = ((uv.y * self.height as f32) as usize).min(self.height - 1);
        let row_pdf = self.marginal.pdf_at(uv.y);
        let col_pdf = self.conditional[row_index].pdf_at(uv.x);
        row_pdf * col_pdf
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

//! A heterogeneous set of BxDF components, allocated from the per-sample
//! arena and combined into a single scattering function (spec.md §4.6
//! "Touch.bsdf").

use super::bxdf::{Bxdf, BxdfSample, BxdfType};
use crate::arena::Allocator;
use crate::math::{RGB128, Sample2D};
use glam::Vec3;

/// Accumulates arena-allocated BxDF components, then freezes them into a
/// [`BsdfSet`] slice (also arena-backed — `&dyn Bxdf` is `Copy`, so the
/// slice itself can live in the same bump allocation as the components).
pub struct BsdfSetBuilder<'a> {
    arena: &'a Allocator,
    components: Vec<&'a dyn Bxdf>,
}

impl<'a> BsdfSetBuilder<'a> {
    pub fn new(arena: &'a Allocator) -> Self {
        Self {
            arena,
            components: Vec::new(),
        }
    }

    pub fn push<B: Bxdf + 'a>(&mut self, bxdf: B) -> &mut Self {
        let reference: &'a dyn Bxdf = self.arena.alloc(bxdf);
        self.components.push(reference);
        self
    }

    pub fn finish(self) -> BsdfSet<'a> {
        BsdfSet {
            components: self.arena.alloc_slice_copy(&self.components),
        }
    }
}

#[derive(Clone, Copy)]
pub struct BsdfSet<'a> {
    components: &'a [&'a dyn Bxdf],
}

impl<'a> BsdfSet<'a> {
    pub fn empty() -> BsdfSet<'a> {
        BsdfSet { components: &[] }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn kind(&self) -> BxdfType {
        self.components.iter().fold(BxdfType::empty(), |acc, c| acc | c.kind())
    }

    /// Sum `f(outgoing, incident)` over every non-delta component (delta
    /// BxDFs have zero measure away from their analytic direction).
    pub fn evaluate(&self, outgoing: Vec3, incident: Vec3) -> RGB128 {
        let mut total = RGB128::BLACK;
        for c in self.components {
            if !c.is_specular() {
                total += c.evaluate(outgoing, incident);
            }
        }
        total
    }

    /// Pick one component uniformly, sample its direction, then combine `f`
    /// and `pdf` across every non-delta component that also responds to the
    /// chosen direction (a one-sample MIS estimator over the lobe set).
    /// Delta components return their own analytic `(f, pdf = 1)` untouched.
    pub fn sample(&self, outgoing: Vec3, sample: Sample2D) -> Option<BxdfSample> {
        if self.components.is_empty() {
            return None;
        }
        let count = self.components.len();
        let scaled = (sample.x * count as f32).min(count as f32 - f32::EPSILON);
        let chosen_index = scaled as usize;
        let remapped = Sample2D::new(scaled - chosen_index as f32, sample.y);

        let chosen = self.components[chosen_index];
        let mut result = chosen.sample(outgoing, remapped)?;

        if !chosen.is_specular() {
            let mut f = RGB128::BLACK;
            let mut pdf = 0.0f32;
            let mut non_specular = 0usize;
            for c in self.components {
                if c.is_specular() {
                    continue;
                }
                non_specular += 1;
                f += c.evaluate(outgoing, result.incident);
                pdf += c.probability_density(outgoing, result.incident);
            }
            if non_specular > 0 {
                result.f = f;
                result.pdf = pdf / non_specular as f32;
            }
        }

        if result.pdf <= 0.0 {
            return None;
        }
        Some(result)
    }

    pub fn probability_density(&self, outgoing: Vec3, incident: Vec3) -> f32 {
        let mut pdf = 0.0f32;
        let mut non_specular = 0usize;
        for c in self.components {
            if c.is_specular() {
                continue;
            }
            non_specular += 1;
            pdf += c.probability_density(outgoing, incident);
        }
        if non_specular == 0 {
            0.0
        } else {
            pdf / non_specular as f32
        }
    }
}

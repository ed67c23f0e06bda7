//! Accelerator auto-selection policy (spec.md §4.3).

use super::{Aggregator, Bvh, LinearAggregator, Qbvh};
use crate::math::AABB;
use crate::token::EntityToken;

/// Explicit aggregator choice, or `None` for auto-selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceleratorType {
    #[default]
    Auto,
    Linear,
    Bvh,
    Qbvh,
}

/// Thresholds and policy knobs the evaluator profile exposes for picking an
/// aggregator variant (spec.md §6 "AcceleratorType", §4.3 "Auto-selection
/// policy").
#[derive(Debug, Clone, Copy)]
pub struct AcceleratorProfile {
    pub accelerator_type: AcceleratorType,
    pub linear_for_instances: bool,
}

impl Default for AcceleratorProfile {
    fn default() -> Self {
        Self {
            accelerator_type: AcceleratorType::Auto,
            linear_for_instances: true,
        }
    }
}

const BVH_THRESHOLD: usize = 32;
const QBVH_THRESHOLD: usize = 512;

impl AcceleratorProfile {
    /// Picks a variant for `primitive_count` primitives, `has_instances`
    /// tokens among them, per spec.md §4.3:
    /// - explicit type requested → use it
    /// - else `total >= 512` → QBVH; `total >= 32` → BVH; otherwise Linear,
    ///   unless the pack has instances and linear-for-instances is disabled,
    ///   in which case BVH.
    pub fn select(&self, primitive_count: usize, has_instances: bool) -> AcceleratorType {
        if self.accelerator_type != AcceleratorType::Auto {
            return self.accelerator_type;
        }
        if primitive_count >= QBVH_THRESHOLD {
            AcceleratorType::Qbvh
        } else if primitive_count >= BVH_THRESHOLD {
            AcceleratorType::Bvh
        } else if has_instances && !self.linear_for_instances {
            AcceleratorType::Bvh
        } else {
            AcceleratorType::Linear
        }
    }

    pub fn build(&self, entries: &[(EntityToken, AABB)], has_instances: bool) -> Box<dyn Aggregator> {
        match self.select(entries.len(), has_instances) {
            AcceleratorType::Linear | AcceleratorType::Auto => Box::new(LinearAggregator::build(entries)),
            AcceleratorType::Bvh => Box::new(Bvh::build(entries)),
            AcceleratorType::Qbvh => Box::new(Qbvh::build(entries)),
        }
    }
}

//! Sampling layer: per-pixel continuous sample streams (spec.md §4.5) and
//! discrete 1D/2D distributions used by area lights and directional
//! textures (spec.md §4.2, §4.8).

pub mod continuous;
pub mod discrete;

pub use continuous::ContinuousDistribution;
pub use discrete::{DiscreteDistribution1D, DiscreteDistribution2D};

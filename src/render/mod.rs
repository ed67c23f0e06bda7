//! Tile-based rendering: the pixel accumulator, the render buffer it writes
//! into, the per-tile worker thread, and the device that owns a pool of them
//! (spec.md §4.9 "Pixel Accumulator & Tile Worker", §5 "Concurrency &
//! Resource Model", §6 "Evaluator profile").

pub mod buffer;
pub mod device;
pub mod tile;

pub use buffer::{Int2, PixelAccumulator, RenderBuffer};
pub use device::Device;
pub use tile::{TileState, TileWorker};

use crate::aggregator::AcceleratorType;
use crate::error::{ConfigurationError, Result};

/// Recognized profile fields from spec.md §6 "Evaluator profile", validated
/// once up front so every downstream component (tile worker, evaluator) can
/// treat them as already-sound plain data — the same "validate at
/// construction" shape `SPEC_FULL.md` §1 calls for.
#[derive(Debug, Clone, Copy)]
pub struct RenderProfile {
    /// Pixel edge length of a tile; a power of two is recommended but not
    /// required.
    pub tile_size: i32,
    /// Deterministic base samples per pixel.
    pub pixel_sample: i32,
    /// Maximum extra samples per pixel, scaled by normalized deviation.
    pub adaptive_sample: i32,
    /// Hard depth cap passed to the path tracer.
    pub bounce_limit: i32,
    /// Explicit aggregator override, or `Auto`.
    pub accelerator_type: AcceleratorType,
    /// Whether the linear aggregator is permitted when instances are
    /// present.
    pub linear_for_instances: bool,
    /// Whether the continuous distribution jitters its strata (disable for
    /// golden/deterministic tests, spec.md §4.5).
    pub jitter: bool,
}

impl Default for RenderProfile {
    fn default() -> Self {
        Self {
            tile_size: 32,
            pixel_sample: 16,
            adaptive_sample: 0,
            bounce_limit: 128,
            accelerator_type: AcceleratorType::Auto,
            linear_for_instances: true,
            jitter: true,
        }
    }
}

impl RenderProfile {
    /// Rejects a non-positive tile size, pixel sample count, or bounce
    /// limit, and a negative adaptive sample count (spec.md §7
    /// `ConfigurationError`). Called once before any tile is dispatched, per
    /// spec.md §7's "Policy".
    pub fn validate(&self) -> Result<()> {
        if self.tile_size <= 0 {
            return Err(ConfigurationError::NonPositiveTileSize(self.tile_size).into());
        }
        if self.pixel_sample <= 0 {
            return Err(ConfigurationError::NonPositivePixelSample(self.pixel_sample).into());
        }
        if self.bounce_limit <= 0 {
            return Err(ConfigurationError::NonPositiveBounceLimit(self.bounce_limit).into());
        }
        if self.adaptive_sample < 0 {
            return Err(ConfigurationError::NegativeAdaptiveSample(self.adaptive_sample).into());
        }
        Ok(())
    }

    pub fn accelerator_profile(&self) -> crate::aggregator::AcceleratorProfile {
        crate::aggregator::AcceleratorProfile {
            accelerator_type: self.accelerator_type,
            linear_for_instances: self.linear_for_instances,
        }
    }
}

//! Error taxonomy (spec.md §7).
//!
//! One variant family per failure mode the spec names: configuration,
//! preparation, and invalid-state transitions are fatal and surfaced to the
//! caller before any tile is dispatched; numerical anomalies and
//! cancellation are handled locally by their own call sites and never
//! constructed here (spec.md §7's "Policy").

use thiserror::Error;

/// Crate-wide `Result` alias, the way `astraweave-blend` aliases `BlendResult`.
pub type Result<T> = std::result::Result<T, EchoError>;

/// Top-level error taxonomy. Configuration and preparation failures are
/// fatal; `InvalidState` covers worker/device lifecycle misuse.
#[derive(Error, Debug)]
pub enum EchoError {
    /// Invalid [`crate::aggregator::AcceleratorProfile`] or
    /// render/tile profile (spec.md §6 "Evaluator profile").
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Scene-preparation failure (spec.md §4.1).
    #[error("preparation error: {0}")]
    Preparation(#[from] PreparationError),

    /// A tile worker or device operation was invoked in a disallowed state
    /// (spec.md §5 "Operation state transitions").
    #[error("invalid state: {0}")]
    InvalidState(#[from] InvalidStateError),
}

/// Invalid profile fields (spec.md §7 `ConfigurationError`).
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("tile size must be positive, got {0}")]
    NonPositiveTileSize(i32),

    #[error("pixel sample count must be positive, got {0}")]
    NonPositivePixelSample(i32),

    #[error("bounce limit must be positive, got {0}")]
    NonPositiveBounceLimit(i32),

    #[error("adaptive sample count must not be negative, got {0}")]
    NegativeAdaptiveSample(i32),
}

/// Scene-preparation failures (spec.md §4.1, §7 `PreparationError`).
#[derive(Error, Debug)]
pub enum PreparationError {
    #[error("instance transform has non-uniform scale: row magnitudes {0:?}")]
    NonUniformScale([f32; 3]),

    #[error("material index {index} out of range (swatch has {len} entries)")]
    MaterialIndexOutOfRange { index: u32, len: usize },

    #[error("triangle {0} has zero area but references an emissive material")]
    ZeroAreaEmissiveTriangle(usize),

    #[error("cycle detected in instance graph: pack {0} references itself")]
    InstanceCycle(usize),
}

/// Lifecycle misuse (spec.md §7 `InvalidState`).
#[derive(Error, Debug)]
pub enum InvalidStateError {
    #[error("tile worker dispatched while already working")]
    AlreadyWorking,

    #[error("tile worker reset while working")]
    ResetWhileWorking,

    #[error("tile worker accessed after abort")]
    AccessedAfterAbort,

    #[error("device operation invoked while not idle")]
    DeviceNotIdle,
}

/// Distinguished cancellation outcome, surfaced out of the nearest
/// cooperative check (spec.md §5 "Cancellation", §7). Not part of
/// [`EchoError`]: it unwinds the tile worker's current pixel and is cleared
/// by the device rather than bubbling to the caller as a configuration or
/// preparation fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation canceled")
    }
}

impl std::error::Error for Cancelled {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_converts_into_echo_error() {
        let err: EchoError = ConfigurationError::NonPositiveTileSize(0).into();
        assert!(matches!(err, EchoError::Configuration(_)));
        assert!(err.to_string().contains("tile size"));
    }

    #[test]
    fn cancelled_displays_operation_canceled() {
        assert_eq!(Cancelled.to_string(), "operation canceled");
    }
}

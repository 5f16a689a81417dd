//! Error taxonomy for range evaluation.

use crate::enums::{DecisionAction, LifecycleStage};
use thiserror::Error;

/// Errors raised while evaluating or repositioning a single position.
///
/// Configuration-level errors (`InvalidPrice`, `UnsupportedFeeTier`,
/// `InvalidRange`) are permanent until the pool configuration changes.
/// `BiasUnavailable` and `VenueExecutionFailed` are transient and are
/// retried on the next throttle window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RebalanceError {
    /// Price was zero, negative, not finite, or maps outside the tick domain.
    #[error("invalid price: {0}")]
    InvalidPrice(f64),

    /// Fee tier has no known tick spacing.
    #[error("unsupported fee tier: {0}%")]
    UnsupportedFeeTier(f64),

    /// Range bounds could not be computed.
    #[error("invalid range: lower={lower}, upper={upper}")]
    InvalidRange {
        /// Computed lower bound (price or tick).
        lower: f64,
        /// Computed upper bound (price or tick).
        upper: f64,
    },

    /// The bias oracle failed, timed out, or returned an unusable answer.
    #[error("bias oracle unavailable: {0}")]
    BiasUnavailable(String),

    /// The liquidity venue rejected or failed the reposition.
    #[error("venue execution failed: {0}")]
    VenueExecutionFailed(String),

    /// The position has been exited and is no longer evaluated.
    #[error("position has been exited")]
    PositionExited,

    /// The lifecycle does not allow this action from the current stage.
    #[error("cannot apply {action:?} from stage {from:?}")]
    InvalidTransition {
        /// Stage the position was in.
        from: LifecycleStage,
        /// Action that was attempted.
        action: DecisionAction,
    },
}

impl RebalanceError {
    /// Returns true when the error is expected to clear on its own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::BiasUnavailable(_) | Self::VenueExecutionFailed(_)
        )
    }

    /// Short machine-readable label, used in failure records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPrice(_) => "InvalidPrice",
            Self::UnsupportedFeeTier(_) => "UnsupportedFeeTier",
            Self::InvalidRange { .. } => "InvalidRange",
            Self::BiasUnavailable(_) => "BiasUnavailable",
            Self::VenueExecutionFailed(_) => "VenueExecutionFailed",
            Self::PositionExited => "PositionExited",
            Self::InvalidTransition { .. } => "InvalidTransition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RebalanceError::BiasUnavailable("timeout".into()).is_transient());
        assert!(RebalanceError::VenueExecutionFailed("reverted".into()).is_transient());
        assert!(!RebalanceError::InvalidPrice(0.0).is_transient());
        assert!(!RebalanceError::UnsupportedFeeTier(0.2).is_transient());
        assert!(
            !RebalanceError::InvalidRange {
                lower: -1.0,
                upper: 2.0
            }
            .is_transient()
        );
    }

    #[test]
    fn test_error_display() {
        let err = RebalanceError::UnsupportedFeeTier(0.2);
        assert_eq!(err.to_string(), "unsupported fee tier: 0.2%");
        assert_eq!(err.kind(), "UnsupportedFeeTier");
    }
}

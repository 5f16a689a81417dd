use crate::error::RebalanceError;
use serde::{Deserialize, Serialize};

/// Pool fee tiers and their fixed tick spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeTier {
    /// 0.01%, spacing 1.
    Bps1,
    /// 0.05%, spacing 10.
    Bps5,
    /// 0.3%, spacing 60.
    Bps30,
    /// 1%, spacing 200.
    Bps100,
}

impl FeeTier {
    const EPSILON: f64 = 1e-9;

    /// Resolves a fee tier from its percentage (0.3 for 0.3%).
    ///
    /// # Errors
    /// Returns `UnsupportedFeeTier` for any other value.
    pub fn from_percent(percent: f64) -> Result<Self, RebalanceError> {
        [Self::Bps1, Self::Bps5, Self::Bps30, Self::Bps100]
            .into_iter()
            .find(|tier| (tier.percent() - percent).abs() < Self::EPSILON)
            .ok_or(RebalanceError::UnsupportedFeeTier(percent))
    }

    /// Fee as a percentage.
    #[must_use]
    pub fn percent(&self) -> f64 {
        match self {
            Self::Bps1 => 0.01,
            Self::Bps5 => 0.05,
            Self::Bps30 => 0.3,
            Self::Bps100 => 1.0,
        }
    }

    /// Fee in basis points.
    #[must_use]
    pub fn bps(&self) -> u32 {
        match self {
            Self::Bps1 => 1,
            Self::Bps5 => 5,
            Self::Bps30 => 30,
            Self::Bps100 => 100,
        }
    }

    /// Minimum distance between usable ticks.
    #[must_use]
    pub fn tick_spacing(&self) -> i32 {
        match self {
            Self::Bps1 => 1,
            Self::Bps5 => 10,
            Self::Bps30 => 60,
            Self::Bps100 => 200,
        }
    }
}

/// Tick spacing for a fee tier given as a percentage.
///
/// # Errors
/// Returns `UnsupportedFeeTier` if the tier is unknown.
pub fn tick_spacing(fee_tier_percent: f64) -> Result<i32, RebalanceError> {
    FeeTier::from_percent(fee_tier_percent).map(|tier| tier.tick_spacing())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_spacing_lookup() {
        assert_eq!(tick_spacing(0.01).unwrap(), 1);
        assert_eq!(tick_spacing(0.05).unwrap(), 10);
        assert_eq!(tick_spacing(0.3).unwrap(), 60);
        assert_eq!(tick_spacing(1.0).unwrap(), 200);
    }

    #[test]
    fn test_unsupported_fee_tier() {
        assert_eq!(
            tick_spacing(0.25),
            Err(RebalanceError::UnsupportedFeeTier(0.25))
        );
        assert!(FeeTier::from_percent(0.0).is_err());
    }

    #[test]
    fn test_fee_tier_bps() {
        assert_eq!(FeeTier::from_percent(0.3).unwrap().bps(), 30);
        assert_eq!(FeeTier::Bps100.percent(), 1.0);
    }
}

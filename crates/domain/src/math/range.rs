//! Range computation around a reference price.

use super::price_tick::{MAX_TICK, MIN_TICK, align_tick, price_to_tick};
use crate::entities::TickRange;
use crate::error::RebalanceError;
use crate::fees;
use serde::{Deserialize, Serialize};

/// Percentage widths of a range around a reference price.
///
/// All values are fractions (0.08 for 8%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    /// Distance below the reference price.
    pub lower_pct: f64,
    /// Distance above the reference price.
    pub upper_pct: f64,
    /// Extra width added on both sides.
    pub buffer_pct: f64,
}

impl RangeSpec {
    /// Creates a new range spec.
    #[must_use]
    pub fn new(lower_pct: f64, upper_pct: f64, buffer_pct: f64) -> Self {
        Self {
            lower_pct,
            upper_pct,
            buffer_pct,
        }
    }
}

/// Computes spacing-aligned tick ranges for one fee tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCalculator {
    spacing: i32,
}

impl RangeCalculator {
    /// Creates a calculator for a raw tick spacing.
    ///
    /// # Errors
    /// Returns `InvalidRange` if the spacing is not positive.
    pub fn with_spacing(spacing: i32) -> Result<Self, RebalanceError> {
        if spacing <= 0 {
            return Err(RebalanceError::InvalidRange {
                lower: f64::from(spacing),
                upper: f64::from(spacing),
            });
        }
        Ok(Self { spacing })
    }

    /// Creates a calculator for a fee tier given as a percentage.
    ///
    /// # Errors
    /// Returns `UnsupportedFeeTier` if the tier is unknown.
    pub fn for_fee_tier(fee_tier_percent: f64) -> Result<Self, RebalanceError> {
        Ok(Self {
            spacing: fees::tick_spacing(fee_tier_percent)?,
        })
    }

    /// Tick spacing used for alignment.
    #[must_use]
    pub fn spacing(&self) -> i32 {
        self.spacing
    }

    /// Computes the tick range for `spec` around `reference_price`.
    ///
    /// Both bounds are floored onto the spacing grid. If they collapse onto
    /// the same tick the range is widened by one spacing on each side, so the
    /// result always satisfies `lower < upper`.
    ///
    /// # Errors
    /// - `InvalidPrice` if the reference price is not positive or a bound
    ///   falls outside the tick domain.
    /// - `InvalidRange` if a computed bound price is not positive, the bounds
    ///   are inverted, or an aligned bound leaves `[MIN_TICK, MAX_TICK]`.
    pub fn compute_range(
        &self,
        reference_price: f64,
        spec: &RangeSpec,
    ) -> Result<TickRange, RebalanceError> {
        if !reference_price.is_finite() || reference_price <= 0.0 {
            return Err(RebalanceError::InvalidPrice(reference_price));
        }

        let lower_price = reference_price * (1.0 - spec.lower_pct - spec.buffer_pct);
        let upper_price = reference_price * (1.0 + spec.upper_pct + spec.buffer_pct);
        if !(lower_price > 0.0 && upper_price > 0.0) {
            return Err(RebalanceError::InvalidRange {
                lower: lower_price,
                upper: upper_price,
            });
        }

        let mut lower = align_tick(price_to_tick(lower_price)?, self.spacing);
        let mut upper = align_tick(price_to_tick(upper_price)?, self.spacing);

        if lower > upper {
            return Err(RebalanceError::InvalidRange {
                lower: f64::from(lower),
                upper: f64::from(upper),
            });
        }
        if lower == upper {
            lower -= self.spacing;
            upper += self.spacing;
        }
        if lower < MIN_TICK || upper > MAX_TICK {
            return Err(RebalanceError::InvalidRange {
                lower: f64::from(lower),
                upper: f64::from(upper),
            });
        }

        TickRange::new(lower, upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::price_tick::price_of_tick;

    const FEE_TIERS: [f64; 4] = [0.01, 0.05, 0.3, 1.0];

    #[test]
    fn test_compute_range_reference_case() {
        let calc = RangeCalculator::for_fee_tier(0.3).unwrap();
        let range = calc
            .compute_range(1.0, &RangeSpec::new(0.08, 0.08, 0.0))
            .unwrap();
        // Raw ticks -833 / 769 floor to the 60-grid.
        assert_eq!(range, TickRange::new(-840, 720).unwrap());
    }

    #[test]
    fn test_compute_range_keeps_aligned_ticks() {
        let calc = RangeCalculator::for_fee_tier(0.3).unwrap();
        // Raw ticks land on -900 and 901, already on or just above the grid.
        let range = calc
            .compute_range(1.0, &RangeSpec::new(0.0861, 0.0943, 0.0))
            .unwrap();
        assert_eq!(range, TickRange::new(-900, 900).unwrap());
    }

    #[test]
    fn test_compute_range_applies_buffer() {
        let calc = RangeCalculator::for_fee_tier(0.3).unwrap();
        let without = calc
            .compute_range(1.0, &RangeSpec::new(0.05, 0.05, 0.0))
            .unwrap();
        let with = calc
            .compute_range(1.0, &RangeSpec::new(0.05, 0.05, 0.05))
            .unwrap();
        assert!(with.lower < without.lower);
        assert!(with.upper > without.upper);
    }

    #[test]
    fn test_ticks_ordered_and_aligned_for_all_tiers() {
        let prices = [0.0004, 0.37, 1.0, 1.0001, 2_500.0, 68_000.0];
        let specs = [
            RangeSpec::new(0.0, 0.0, 0.0),
            RangeSpec::new(0.0001, 0.0001, 0.0),
            RangeSpec::new(0.08, 0.08, 0.0),
            RangeSpec::new(0.1, 0.25, 0.05),
            RangeSpec::new(0.5, 1.5, 0.2),
        ];

        for fee_tier in FEE_TIERS {
            let calc = RangeCalculator::for_fee_tier(fee_tier).unwrap();
            let spacing = calc.spacing();
            for price in prices {
                for spec in &specs {
                    let range = calc.compute_range(price, spec).unwrap();
                    assert!(range.lower < range.upper, "{fee_tier} {price} {spec:?}");
                    assert_eq!(range.lower.rem_euclid(spacing), 0);
                    assert_eq!(range.upper.rem_euclid(spacing), 0);
                }
            }
        }
    }

    #[test]
    fn test_collapsed_range_is_widened() {
        let calc = RangeCalculator::for_fee_tier(1.0).unwrap();
        let range = calc
            .compute_range(1.005, &RangeSpec::new(0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(range, TickRange::new(-200, 200).unwrap());
    }

    #[test]
    fn test_compute_range_is_deterministic() {
        let calc = RangeCalculator::for_fee_tier(0.05).unwrap();
        let spec = RangeSpec::new(0.12, 0.07, 0.01);
        let price = price_of_tick(-201_345);
        let first = calc.compute_range(price, &spec).unwrap();
        for _ in 0..10 {
            assert_eq!(calc.compute_range(price, &spec).unwrap(), first);
        }
    }

    #[test]
    fn test_non_positive_lower_price_fails() {
        let calc = RangeCalculator::for_fee_tier(0.3).unwrap();
        let err = calc
            .compute_range(1_800.0, &RangeSpec::new(0.8, 0.8, 0.3))
            .unwrap_err();
        assert!(matches!(err, RebalanceError::InvalidRange { .. }));

        let err = calc
            .compute_range(1_800.0, &RangeSpec::new(1.0, 0.1, 0.0))
            .unwrap_err();
        assert!(matches!(err, RebalanceError::InvalidRange { .. }));
    }

    #[test]
    fn test_inverted_spec_fails() {
        let calc = RangeCalculator::for_fee_tier(0.3).unwrap();
        let err = calc
            .compute_range(1.0, &RangeSpec::new(-0.5, -0.5, 0.0))
            .unwrap_err();
        assert!(matches!(err, RebalanceError::InvalidRange { .. }));
    }

    #[test]
    fn test_ranges_past_the_tick_domain_fail() {
        let calc = RangeCalculator::for_fee_tier(0.3).unwrap();
        let spec = RangeSpec::new(0.0, 0.0, 0.0);

        // Widening the collapsed range pushes the upper bound past MAX_TICK.
        let err = calc
            .compute_range(price_of_tick(887_250), &spec)
            .unwrap_err();
        assert!(matches!(err, RebalanceError::InvalidRange { .. }));

        // Flooring onto the grid pushes the lower bound below MIN_TICK.
        let err = calc
            .compute_range(price_of_tick(-887_250), &spec)
            .unwrap_err();
        assert!(matches!(err, RebalanceError::InvalidRange { .. }));

        let range = calc
            .compute_range(price_of_tick(880_000), &RangeSpec::new(0.01, 0.01, 0.0))
            .unwrap();
        assert!(range.lower >= MIN_TICK && range.upper <= MAX_TICK);
    }

    #[test]
    fn test_invalid_reference_price() {
        let calc = RangeCalculator::for_fee_tier(0.3).unwrap();
        let spec = RangeSpec::new(0.1, 0.1, 0.0);
        assert_eq!(
            calc.compute_range(0.0, &spec),
            Err(RebalanceError::InvalidPrice(0.0))
        );
        assert!(calc.compute_range(-3.0, &spec).is_err());
    }

    #[test]
    fn test_unsupported_fee_tier() {
        assert_eq!(
            RangeCalculator::for_fee_tier(0.5),
            Err(RebalanceError::UnsupportedFeeTier(0.5))
        );
        assert!(RangeCalculator::with_spacing(0).is_err());
        assert_eq!(RangeCalculator::with_spacing(60).unwrap().spacing(), 60);
    }
}

//! Conversion between prices and ticks.
//!
//! A tick is the discrete logarithmic price unit of the pool:
//! `price = 1.0001 ^ tick`. Conversions use `f64` throughout.
//!
//! Rounding rules:
//! - `price_to_tick` truncates toward zero (`-833.86 -> -833`).
//! - `align_tick` floors toward negative infinity onto the spacing grid
//!   using Euclidean remainder (`-833 -> -840` for spacing 60).

use crate::error::RebalanceError;

/// Smallest tick supported by the pool.
pub const MIN_TICK: i32 = -887_272;
/// Largest tick supported by the pool.
pub const MAX_TICK: i32 = 887_272;

const TICK_BASE: f64 = 1.0001;

/// Returns the price corresponding to a (possibly fractional) tick.
/// P = 1.0001 ^ tick
#[must_use]
pub fn tick_to_price(tick: f64) -> f64 {
    TICK_BASE.powf(tick)
}

/// Returns the price at an integer tick.
#[must_use]
pub fn price_of_tick(tick: i32) -> f64 {
    TICK_BASE.powi(tick)
}

/// Returns the tick corresponding to a given price.
/// tick = log_1.0001(P), truncated toward zero.
///
/// # Errors
/// Returns `InvalidPrice` if the price is not a positive finite number or
/// maps outside `[MIN_TICK, MAX_TICK]`.
pub fn price_to_tick(price: f64) -> Result<i32, RebalanceError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(RebalanceError::InvalidPrice(price));
    }
    let tick = (price.ln() / TICK_BASE.ln()).trunc();
    if tick < f64::from(MIN_TICK) || tick > f64::from(MAX_TICK) {
        return Err(RebalanceError::InvalidPrice(price));
    }
    Ok(tick as i32)
}

/// Rounds a tick down to the nearest multiple of `spacing`.
#[must_use]
pub fn align_tick(tick: i32, spacing: i32) -> i32 {
    tick - tick.rem_euclid(spacing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_to_price() {
        // Tick 0 -> Price 1
        assert_eq!(tick_to_price(0.0), 1.0);
        assert_eq!(price_of_tick(0), 1.0);

        // Tick 100 -> 1.0001^100 ~= 1.010049
        let expected = 1.01004966;
        assert!((price_of_tick(100) - expected).abs() < 0.000001);
        assert!((tick_to_price(100.0) - expected).abs() < 0.000001);
    }

    #[test]
    fn test_price_to_tick() {
        assert_eq!(price_to_tick(1.0).unwrap(), 0);
        assert_eq!(price_to_tick(1.0100497).unwrap(), 100);
    }

    #[test]
    fn test_price_to_tick_truncates_toward_zero() {
        // log_1.0001(0.99) ~= -100.51
        assert_eq!(price_to_tick(0.99).unwrap(), -100);
        // log_1.0001(1.08) ~= 769.65
        assert_eq!(price_to_tick(1.08).unwrap(), 769);
    }

    #[test]
    fn test_price_to_tick_rejects_invalid_prices() {
        assert_eq!(price_to_tick(0.0), Err(RebalanceError::InvalidPrice(0.0)));
        assert_eq!(price_to_tick(-2.5), Err(RebalanceError::InvalidPrice(-2.5)));
        assert!(price_to_tick(f64::NAN).is_err());
        assert!(price_to_tick(f64::INFINITY).is_err());
        assert!(price_to_tick(1e300).is_err());
    }

    #[test]
    fn test_align_tick_floors() {
        assert_eq!(align_tick(-833, 60), -840);
        assert_eq!(align_tick(769, 60), 720);
        assert_eq!(align_tick(-100, 60), -120);
        assert_eq!(align_tick(-60, 60), -60);
        assert_eq!(align_tick(59, 60), 0);
        assert_eq!(align_tick(-900, 60), -900);
        assert_eq!(align_tick(-1, 200), -200);
        assert_eq!(align_tick(17, 1), 17);
    }
}

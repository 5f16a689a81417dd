//! Tick math and range calculation.

/// Price and tick conversion.
pub mod price_tick;
/// Tick range computation around a reference price.
pub mod range;

pub use price_tick::{MAX_TICK, MIN_TICK, align_tick, price_of_tick, price_to_tick, tick_to_price};
pub use range::{RangeCalculator, RangeSpec};

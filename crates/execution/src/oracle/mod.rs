//! Bias oracle strategies.
//!
//! - [`IndicatorRulesOracle`]: deterministic votes over technical indicators.
//! - [`StaticBiasOracle`]: fixed answer, for manual runs and tests.
//!
//! A model-backed HTTP oracle lives in the data crate.

mod rules;
mod fixed;

pub use fixed::StaticBiasOracle;
pub use rules::{IndicatorRulesOracle, RulesConfig};

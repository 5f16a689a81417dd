//! Liquidity venue implementations.
//!
//! On-chain venues are external; this module ships the in-memory paper venue
//! used for dry runs and tests.

mod paper;

pub use paper::{PaperVenue, VenueCall};

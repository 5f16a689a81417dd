//! Core domain model for concentrated liquidity range management.
//!
//! This crate holds everything that is pure and deterministic:
//! - Price and tick conversion with fee-tier spacing
//! - Range computation around a reference price
//! - Pool configuration, position state and decision records
//! - The error taxonomy shared by the engine and its collaborators
//! - Traits for the external collaborators (venue, oracle, store, market data)

/// Entities: configuration, position state, decisions and market data.
pub mod entities;
/// Shared enums.
pub mod enums;
/// Error types.
pub mod error;
/// Fee tiers and tick spacing.
pub mod fees;
/// Tick math and range calculation.
pub mod math;
/// Interfaces to external collaborators.
pub mod ports;

pub use error::RebalanceError;

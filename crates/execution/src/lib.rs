//! Rebalancing engine for concentrated liquidity positions.
//!
//! This crate drives managed positions through their lifecycle:
//! - Trigger evaluation against the epoch range
//! - Bias oracles built on technical indicators
//! - The per-position rebalance policy
//! - Batch evaluation of every active commission
//! - Lifecycle tracking of deployments, checks and repositions
//! - A paper venue for dry runs

/// Prelude module for convenient imports.
pub mod prelude;

/// Position lifecycle tracking.
pub mod lifecycle;
/// Bias oracles.
pub mod oracle;
/// Strategy evaluation and execution.
pub mod strategy;
/// Liquidity venues.
pub mod venue;

//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use lp_rebalancer_execution::prelude::*;
//! ```

// Lifecycle
pub use crate::lifecycle::{
    AggregateStats, EventData, ExitReason, LifecycleEvent, LifecycleEventType, LifecycleTracker,
    PositionLifecycle, PositionSummary,
};

// Oracle
pub use crate::oracle::{IndicatorRulesOracle, RulesConfig, StaticBiasOracle};

// Strategy
pub use crate::strategy::{
    BatchReport, ExecutorConfig, PolicyConfig, PositionOutcome, RebalancePolicyEngine,
    StrategyExecutor, TriggerOutcome, TriggerSide,
};

// Venue
pub use crate::venue::{PaperVenue, VenueCall};

pub mod commission;
pub mod decision;
pub mod market;
pub mod pool_config;
pub mod position;

// Re-export for easier access
pub use commission::Commission;
pub use decision::{AppliedBias, Decision, DecisionReason, DecisionRecord, EvaluationFailure};
pub use market::MarketSnapshot;
pub use pool_config::{
    LiquidityAmounts, LiquidityRange, PoolConfig, PoolDetails, RebalanceTriggers, TriggerSpec,
};
pub use position::{PositionKey, PositionState, TickRange};

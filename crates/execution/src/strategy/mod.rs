//! Rebalance strategy: trigger evaluation, the policy engine and the batch
//! driver.

mod executor;
mod policy;
pub mod trigger;

pub use executor::{BatchReport, ExecutorConfig, PositionOutcome, StrategyExecutor};
pub use policy::{PolicyConfig, RebalancePolicyEngine};
pub use trigger::{TriggerOutcome, TriggerSide};

//! Interfaces to the collaborators the engine depends on.
//!
//! Implementations live in other crates: the paper venue and the indicator
//! oracle in the execution crate, the Postgres store and the HTTP oracle in
//! the data crate.

use crate::entities::{
    Commission, DecisionRecord, EvaluationFailure, LiquidityAmounts, MarketSnapshot, PoolConfig,
    PoolDetails, PositionKey, PositionState, TickRange,
};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Answer of a bias oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasAssessment {
    /// Magnitude of the shift (0.05 for 5%), always `>= 0`.
    pub bias: f64,
    /// Direction of the shift.
    pub positive: bool,
    /// Free-form reasoning.
    pub explanation: String,
}

impl BiasAssessment {
    /// Checks the numeric contract: finite and non-negative.
    ///
    /// # Errors
    /// Returns an error describing the violation.
    pub fn validate(&self) -> Result<()> {
        if !self.bias.is_finite() || self.bias < 0.0 {
            anyhow::bail!("bias must be finite and non-negative, got {}", self.bias);
        }
        Ok(())
    }
}

/// Supplies a market bias for a pool configuration.
#[async_trait]
pub trait BiasOracle: Send + Sync {
    /// Assesses the bias for `config` given `snapshot`.
    async fn assess(
        &self,
        config: &PoolConfig,
        snapshot: &MarketSnapshot,
    ) -> Result<BiasAssessment>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Confirmation returned by the venue after moving liquidity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueReceipt {
    /// Id of the position now holding the liquidity.
    pub position_id: String,
    /// Range actually applied.
    pub range: TickRange,
    /// Token amounts in the position.
    pub amounts: LiquidityAmounts,
}

/// Where liquidity lives: reads the pool tick and moves positions.
#[async_trait]
pub trait LiquidityVenue: Send + Sync {
    /// Current tick of the pool.
    async fn current_tick(&self, pool: &PoolDetails) -> Result<i32>;

    /// Opens a new position on `range`.
    async fn deploy(
        &self,
        pool: &PoolDetails,
        range: TickRange,
        amount_eth: Decimal,
        max_slippage: Decimal,
    ) -> Result<VenueReceipt>;

    /// Moves an existing position to `range`.
    async fn shift(
        &self,
        pool: &PoolDetails,
        old_position_id: &str,
        range: TickRange,
        amount_eth: Decimal,
        max_slippage: Decimal,
    ) -> Result<VenueReceipt>;

    /// Withdraws all liquidity from a position.
    async fn exit(&self, pool: &PoolDetails, position_id: &str) -> Result<()>;
}

/// Persistence for commissions, position state and the decision history.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Commissions to evaluate in the next pass.
    async fn active_commissions(&self) -> Result<Vec<Commission>>;

    /// Loads the state of a position, if one has been recorded.
    async fn load_state(&self, key: PositionKey) -> Result<Option<PositionState>>;

    /// Saves the state of a position.
    async fn save_state(&self, state: &PositionState) -> Result<()>;

    /// Appends a decision to the history.
    async fn append_decision(&self, record: &DecisionRecord) -> Result<()>;

    /// Appends a failed evaluation to the history.
    async fn record_failure(&self, failure: &EvaluationFailure) -> Result<()>;
}

/// Source of market snapshots.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest snapshot for a ticker, if any.
    async fn latest_snapshot(&self, ticker: &str) -> Result<Option<MarketSnapshot>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_validation() {
        let mut assessment = BiasAssessment {
            bias: 0.05,
            positive: true,
            explanation: "rsi oversold".into(),
        };
        assert!(assessment.validate().is_ok());

        assessment.bias = -0.01;
        assert!(assessment.validate().is_err());

        assessment.bias = f64::NAN;
        assert!(assessment.validate().is_err());
    }
}

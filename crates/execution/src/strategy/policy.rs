//! Rebalance policy: decides whether a position stays, deploys or moves.

use super::trigger;
use crate::lifecycle::PositionLifecycle;
use chrono::{DateTime, Utc};
use lp_rebalancer_domain::RebalanceError;
use lp_rebalancer_domain::entities::{
    AppliedBias, Commission, Decision, DecisionReason, MarketSnapshot, PoolConfig, PositionState,
    TickRange,
};
use lp_rebalancer_domain::enums::DecisionAction;
use lp_rebalancer_domain::math::{RangeCalculator, price_of_tick, tick_to_price};
use lp_rebalancer_domain::ports::{BiasOracle, LiquidityVenue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the policy engine.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Upper bound on a single oracle call.
    pub oracle_timeout: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(30),
        }
    }
}

/// Evaluates one position per call and applies the resulting decision.
///
/// Order of checks:
/// 1. No venue position: deploy around the current tick.
/// 2. Inside the throttle window: skip without touching state.
/// 3. Mark the position checked.
/// 4. Tick inside the current range: skip.
/// 5. Out of range: a configured trigger wins, otherwise the oracle's bias
///    shifts the current tick.
/// 6. Compute the new range and ask the venue to move the position.
/// 7. Only a confirmed move starts a new epoch.
pub struct RebalancePolicyEngine {
    venue: Arc<dyn LiquidityVenue>,
    oracle: Arc<dyn BiasOracle>,
    config: PolicyConfig,
}

impl RebalancePolicyEngine {
    /// Creates a new engine.
    pub fn new(
        venue: Arc<dyn LiquidityVenue>,
        oracle: Arc<dyn BiasOracle>,
        config: PolicyConfig,
    ) -> Self {
        Self {
            venue,
            oracle,
            config,
        }
    }

    /// The venue the engine moves liquidity on.
    pub fn venue(&self) -> &Arc<dyn LiquidityVenue> {
        &self.venue
    }

    /// Gets the configuration.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Evaluates `state` at `now` with the pool at `current_tick`.
    ///
    /// On success the state reflects the decision. On failure the state is
    /// untouched except for `last_checked_at`, which has already advanced if
    /// the throttle check passed.
    ///
    /// # Errors
    /// - `PositionExited` for exited positions.
    /// - `InvalidPrice`, `UnsupportedFeeTier`, `InvalidRange` from range math.
    /// - `BiasUnavailable` if the oracle fails, times out or breaks its contract.
    /// - `VenueExecutionFailed` if the venue rejects the deployment or move.
    pub async fn evaluate(
        &self,
        now: DateTime<Utc>,
        commission: &Commission,
        state: &mut PositionState,
        current_tick: i32,
        snapshot: &MarketSnapshot,
    ) -> Result<Decision, RebalanceError> {
        if state.stage.is_terminal() {
            return Err(RebalanceError::PositionExited);
        }

        if !state.is_seeded() {
            return self.deploy(now, commission, state, current_tick).await;
        }

        let config = &commission.config;
        if state.is_throttled(now, config.rebalance_interval()) {
            debug!(
                key = %state.key,
                last_checked_at = ?state.last_checked_at,
                "Within rebalance timeframe"
            );
            return Ok(Decision::throttled(now));
        }

        state.mark_checked(now);

        let Some(current_range) = state.current_range else {
            return Err(RebalanceError::InvalidRange {
                lower: f64::NAN,
                upper: f64::NAN,
            });
        };

        if current_range.contains(current_tick) {
            PositionLifecycle::apply(state, DecisionAction::SkipInRange)?;
            debug!(
                key = %state.key,
                current_tick,
                range = %current_range,
                "Position in range"
            );
            return Ok(Decision::in_range(now));
        }

        let next_stage = PositionLifecycle::transition(state.stage, DecisionAction::Rebalance)?;
        PositionLifecycle::mark_out_of_range(state)?;
        let initial_range = state.initial_range.unwrap_or(current_range);

        let (center_tick, reason, bias) = match trigger::evaluate(
            current_tick,
            &initial_range,
            config.rebalance_triggers.as_ref(),
        ) {
            Some(outcome) => {
                info!(
                    key = %state.key,
                    current_tick,
                    deviation_pct = outcome.deviation_pct,
                    side = ?outcome.side,
                    "Trigger fired"
                );
                (outcome.center_tick(), outcome.reason(), None)
            }
            None => {
                let applied = self.assess_bias(config, snapshot).await?;
                let tick = f64::from(current_tick);
                let (center, reason) = if applied.positive {
                    (tick * (1.0 + applied.bias), DecisionReason::PositiveBias)
                } else {
                    (tick * (1.0 - applied.bias), DecisionReason::NegativeBias)
                };
                (center, reason, Some(applied))
            }
        };

        let new_range = RangeCalculator::for_fee_tier(config.pool_details.fee_tier)?
            .compute_range(tick_to_price(center_tick), &config.base_range_spec())?;

        self.shift(now, commission, state, new_range).await?;
        state.stage = next_stage;

        info!(
            key = %state.key,
            current_tick,
            old_range = %current_range,
            new_range = %new_range,
            epoch = state.epoch,
            reason = %reason,
            "Position rebalanced"
        );
        Ok(Decision::rebalance(reason, new_range, bias, now))
    }

    /// Initial deployment around the current tick.
    async fn deploy(
        &self,
        now: DateTime<Utc>,
        commission: &Commission,
        state: &mut PositionState,
        current_tick: i32,
    ) -> Result<Decision, RebalanceError> {
        let config = &commission.config;
        let next_stage = PositionLifecycle::transition(state.stage, DecisionAction::Deploy)?;
        let range = RangeCalculator::for_fee_tier(config.pool_details.fee_tier)?
            .compute_range(price_of_tick(current_tick), &config.base_range_spec())?;

        let receipt = self
            .venue
            .deploy(
                &config.pool_details,
                range,
                commission.amount_eth,
                config.max_slippage,
            )
            .await
            .map_err(|e| {
                warn!(key = %state.key, %range, error = %e, "Deployment failed");
                RebalanceError::VenueExecutionFailed(e.to_string())
            })?;

        state.begin_epoch(range, receipt.position_id, receipt.amounts, now);
        state.stage = next_stage;

        info!(
            key = %state.key,
            current_tick,
            lower = range.lower,
            upper = range.upper,
            "Initial liquidity deployed"
        );
        Ok(Decision::deploy(range, now))
    }

    /// Moves the venue position and starts a new epoch on success.
    async fn shift(
        &self,
        now: DateTime<Utc>,
        commission: &Commission,
        state: &mut PositionState,
        new_range: TickRange,
    ) -> Result<(), RebalanceError> {
        let config = &commission.config;
        let old_position_id = state.venue_position_id.clone().unwrap_or_default();

        let receipt = self
            .venue
            .shift(
                &config.pool_details,
                &old_position_id,
                new_range,
                commission.amount_eth,
                config.max_slippage,
            )
            .await
            .map_err(|e| {
                warn!(key = %state.key, %new_range, error = %e, "Reposition failed");
                RebalanceError::VenueExecutionFailed(e.to_string())
            })?;

        state.begin_epoch(new_range, receipt.position_id, receipt.amounts, now);
        Ok(())
    }

    /// Queries the oracle under the configured timeout.
    async fn assess_bias(
        &self,
        config: &PoolConfig,
        snapshot: &MarketSnapshot,
    ) -> Result<AppliedBias, RebalanceError> {
        let answer = tokio::time::timeout(
            self.config.oracle_timeout,
            self.oracle.assess(config, snapshot),
        )
        .await
        .map_err(|_| {
            RebalanceError::BiasUnavailable(format!(
                "{} timed out after {:?}",
                self.oracle.name(),
                self.config.oracle_timeout
            ))
        })?
        .map_err(|e| RebalanceError::BiasUnavailable(format!("{}: {e}", self.oracle.name())))?;

        answer
            .validate()
            .map_err(|e| RebalanceError::BiasUnavailable(format!("{}: {e}", self.oracle.name())))?;

        debug!(
            oracle = self.oracle.name(),
            bias = answer.bias,
            positive = answer.positive,
            "Bias assessed"
        );
        Ok(AppliedBias {
            bias: answer.bias,
            positive: answer.positive,
            explanation: answer.explanation,
        })
    }
}

//! Stage transitions of a managed position.

use chrono::{DateTime, Utc};
use lp_rebalancer_domain::RebalanceError;
use lp_rebalancer_domain::entities::{LiquidityAmounts, PoolDetails, PositionState};
use lp_rebalancer_domain::enums::{DecisionAction, LifecycleStage};
use lp_rebalancer_domain::ports::LiquidityVenue;
use tracing::{info, warn};

/// State machine for one position.
///
/// ```text
/// Unseeded --Deploy--> Deployed --SkipInRange--> InRange
///                         |                        |
///                         +----tick outside range--+--> OutOfRange
///                                                         |
///                            Deployed (next epoch) <--Rebalance
/// any seeded stage --exit--> Exited (terminal)
/// ```
pub struct PositionLifecycle;

impl PositionLifecycle {
    /// Stage reached by applying `action` in stage `from`.
    ///
    /// # Errors
    /// - `PositionExited` if the position is terminal.
    /// - `InvalidTransition` if the action is not allowed from `from`.
    pub fn transition(
        from: LifecycleStage,
        action: DecisionAction,
    ) -> Result<LifecycleStage, RebalanceError> {
        use DecisionAction::*;
        use LifecycleStage::*;

        match (from, action) {
            (Exited, _) => Err(RebalanceError::PositionExited),
            (Unseeded, Deploy) => Ok(Deployed),
            (Deployed | InRange | OutOfRange, SkipThrottled) => Ok(from),
            (Deployed | InRange | OutOfRange, SkipInRange) => Ok(InRange),
            (Deployed | InRange | OutOfRange, Rebalance) => Ok(Deployed),
            (Unseeded, _) | (Deployed | InRange | OutOfRange, Deploy) => {
                Err(RebalanceError::InvalidTransition { from, action })
            }
        }
    }

    /// Applies `action` to `state`, updating its stage.
    ///
    /// # Errors
    /// Same as [`PositionLifecycle::transition`]; the state is left unchanged.
    pub fn apply(state: &mut PositionState, action: DecisionAction) -> Result<(), RebalanceError> {
        state.stage = Self::transition(state.stage, action)?;
        Ok(())
    }

    /// Records that the tick was found outside the current range.
    ///
    /// The stage stays `OutOfRange` until a reposition succeeds, so a failed
    /// reposition remains visible on the stored state.
    ///
    /// # Errors
    /// - `PositionExited` if the position is terminal.
    /// - `InvalidTransition` if nothing is deployed.
    pub fn mark_out_of_range(state: &mut PositionState) -> Result<(), RebalanceError> {
        match state.stage {
            LifecycleStage::Exited => Err(RebalanceError::PositionExited),
            stage if stage.has_position() => {
                state.stage = LifecycleStage::OutOfRange;
                Ok(())
            }
            from => Err(RebalanceError::InvalidTransition {
                from,
                action: DecisionAction::Rebalance,
            }),
        }
    }

    /// Withdraws the position and moves it to `Exited`.
    ///
    /// A position that was never deployed is exited without calling the venue.
    ///
    /// # Errors
    /// - `PositionExited` if already exited.
    /// - `VenueExecutionFailed` if the venue rejects the withdrawal; the state
    ///   is left unchanged.
    pub async fn exit(
        venue: &dyn LiquidityVenue,
        pool: &PoolDetails,
        state: &mut PositionState,
        now: DateTime<Utc>,
    ) -> Result<(), RebalanceError> {
        if state.stage.is_terminal() {
            return Err(RebalanceError::PositionExited);
        }

        if let Some(position_id) = state.venue_position_id.as_deref() {
            venue.exit(pool, position_id).await.map_err(|e| {
                warn!(key = %state.key, error = %e, "Exit failed");
                RebalanceError::VenueExecutionFailed(e.to_string())
            })?;
        }

        state.stage = LifecycleStage::Exited;
        state.liquidity_amounts = LiquidityAmounts::default();
        state.mark_checked(now);

        info!(key = %state.key, epoch = state.epoch, "Position exited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::PaperVenue;
    use lp_rebalancer_domain::entities::{PositionKey, TickRange};

    fn pool() -> PoolDetails {
        PoolDetails {
            chain: "sepolia".into(),
            fee_tier: 0.3,
            token_pair: "ETH/USDC".into(),
        }
    }

    #[test]
    fn test_transition_table() {
        use DecisionAction::*;
        use LifecycleStage::*;

        assert_eq!(PositionLifecycle::transition(Unseeded, Deploy), Ok(Deployed));
        assert_eq!(PositionLifecycle::transition(Deployed, SkipInRange), Ok(InRange));
        assert_eq!(PositionLifecycle::transition(InRange, SkipThrottled), Ok(InRange));
        assert_eq!(PositionLifecycle::transition(InRange, Rebalance), Ok(Deployed));
        assert_eq!(PositionLifecycle::transition(OutOfRange, Rebalance), Ok(Deployed));
    }

    #[test]
    fn test_invalid_transitions() {
        use DecisionAction::*;
        use LifecycleStage::*;

        assert_eq!(
            PositionLifecycle::transition(Unseeded, Rebalance),
            Err(RebalanceError::InvalidTransition {
                from: Unseeded,
                action: Rebalance
            })
        );
        assert!(PositionLifecycle::transition(InRange, Deploy).is_err());
        assert_eq!(
            PositionLifecycle::transition(Exited, SkipThrottled),
            Err(RebalanceError::PositionExited)
        );
    }

    #[test]
    fn test_mark_out_of_range() {
        let mut state = PositionState::unseeded(PositionKey::new(1, 1));
        assert!(PositionLifecycle::mark_out_of_range(&mut state).is_err());

        state.stage = LifecycleStage::InRange;
        PositionLifecycle::mark_out_of_range(&mut state).unwrap();
        assert_eq!(state.stage, LifecycleStage::OutOfRange);
        assert_eq!(
            PositionLifecycle::transition(state.stage, DecisionAction::Rebalance),
            Ok(LifecycleStage::Deployed)
        );

        state.stage = LifecycleStage::Exited;
        assert_eq!(
            PositionLifecycle::mark_out_of_range(&mut state),
            Err(RebalanceError::PositionExited)
        );
    }

    #[tokio::test]
    async fn test_exit_withdraws_and_is_terminal() {
        let venue = PaperVenue::new();
        let mut state = PositionState::unseeded(PositionKey::new(1, 1));
        state.begin_epoch(
            TickRange::new(-60, 60).unwrap(),
            "7".into(),
            LiquidityAmounts::default(),
            Utc::now(),
        );
        state.stage = LifecycleStage::InRange;

        PositionLifecycle::exit(&venue, &pool(), &mut state, Utc::now())
            .await
            .unwrap();
        assert_eq!(state.stage, LifecycleStage::Exited);
        assert_eq!(venue.exited_positions().await, vec!["7".to_string()]);

        let again = PositionLifecycle::exit(&venue, &pool(), &mut state, Utc::now()).await;
        assert_eq!(again, Err(RebalanceError::PositionExited));
    }

    #[tokio::test]
    async fn test_exit_failure_leaves_state() {
        let venue = PaperVenue::new();
        venue.fail_next_writes(1).await;
        let mut state = PositionState::unseeded(PositionKey::new(1, 1));
        state.begin_epoch(
            TickRange::new(-60, 60).unwrap(),
            "7".into(),
            LiquidityAmounts::default(),
            Utc::now(),
        );
        state.stage = LifecycleStage::Deployed;
        let before = state.clone();

        let result = PositionLifecycle::exit(&venue, &pool(), &mut state, Utc::now()).await;
        assert!(matches!(result, Err(RebalanceError::VenueExecutionFailed(_))));
        assert_eq!(state, before);
    }
}

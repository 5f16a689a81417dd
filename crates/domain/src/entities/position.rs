use super::pool_config::LiquidityAmounts;
use crate::enums::LifecycleStage;
use crate::error::RebalanceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a managed position: one per (agent, user) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    /// Agent whose configuration drives the position.
    pub agent_id: i64,
    /// User whose capital is deployed.
    pub user_id: i64,
}

impl PositionKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(agent_id: i64, user_id: i64) -> Self {
        Self { agent_id, user_id }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent={} user={}", self.agent_id, self.user_id)
    }
}

/// A tick interval with `lower < upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickRange {
    /// Lower tick (inclusive).
    #[serde(alias = "min")]
    pub lower: i32,
    /// Upper tick (inclusive).
    #[serde(alias = "max")]
    pub upper: i32,
}

impl TickRange {
    /// Creates a range.
    ///
    /// # Errors
    /// Returns `InvalidRange` unless `lower < upper`.
    pub fn new(lower: i32, upper: i32) -> Result<Self, RebalanceError> {
        if lower >= upper {
            return Err(RebalanceError::InvalidRange {
                lower: f64::from(lower),
                upper: f64::from(upper),
            });
        }
        Ok(Self { lower, upper })
    }

    /// Width of the range in ticks.
    #[must_use]
    pub fn span(&self) -> i64 {
        i64::from(self.upper) - i64::from(self.lower)
    }

    /// Returns true if `tick` lies within the range, bounds included.
    #[must_use]
    pub fn contains(&self, tick: i32) -> bool {
        self.lower <= tick && tick <= self.upper
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// Persisted state of one managed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    /// Owning (agent, user) pair.
    pub key: PositionKey,
    /// Lifecycle stage.
    pub stage: LifecycleStage,
    /// Number of deployments and repositions so far.
    pub epoch: u32,
    /// Range the venue position occupies now.
    pub current_range: Option<TickRange>,
    /// Range computed at the start of the epoch; deviation reference.
    pub initial_range: Option<TickRange>,
    /// Last evaluation that passed the throttle.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Last deployment or reposition.
    pub last_rebalanced_at: Option<DateTime<Utc>>,
    /// Token amounts recorded on the position.
    pub liquidity_amounts: LiquidityAmounts,
    /// Venue-side position id; `None` until first deployment.
    pub venue_position_id: Option<String>,
}

impl PositionState {
    /// State of a position that has never been deployed.
    #[must_use]
    pub fn unseeded(key: PositionKey) -> Self {
        Self {
            key,
            stage: LifecycleStage::Unseeded,
            epoch: 0,
            current_range: None,
            initial_range: None,
            last_checked_at: None,
            last_rebalanced_at: None,
            liquidity_amounts: LiquidityAmounts::default(),
            venue_position_id: None,
        }
    }

    /// Returns true once liquidity has been deployed.
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.venue_position_id.is_some()
    }

    /// Returns true if `now` still falls inside the throttle window.
    #[must_use]
    pub fn is_throttled(&self, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        self.last_checked_at
            .is_some_and(|checked| now < checked + interval)
    }

    /// Advances `last_checked_at`, never moving it backwards.
    pub fn mark_checked(&mut self, now: DateTime<Utc>) {
        if self.last_checked_at.is_none_or(|checked| now > checked) {
            self.last_checked_at = Some(now);
        }
    }

    /// Starts a new epoch on `range` after a confirmed deployment or reposition.
    pub fn begin_epoch(
        &mut self,
        range: TickRange,
        venue_position_id: String,
        amounts: LiquidityAmounts,
        now: DateTime<Utc>,
    ) {
        self.current_range = Some(range);
        self.initial_range = Some(range);
        self.venue_position_id = Some(venue_position_id);
        self.liquidity_amounts = amounts;
        self.epoch += 1;
        self.last_rebalanced_at = Some(now);
        self.mark_checked(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_tick_range_invariant() {
        assert!(TickRange::new(-900, 900).is_ok());
        assert!(TickRange::new(60, 60).is_err());
        assert!(TickRange::new(120, 60).is_err());
    }

    #[test]
    fn test_tick_range_contains_bounds() {
        let range = TickRange::new(-900, 900).unwrap();
        assert!(range.contains(-900));
        assert!(range.contains(900));
        assert!(!range.contains(901));
        assert_eq!(range.span(), 1800);
        assert_eq!(range.to_string(), "[-900, 900]");
    }

    #[test]
    fn test_tick_range_accepts_min_max_keys() {
        let range: TickRange = serde_json::from_str(r#"{"min": -60, "max": 120}"#).unwrap();
        assert_eq!(range, TickRange::new(-60, 120).unwrap());
    }

    #[test]
    fn test_throttle_window() {
        let mut state = PositionState::unseeded(PositionKey::new(1, 2));
        let window = chrono::Duration::minutes(15);
        assert!(!state.is_throttled(at(0), window));

        state.mark_checked(at(0));
        assert!(state.is_throttled(at(14), window));
        assert!(!state.is_throttled(at(15), window));
    }

    #[test]
    fn test_mark_checked_is_monotonic() {
        let mut state = PositionState::unseeded(PositionKey::new(1, 2));
        state.mark_checked(at(30));
        state.mark_checked(at(10));
        assert_eq!(state.last_checked_at, Some(at(30)));
    }

    #[test]
    fn test_begin_epoch_resets_both_ranges() {
        let mut state = PositionState::unseeded(PositionKey::new(1, 2));
        let range = TickRange::new(-840, 720).unwrap();
        state.begin_epoch(range, "42".into(), LiquidityAmounts::default(), at(5));

        assert!(state.is_seeded());
        assert_eq!(state.epoch, 1);
        assert_eq!(state.current_range, Some(range));
        assert_eq!(state.initial_range, Some(range));
        assert_eq!(state.last_rebalanced_at, Some(at(5)));
        assert_eq!(state.last_checked_at, Some(at(5)));
    }
}

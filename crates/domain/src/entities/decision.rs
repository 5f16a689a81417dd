use super::position::{PositionKey, TickRange};
use crate::enums::DecisionAction;
use crate::error::RebalanceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reason attached to a decision.
///
/// The string forms are consumed by downstream classification and must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionReason {
    /// First deployment of liquidity.
    #[serde(rename = "Initial liquidity deployment")]
    InitialDeployment,
    /// Throttle window has not elapsed.
    #[serde(rename = "Skipped; within rebalance timeframe")]
    Throttled,
    /// Tick is within the current range.
    #[serde(rename = "No action; position in range")]
    InRange,
    /// Below trigger fired.
    #[serde(rename = "Applied below-trigger")]
    BelowTrigger,
    /// Above trigger fired.
    #[serde(rename = "Applied above-trigger")]
    AboveTrigger,
    /// Positive bias shifted the reference tick up.
    #[serde(rename = "Applied positive bias to current price")]
    PositiveBias,
    /// Negative bias shifted the reference tick down.
    #[serde(rename = "Applied negative bias to current price")]
    NegativeBias,
}

impl DecisionReason {
    const ALL: [DecisionReason; 7] = [
        Self::InitialDeployment,
        Self::Throttled,
        Self::InRange,
        Self::BelowTrigger,
        Self::AboveTrigger,
        Self::PositiveBias,
        Self::NegativeBias,
    ];

    /// Canonical reason string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialDeployment => "Initial liquidity deployment",
            Self::Throttled => "Skipped; within rebalance timeframe",
            Self::InRange => "No action; position in range",
            Self::BelowTrigger => "Applied below-trigger",
            Self::AboveTrigger => "Applied above-trigger",
            Self::PositiveBias => "Applied positive bias to current price",
            Self::NegativeBias => "Applied negative bias to current price",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|reason| reason.as_str() == s)
            .ok_or_else(|| format!("unknown decision reason: {s}"))
    }
}

/// Bias that was applied to compute a new range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedBias {
    /// Magnitude, always `>= 0`.
    pub bias: f64,
    /// Direction of the shift.
    pub positive: bool,
    /// Oracle's explanation.
    pub explanation: String,
}

impl AppliedBias {
    /// Bias with its sign applied.
    #[must_use]
    pub fn signed(&self) -> f64 {
        if self.positive { self.bias } else { -self.bias }
    }
}

/// Outcome of one evaluation. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Chosen action.
    pub action: DecisionAction,
    /// Reason from the fixed taxonomy.
    pub reason: DecisionReason,
    /// Whether capital was moved.
    pub rebalance_occurred: bool,
    /// Bias used, only on the bias path.
    pub bias: Option<AppliedBias>,
    /// Range the position now occupies, for Deploy and Rebalance.
    pub applied_new_range: Option<TickRange>,
    /// Evaluation time.
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// Initial deployment onto `range`.
    #[must_use]
    pub fn deploy(range: TickRange, now: DateTime<Utc>) -> Self {
        Self {
            action: DecisionAction::Deploy,
            reason: DecisionReason::InitialDeployment,
            rebalance_occurred: true,
            bias: None,
            applied_new_range: Some(range),
            timestamp: now,
        }
    }

    /// Skip because the throttle window has not elapsed.
    #[must_use]
    pub fn throttled(now: DateTime<Utc>) -> Self {
        Self::skip(DecisionAction::SkipThrottled, DecisionReason::Throttled, now)
    }

    /// Skip because the position is in range.
    #[must_use]
    pub fn in_range(now: DateTime<Utc>) -> Self {
        Self::skip(DecisionAction::SkipInRange, DecisionReason::InRange, now)
    }

    /// Reposition onto `range`.
    #[must_use]
    pub fn rebalance(
        reason: DecisionReason,
        range: TickRange,
        bias: Option<AppliedBias>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            action: DecisionAction::Rebalance,
            reason,
            rebalance_occurred: true,
            bias,
            applied_new_range: Some(range),
            timestamp: now,
        }
    }

    fn skip(action: DecisionAction, reason: DecisionReason, now: DateTime<Utc>) -> Self {
        Self {
            action,
            reason,
            rebalance_occurred: false,
            bias: None,
            applied_new_range: None,
            timestamp: now,
        }
    }
}

/// Append-only history entry for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Record id.
    pub id: Uuid,
    /// Position the decision applies to.
    pub key: PositionKey,
    /// Epoch after the decision was applied.
    pub epoch: u32,
    /// The decision itself.
    pub decision: Decision,
    /// `last_checked_at` after the decision.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Set when capital moved.
    pub last_rebalanced_at: Option<DateTime<Utc>>,
}

impl DecisionRecord {
    /// Wraps a decision for persistence.
    #[must_use]
    pub fn new(key: PositionKey, epoch: u32, decision: Decision) -> Self {
        let last_rebalanced_at = decision.rebalance_occurred.then_some(decision.timestamp);
        let last_checked_at = match decision.action {
            DecisionAction::SkipThrottled => None,
            _ => Some(decision.timestamp),
        };
        Self {
            id: Uuid::new_v4(),
            key,
            epoch,
            decision,
            last_checked_at,
            last_rebalanced_at,
        }
    }
}

/// Recorded failure of one position's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    /// Record id.
    pub id: Uuid,
    /// Position that failed.
    pub key: PositionKey,
    /// Error kind label.
    pub kind: String,
    /// Error message.
    pub message: String,
    /// Whether the failure is expected to clear on retry.
    pub transient: bool,
    /// Evaluation time.
    pub occurred_at: DateTime<Utc>,
}

impl EvaluationFailure {
    /// Builds a failure record from an engine error.
    #[must_use]
    pub fn from_error(key: PositionKey, error: &RebalanceError, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            kind: error.kind().to_string(),
            message: error.to_string(),
            transient: error.is_transient(),
            occurred_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reason_strings_are_exact() {
        assert_eq!(
            DecisionReason::InitialDeployment.as_str(),
            "Initial liquidity deployment"
        );
        assert_eq!(
            DecisionReason::Throttled.as_str(),
            "Skipped; within rebalance timeframe"
        );
        assert_eq!(DecisionReason::InRange.as_str(), "No action; position in range");
        assert_eq!(DecisionReason::BelowTrigger.as_str(), "Applied below-trigger");
        assert_eq!(DecisionReason::AboveTrigger.as_str(), "Applied above-trigger");
        assert_eq!(
            DecisionReason::PositiveBias.as_str(),
            "Applied positive bias to current price"
        );
        assert_eq!(
            DecisionReason::NegativeBias.as_str(),
            "Applied negative bias to current price"
        );
    }

    #[test]
    fn test_reason_serde_matches_taxonomy() {
        for reason in DecisionReason::ALL {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
            assert_eq!(reason.as_str().parse::<DecisionReason>().unwrap(), reason);
        }
        assert!("Rebalanced".parse::<DecisionReason>().is_err());
    }

    #[test]
    fn test_record_timestamps() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let key = PositionKey::new(3, 4);

        let skipped = DecisionRecord::new(key, 1, Decision::throttled(now));
        assert_eq!(skipped.last_checked_at, None);
        assert_eq!(skipped.last_rebalanced_at, None);

        let range = TickRange::new(-60, 60).unwrap();
        let deployed = DecisionRecord::new(key, 1, Decision::deploy(range, now));
        assert_eq!(deployed.last_checked_at, Some(now));
        assert_eq!(deployed.last_rebalanced_at, Some(now));
    }

    #[test]
    fn test_signed_bias() {
        let bias = AppliedBias {
            bias: 0.05,
            positive: false,
            explanation: String::new(),
        };
        assert_eq!(bias.signed(), -0.05);
    }

    #[test]
    fn test_failure_from_error() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let failure = EvaluationFailure::from_error(
            PositionKey::new(1, 1),
            &RebalanceError::BiasUnavailable("timed out".into()),
            now,
        );
        assert_eq!(failure.kind, "BiasUnavailable");
        assert!(failure.transient);
    }
}

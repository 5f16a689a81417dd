//! Lifecycle events for position tracking.

use chrono::{DateTime, Utc};
use lp_rebalancer_domain::entities::{DecisionReason, PositionKey, TickRange};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Type of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEventType {
    /// Liquidity was deployed for the first time.
    Deployed,
    /// Evaluation found the tick inside the range.
    Checked,
    /// Evaluation was skipped by the throttle.
    Throttled,
    /// Tick was found outside the current range.
    RangeExited,
    /// Position was moved to a new range.
    Repositioned,
    /// Evaluation failed.
    EvaluationFailed,
    /// Liquidity was withdrawn.
    Exited,
}

/// A lifecycle event for a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Event ID.
    pub id: String,
    /// Event type.
    pub event_type: LifecycleEventType,
    /// Position the event belongs to.
    pub key: PositionKey,
    /// Pool identifier.
    pub pool: String,
    /// Timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event-specific data.
    pub data: EventData,
}

impl LifecycleEvent {
    /// Creates a new lifecycle event.
    pub fn new(
        event_type: LifecycleEventType,
        key: PositionKey,
        pool: impl Into<String>,
        timestamp: DateTime<Utc>,
        data: EventData,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            key,
            pool: pool.into(),
            timestamp,
            data,
        }
    }
}

/// Event-specific data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventData {
    /// Deployment data.
    Deployed(DeployedData),
    /// Tick observation.
    Tick(TickObservation),
    /// No payload.
    Empty,
    /// Reposition data.
    Repositioned(RepositionData),
    /// Failure data.
    Failure(FailureData),
    /// Exit data.
    Exited(ExitData),
}

/// Data for a deployment event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployedData {
    /// Range the liquidity was placed on.
    pub range: TickRange,
    /// Capital deployed, in ETH.
    pub amount_eth: Decimal,
    /// Pool tick at deployment.
    pub current_tick: i32,
}

/// Tick seen during an evaluation, with the range it was compared to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickObservation {
    /// Pool tick.
    pub current_tick: i32,
    /// Range at the time of the check.
    pub range: TickRange,
}

/// Data for a reposition event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositionData {
    /// Range before the move.
    pub old_range: Option<TickRange>,
    /// Range after the move.
    pub new_range: TickRange,
    /// Epoch started by the move.
    pub epoch: u32,
    /// Reason for the move.
    pub reason: DecisionReason,
    /// Signed bias, on the bias path.
    pub bias: Option<f64>,
}

/// Data for a failed evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureData {
    /// Error kind label.
    pub kind: String,
    /// Error message.
    pub message: String,
    /// Whether a retry may succeed.
    pub transient: bool,
}

/// Data for an exit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitData {
    /// Range the position occupied when withdrawn.
    pub last_range: Option<TickRange>,
    /// Epochs the position went through.
    pub epochs: u32,
    /// Reason for exiting.
    pub reason: ExitReason,
}

/// Reason for exiting a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Operator request.
    Manual,
    /// Commission was deactivated.
    CommissionInactive,
}

//! Dual-threshold re-entry triggers.
//!
//! When the tick leaves the epoch range by at least a configured share of
//! the range span, a trigger overrides the bias path and supplies the bounds
//! the new range is centred on.

use lp_rebalancer_domain::entities::{DecisionReason, RebalanceTriggers, TickRange, TriggerSpec};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Side of the epoch range the tick left through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSide {
    /// Tick is below the lower bound.
    Below,
    /// Tick is above the upper bound.
    Above,
}

/// A trigger that fired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    /// Which trigger fired.
    pub side: TriggerSide,
    /// Configured lower bound.
    pub lower: f64,
    /// Configured upper bound.
    pub higher: f64,
    /// Deviation from the epoch range, in percent of its span.
    pub deviation_pct: f64,
}

impl TriggerOutcome {
    /// Tick the new range is centred on: midpoint of the trigger bounds.
    #[must_use]
    pub fn center_tick(&self) -> f64 {
        (self.lower + self.higher) / 2.0
    }

    /// Decision reason for this trigger.
    #[must_use]
    pub fn reason(&self) -> DecisionReason {
        match self.side {
            TriggerSide::Below => DecisionReason::BelowTrigger,
            TriggerSide::Above => DecisionReason::AboveTrigger,
        }
    }
}

/// Distance of `current_tick` outside `range`, as a percentage of its span.
///
/// Returns `None` when the tick is inside the range or the span is empty.
#[must_use]
pub fn deviation_pct(current_tick: i32, range: &TickRange) -> Option<(TriggerSide, f64)> {
    let span = range.span();
    if span <= 0 {
        warn!(lower = range.lower, upper = range.upper, "Empty range span");
        return None;
    }
    let tick = i64::from(current_tick);
    let (side, distance) = if current_tick < range.lower {
        (TriggerSide::Below, i64::from(range.lower) - tick)
    } else if current_tick > range.upper {
        (TriggerSide::Above, tick - i64::from(range.upper))
    } else {
        return None;
    };
    Some((side, distance as f64 / span as f64 * 100.0))
}

/// Evaluates the configured triggers against the epoch range.
///
/// Partially specified triggers are treated as absent. Returns `None` when no
/// trigger applies, in which case the caller falls through to the bias path.
#[must_use]
pub fn evaluate(
    current_tick: i32,
    initial_range: &TickRange,
    triggers: Option<&RebalanceTriggers>,
) -> Option<TriggerOutcome> {
    let triggers = triggers?;
    let (side, deviation) = deviation_pct(current_tick, initial_range)?;

    let spec: &TriggerSpec = match side {
        TriggerSide::Below => triggers.below.as_ref()?,
        TriggerSide::Above => triggers.above.as_ref()?,
    };
    let (by_pct, lower, higher) = spec.complete()?;

    (deviation >= by_pct).then_some(TriggerOutcome {
        side,
        lower,
        higher,
        deviation_pct: deviation,
    })
}

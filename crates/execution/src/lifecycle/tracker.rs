//! Lifecycle tracker for position history.

use super::{
    DeployedData, EventData, ExitData, FailureData, LifecycleEvent, LifecycleEventType,
    RepositionData, TickObservation,
};
use chrono::{DateTime, Utc};
use lp_rebalancer_domain::entities::{DecisionRecord, EvaluationFailure, PositionKey, TickRange};
use lp_rebalancer_domain::enums::DecisionAction;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Summary of a position's lifecycle.
#[derive(Debug, Clone)]
pub struct PositionSummary {
    /// Position key.
    pub key: PositionKey,
    /// Pool identifier.
    pub pool: String,
    /// When liquidity was first deployed.
    pub deployed_at: Option<DateTime<Utc>>,
    /// When the position was exited.
    pub exited_at: Option<DateTime<Utc>>,
    /// Latest epoch seen.
    pub epoch: u32,
    /// Latest known range.
    pub current_range: Option<TickRange>,
    /// Evaluations that reached the range check.
    pub checks: u32,
    /// Checks that found the tick in range.
    pub in_range_checks: u32,
    /// Evaluations skipped by the throttle.
    pub throttled: u32,
    /// Checks that found the tick out of range.
    pub range_exits: u32,
    /// Number of repositions.
    pub reposition_count: u32,
    /// Number of failed evaluations.
    pub failure_count: u32,
    /// Message of the latest failure.
    pub last_failure: Option<String>,
    /// Whether the position still holds liquidity.
    pub is_open: bool,
}

impl PositionSummary {
    fn new(key: PositionKey, pool: &str) -> Self {
        Self {
            key,
            pool: pool.to_string(),
            deployed_at: None,
            exited_at: None,
            epoch: 0,
            current_range: None,
            checks: 0,
            in_range_checks: 0,
            throttled: 0,
            range_exits: 0,
            reposition_count: 0,
            failure_count: 0,
            last_failure: None,
            is_open: false,
        }
    }

    /// Share of checks that found the tick in range.
    #[must_use]
    pub fn in_range_ratio(&self) -> Option<f64> {
        (self.checks > 0).then(|| f64::from(self.in_range_checks) / f64::from(self.checks))
    }
}

/// Events kept per position by default.
pub const DEFAULT_EVENT_LIMIT: usize = 1_000;

/// Tracks lifecycle events for all positions.
///
/// Each position keeps its most recent events only; summaries count
/// everything.
pub struct LifecycleTracker {
    /// Events by position, oldest first.
    events: Arc<RwLock<HashMap<PositionKey, VecDeque<LifecycleEvent>>>>,
    /// Position summaries.
    summaries: Arc<RwLock<HashMap<PositionKey, PositionSummary>>>,
    /// Events kept per position.
    event_limit: usize,
}

impl LifecycleTracker {
    /// Creates a new lifecycle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::with_event_limit(DEFAULT_EVENT_LIMIT)
    }

    /// Creates a tracker keeping at most `event_limit` events per position.
    #[must_use]
    pub fn with_event_limit(event_limit: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
            summaries: Arc::new(RwLock::new(HashMap::new())),
            event_limit: event_limit.max(1),
        }
    }

    /// Records the events implied by an applied decision.
    ///
    /// `previous_range` is the range before the evaluation; a reposition
    /// records the range exit that caused it.
    pub async fn record_decision(
        &self,
        pool: &str,
        current_tick: i32,
        amount_eth: Decimal,
        previous_range: Option<TickRange>,
        record: &DecisionRecord,
    ) {
        let key = record.key;
        let at = record.decision.timestamp;
        match record.decision.action {
            DecisionAction::Deploy => {
                if let Some(range) = record.decision.applied_new_range {
                    self.record_deployed(key, pool, range, amount_eth, current_tick, at)
                        .await;
                }
            }
            DecisionAction::SkipThrottled => self.record_throttled(key, pool, at).await,
            DecisionAction::SkipInRange => {
                if let Some(range) = previous_range {
                    self.record_checked(key, pool, current_tick, range, at).await;
                }
            }
            DecisionAction::Rebalance => {
                if let Some(range) = previous_range {
                    self.record_range_exit(key, pool, current_tick, range, at)
                        .await;
                }
                if let Some(new_range) = record.decision.applied_new_range {
                    let data = RepositionData {
                        old_range: previous_range,
                        new_range,
                        epoch: record.epoch,
                        reason: record.decision.reason,
                        bias: record.decision.bias.as_ref().map(|b| b.signed()),
                    };
                    self.record_repositioned(key, pool, data, at).await;
                }
            }
        }
    }

    /// Records a deployment event.
    pub async fn record_deployed(
        &self,
        key: PositionKey,
        pool: &str,
        range: TickRange,
        amount_eth: Decimal,
        current_tick: i32,
        at: DateTime<Utc>,
    ) {
        let event = LifecycleEvent::new(
            LifecycleEventType::Deployed,
            key,
            pool,
            at,
            EventData::Deployed(DeployedData {
                range,
                amount_eth,
                current_tick,
            }),
        );
        self.add_event(key, event).await;

        self.update(key, pool, |summary| {
            summary.deployed_at = Some(at);
            summary.epoch = 1;
            summary.current_range = Some(range);
            summary.is_open = true;
        })
        .await;

        info!(%key, %range, %amount_eth, "Position deployed");
    }

    /// Records an in-range check.
    pub async fn record_checked(
        &self,
        key: PositionKey,
        pool: &str,
        current_tick: i32,
        range: TickRange,
        at: DateTime<Utc>,
    ) {
        let event = LifecycleEvent::new(
            LifecycleEventType::Checked,
            key,
            pool,
            at,
            EventData::Tick(TickObservation {
                current_tick,
                range,
            }),
        );
        self.add_event(key, event).await;

        self.update(key, pool, |summary| {
            summary.checks += 1;
            summary.in_range_checks += 1;
        })
        .await;

        debug!(%key, current_tick, %range, "Position checked");
    }

    /// Records a throttled evaluation.
    pub async fn record_throttled(&self, key: PositionKey, pool: &str, at: DateTime<Utc>) {
        let event =
            LifecycleEvent::new(LifecycleEventType::Throttled, key, pool, at, EventData::Empty);
        self.add_event(key, event).await;
        self.update(key, pool, |summary| summary.throttled += 1).await;
    }

    /// Records the tick leaving the current range.
    pub async fn record_range_exit(
        &self,
        key: PositionKey,
        pool: &str,
        current_tick: i32,
        range: TickRange,
        at: DateTime<Utc>,
    ) {
        let event = LifecycleEvent::new(
            LifecycleEventType::RangeExited,
            key,
            pool,
            at,
            EventData::Tick(TickObservation {
                current_tick,
                range,
            }),
        );
        self.add_event(key, event).await;

        self.update(key, pool, |summary| {
            summary.checks += 1;
            summary.range_exits += 1;
        })
        .await;

        debug!(%key, current_tick, %range, "Position out of range");
    }

    /// Records a reposition event.
    pub async fn record_repositioned(
        &self,
        key: PositionKey,
        pool: &str,
        data: RepositionData,
        at: DateTime<Utc>,
    ) {
        let event = LifecycleEvent::new(
            LifecycleEventType::Repositioned,
            key,
            pool,
            at,
            EventData::Repositioned(data.clone()),
        );
        self.add_event(key, event).await;

        self.update(key, pool, |summary| {
            summary.reposition_count += 1;
            summary.epoch = data.epoch;
            summary.current_range = Some(data.new_range);
            summary.is_open = true;
        })
        .await;

        info!(
            %key,
            old_range = ?data.old_range,
            new_range = %data.new_range,
            epoch = data.epoch,
            reason = %data.reason,
            "Position repositioned"
        );
    }

    /// Records a failed evaluation.
    pub async fn record_failure(&self, pool: &str, failure: &EvaluationFailure) {
        let key = failure.key;
        let event = LifecycleEvent::new(
            LifecycleEventType::EvaluationFailed,
            key,
            pool,
            failure.occurred_at,
            EventData::Failure(FailureData {
                kind: failure.kind.clone(),
                message: failure.message.clone(),
                transient: failure.transient,
            }),
        );
        self.add_event(key, event).await;

        self.update(key, pool, |summary| {
            summary.failure_count += 1;
            summary.last_failure = Some(failure.message.clone());
        })
        .await;
    }

    /// Records an exit event.
    pub async fn record_exited(
        &self,
        key: PositionKey,
        pool: &str,
        data: ExitData,
        at: DateTime<Utc>,
    ) {
        let event = LifecycleEvent::new(
            LifecycleEventType::Exited,
            key,
            pool,
            at,
            EventData::Exited(data.clone()),
        );
        self.add_event(key, event).await;

        self.update(key, pool, |summary| {
            summary.exited_at = Some(at);
            summary.is_open = false;
        })
        .await;

        info!(%key, epochs = data.epochs, reason = ?data.reason, "Position exited");
    }

    async fn update(&self, key: PositionKey, pool: &str, f: impl FnOnce(&mut PositionSummary)) {
        let mut summaries = self.summaries.write().await;
        f(summaries
            .entry(key)
            .or_insert_with(|| PositionSummary::new(key, pool)));
    }

    /// Adds an event to the tracker.
    async fn add_event(&self, key: PositionKey, event: LifecycleEvent) {
        let mut events = self.events.write().await;
        let log = events.entry(key).or_default();
        if log.len() >= self.event_limit {
            log.pop_front();
        }
        log.push_back(event);
    }

    /// Gets all events for a position.
    pub async fn get_events(&self, key: &PositionKey) -> Vec<LifecycleEvent> {
        self.events
            .read()
            .await
            .get(key)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Gets the summary for a position.
    pub async fn get_summary(&self, key: &PositionKey) -> Option<PositionSummary> {
        self.summaries.read().await.get(key).cloned()
    }

    /// Gets all position summaries.
    pub async fn get_all_summaries(&self) -> Vec<PositionSummary> {
        self.summaries.read().await.values().cloned().collect()
    }

    /// Gets summaries for open positions only.
    pub async fn get_open_positions(&self) -> Vec<PositionSummary> {
        self.summaries
            .read()
            .await
            .values()
            .filter(|s| s.is_open)
            .cloned()
            .collect()
    }

    /// Gets aggregate statistics.
    pub async fn get_aggregate_stats(&self) -> AggregateStats {
        let summaries = self.summaries.read().await;

        let mut stats = AggregateStats::default();
        let mut ratios = Vec::new();

        for summary in summaries.values() {
            stats.total_positions += 1;
            if summary.is_open {
                stats.open_positions += 1;
            }
            if summary.exited_at.is_some() {
                stats.exited_positions += 1;
            }

            stats.total_checks += summary.checks;
            stats.total_range_exits += summary.range_exits;
            stats.total_repositions += summary.reposition_count;
            stats.total_failures += summary.failure_count;
            ratios.extend(summary.in_range_ratio());
        }

        if !ratios.is_empty() {
            stats.avg_in_range_ratio = ratios.iter().sum::<f64>() / ratios.len() as f64;
        }

        stats
    }
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate statistics across all positions.
#[derive(Debug, Clone, Default)]
pub struct AggregateStats {
    /// Total positions tracked.
    pub total_positions: u32,
    /// Positions holding liquidity.
    pub open_positions: u32,
    /// Exited positions.
    pub exited_positions: u32,
    /// Range checks performed.
    pub total_checks: u32,
    /// Checks that found the tick out of range.
    pub total_range_exits: u32,
    /// Repositions performed.
    pub total_repositions: u32,
    /// Failed evaluations.
    pub total_failures: u32,
    /// Mean in-range ratio over positions that were checked.
    pub avg_in_range_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lp_rebalancer_domain::RebalanceError;
    use lp_rebalancer_domain::entities::{Decision, DecisionReason};

    const POOL: &str = "mainnet:ETH/USDC:0.3";

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_tracker() {
        let tracker = LifecycleTracker::new();
        let key = PositionKey::new(3, 9);
        let first = TickRange::new(-840, 720).unwrap();
        let second = TickRange::new(1200, 2700).unwrap();

        let deploy = DecisionRecord::new(key, 1, Decision::deploy(first, at(0)));
        tracker
            .record_decision(POOL, 0, Decimal::ONE, None, &deploy)
            .await;

        let check = DecisionRecord::new(key, 1, Decision::in_range(at(15)));
        tracker
            .record_decision(POOL, 100, Decimal::ONE, Some(first), &check)
            .await;

        let throttled = DecisionRecord::new(key, 1, Decision::throttled(at(20)));
        tracker
            .record_decision(POOL, 100, Decimal::ONE, Some(first), &throttled)
            .await;

        let moved = DecisionRecord::new(
            key,
            2,
            Decision::rebalance(DecisionReason::AboveTrigger, second, None, at(30)),
        );
        tracker
            .record_decision(POOL, 2000, Decimal::ONE, Some(first), &moved)
            .await;

        let types: Vec<_> = tracker
            .get_events(&key)
            .await
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                LifecycleEventType::Deployed,
                LifecycleEventType::Checked,
                LifecycleEventType::Throttled,
                LifecycleEventType::RangeExited,
                LifecycleEventType::Repositioned,
            ]
        );

        let summary = tracker.get_summary(&key).await.unwrap();
        assert!(summary.is_open);
        assert_eq!(summary.epoch, 2);
        assert_eq!(summary.current_range, Some(second));
        assert_eq!(summary.checks, 2);
        assert_eq!(summary.throttled, 1);
        assert_eq!(summary.reposition_count, 1);
        assert_eq!(summary.in_range_ratio(), Some(0.5));
    }

    #[tokio::test]
    async fn test_event_log_keeps_latest_events() {
        let tracker = LifecycleTracker::with_event_limit(3);
        let key = PositionKey::new(2, 5);
        for minute in 0..5 {
            tracker.record_throttled(key, POOL, at(minute)).await;
        }

        let events = tracker.get_events(&key).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].timestamp, at(2));
        assert_eq!(events[2].timestamp, at(4));
        assert_eq!(tracker.get_summary(&key).await.unwrap().throttled, 5);
    }

    #[tokio::test]
    async fn test_failures_and_exit_in_aggregate_stats() {
        let tracker = LifecycleTracker::new();
        let key = PositionKey::new(1, 1);
        let range = TickRange::new(-60, 60).unwrap();

        tracker
            .record_deployed(key, POOL, range, Decimal::ONE, 0, at(0))
            .await;
        let failure = EvaluationFailure::from_error(
            key,
            &RebalanceError::BiasUnavailable("timeout".into()),
            at(15),
        );
        tracker.record_failure(POOL, &failure).await;
        tracker
            .record_exited(
                key,
                POOL,
                ExitData {
                    last_range: Some(range),
                    epochs: 1,
                    reason: super::super::ExitReason::Manual,
                },
                at(20),
            )
            .await;

        let summary = tracker.get_summary(&key).await.unwrap();
        assert!(!summary.is_open);
        assert_eq!(summary.failure_count, 1);
        assert!(summary.last_failure.unwrap().contains("timeout"));

        let stats = tracker.get_aggregate_stats().await;
        assert_eq!(stats.total_positions, 1);
        assert_eq!(stats.open_positions, 0);
        assert_eq!(stats.exited_positions, 1);
        assert_eq!(stats.total_failures, 1);
        assert!(tracker.get_open_positions().await.is_empty());
    }
}

//! Batch driver: evaluates every active commission once per pass.

use super::RebalancePolicyEngine;
use crate::lifecycle::{ExitData, ExitReason, LifecycleTracker, PositionLifecycle};
use anyhow::Context;
use chrono::{DateTime, Utc};
use lp_rebalancer_domain::RebalanceError;
use lp_rebalancer_domain::entities::{
    Commission, DecisionRecord, EvaluationFailure, MarketSnapshot, PositionKey, PositionState,
};
use lp_rebalancer_domain::enums::DecisionAction;
use lp_rebalancer_domain::ports::{MarketDataSource, PositionStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Configuration for strategy execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Interval between passes in seconds.
    pub eval_interval_secs: u64,
    /// Positions evaluated concurrently.
    pub max_concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            eval_interval_secs: 300, // 5 minutes
            max_concurrency: 8,
        }
    }
}

/// Result of one position within a pass.
#[derive(Debug, Clone)]
pub enum PositionOutcome {
    /// A decision was applied and recorded.
    Decided(DecisionRecord),
    /// The evaluation failed and the failure was recorded.
    Failed(EvaluationFailure),
    /// Another evaluation of the same position was in flight.
    Busy(PositionKey),
    /// The position is exited and was not evaluated.
    Exited(PositionKey),
    /// Loading or saving state failed.
    StoreFailed {
        /// Position concerned.
        key: PositionKey,
        /// Store error.
        message: String,
    },
}

impl PositionOutcome {
    /// Position the outcome belongs to.
    #[must_use]
    pub fn key(&self) -> PositionKey {
        match self {
            Self::Decided(record) => record.key,
            Self::Failed(failure) => failure.key,
            Self::Busy(key) | Self::Exited(key) | Self::StoreFailed { key, .. } => *key,
        }
    }
}

/// Counters and outcomes of one pass.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Evaluation time used for every position.
    pub evaluated_at: DateTime<Utc>,
    pub deployed: u32,
    pub rebalanced: u32,
    pub in_range: u32,
    pub throttled: u32,
    pub failed: u32,
    pub busy: u32,
    pub exited: u32,
    pub store_errors: u32,
    /// Per-position outcomes, in completion order.
    pub outcomes: Vec<PositionOutcome>,
}

impl BatchReport {
    fn new(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluated_at,
            deployed: 0,
            rebalanced: 0,
            in_range: 0,
            throttled: 0,
            failed: 0,
            busy: 0,
            exited: 0,
            store_errors: 0,
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: PositionOutcome) {
        match &outcome {
            PositionOutcome::Decided(record) => match record.decision.action {
                DecisionAction::Deploy => self.deployed += 1,
                DecisionAction::Rebalance => self.rebalanced += 1,
                DecisionAction::SkipInRange => self.in_range += 1,
                DecisionAction::SkipThrottled => self.throttled += 1,
            },
            PositionOutcome::Failed(_) => self.failed += 1,
            PositionOutcome::Busy(_) => self.busy += 1,
            PositionOutcome::Exited(_) => self.exited += 1,
            PositionOutcome::StoreFailed { .. } => self.store_errors += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Number of positions in the pass.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcome for one position.
    #[must_use]
    pub fn outcome(&self, key: PositionKey) -> Option<&PositionOutcome> {
        self.outcomes.iter().find(|o| o.key() == key)
    }
}

type PositionLocks = Arc<Mutex<HashMap<PositionKey, Arc<Mutex<()>>>>>;

/// Runs the policy engine over all active commissions.
///
/// Pool ticks are read once per pool and market snapshots once per ticker
/// in each pass. Positions are evaluated concurrently; a failure in one does
/// not affect the others. Evaluations of the same position never overlap.
pub struct StrategyExecutor {
    /// Policy engine.
    engine: Arc<RebalancePolicyEngine>,
    /// Commission and state persistence.
    store: Arc<dyn PositionStore>,
    /// Market data feed.
    market: Arc<dyn MarketDataSource>,
    /// Lifecycle tracker.
    lifecycle: Arc<LifecycleTracker>,
    /// One lock per position.
    locks: PositionLocks,
    /// Configuration.
    config: ExecutorConfig,
    /// Running flag.
    running: AtomicBool,
    /// Wakes the loop started by [`StrategyExecutor::start`] on stop.
    shutdown: Notify,
}

impl StrategyExecutor {
    /// Creates a new strategy executor.
    pub fn new(
        engine: Arc<RebalancePolicyEngine>,
        store: Arc<dyn PositionStore>,
        market: Arc<dyn MarketDataSource>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            engine,
            store,
            market,
            lifecycle: Arc::new(LifecycleTracker::new()),
            locks: Arc::new(Mutex::new(HashMap::new())),
            config,
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Gets the lifecycle tracker.
    pub fn lifecycle(&self) -> &Arc<LifecycleTracker> {
        &self.lifecycle
    }

    /// Returns true while the loop started by [`StrategyExecutor::start`] runs.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the evaluation loop.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);

        let eval_interval = Duration::from_secs(self.config.eval_interval_secs);
        let mut ticker = interval(eval_interval);

        info!(
            interval_secs = self.config.eval_interval_secs,
            max_concurrency = self.config.max_concurrency,
            "Starting strategy executor"
        );

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                biased;
                () = self.shutdown.notified() => break,
                _ = ticker.tick() => {}
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            if let Err(e) = self.run_once(Utc::now()).await {
                error!(error = %e, "Evaluation pass failed");
            }
        }

        info!("Strategy executor stopped");
    }

    /// Stops the evaluation loop.
    ///
    /// A pass in progress runs to completion; [`StrategyExecutor::start`]
    /// returns once it has finished.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Evaluates every active commission once at `now`.
    ///
    /// # Errors
    /// Returns an error only if the commission list cannot be loaded;
    /// per-position failures are reported in the [`BatchReport`].
    pub async fn run_once(&self, now: DateTime<Utc>) -> anyhow::Result<BatchReport> {
        let commissions: Vec<Commission> = self
            .store
            .active_commissions()
            .await
            .context("loading active commissions")?
            .into_iter()
            .filter(|c| c.is_active)
            .collect();

        debug!(count = commissions.len(), "Evaluating positions");
        self.prune_locks(&commissions).await;

        let ticks = self.read_ticks(&commissions).await;
        let snapshots = self.read_snapshots(&commissions).await;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for commission in commissions {
            let pool = &commission.config.pool_details;
            let tick = ticks
                .get(&pool.pool_id())
                .cloned()
                .unwrap_or_else(|| Err(format!("no tick read for {}", pool.pool_id())));
            let ticker = pool.price_ticker();
            let snapshot = snapshots
                .get(ticker)
                .cloned()
                .unwrap_or_else(|| Arc::new(MarketSnapshot::empty(ticker)));
            let lock = self.lock_for(commission.key).await;
            let worker = self.worker();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                worker.evaluate(commission, lock, tick, snapshot, now).await
            });
        }

        let mut report = BatchReport::new(now);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => error!(error = %e, "Evaluation task aborted"),
            }
        }

        info!(
            positions = report.total(),
            deployed = report.deployed,
            rebalanced = report.rebalanced,
            in_range = report.in_range,
            throttled = report.throttled,
            failed = report.failed,
            busy = report.busy,
            "Evaluation pass complete"
        );
        Ok(report)
    }

    /// Withdraws a position and marks it exited.
    ///
    /// Waits for any in-flight evaluation of the same position.
    ///
    /// # Errors
    /// Fails if the venue rejects the withdrawal, the position is already
    /// exited, or the store cannot be read or written.
    pub async fn exit_position(
        &self,
        commission: &Commission,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PositionState> {
        let key = commission.key;
        let lock = self.lock_for(key).await;
        let _guard = lock.lock_owned().await;

        let mut state = self
            .store
            .load_state(key)
            .await?
            .unwrap_or_else(|| PositionState::unseeded(key));
        let last_range = state.current_range;

        let pool = &commission.config.pool_details;
        PositionLifecycle::exit(self.engine.venue().as_ref(), pool, &mut state, now).await?;
        self.store.save_state(&state).await?;

        self.lifecycle
            .record_exited(
                key,
                &pool.pool_id(),
                ExitData {
                    last_range,
                    epochs: state.epoch,
                    reason,
                },
                now,
            )
            .await;
        Ok(state)
    }

    async fn read_ticks(&self, commissions: &[Commission]) -> HashMap<String, Result<i32, String>> {
        let mut ticks = HashMap::new();
        for commission in commissions {
            let pool = &commission.config.pool_details;
            let pool_id = pool.pool_id();
            if ticks.contains_key(&pool_id) {
                continue;
            }
            let tick = self.engine.venue().current_tick(pool).await.map_err(|e| {
                warn!(pool = %pool_id, error = %e, "Failed to read pool tick");
                format!("reading tick of {pool_id}: {e}")
            });
            ticks.insert(pool_id, tick);
        }
        ticks
    }

    async fn read_snapshots(
        &self,
        commissions: &[Commission],
    ) -> HashMap<&'static str, Arc<MarketSnapshot>> {
        let mut snapshots = HashMap::new();
        for commission in commissions {
            let ticker = commission.config.pool_details.price_ticker();
            if snapshots.contains_key(ticker) {
                continue;
            }
            let snapshot = match self.market.latest_snapshot(ticker).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    debug!(ticker, "No market snapshot");
                    MarketSnapshot::empty(ticker)
                }
                Err(e) => {
                    warn!(ticker, error = %e, "Failed to read market snapshot");
                    MarketSnapshot::empty(ticker)
                }
            };
            snapshots.insert(ticker, Arc::new(snapshot));
        }
        snapshots
    }

    async fn lock_for(&self, key: PositionKey) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(key).or_default().clone()
    }

    /// Drops the locks of positions that left the active set and are not
    /// held or awaited.
    async fn prune_locks(&self, commissions: &[Commission]) {
        let active: HashSet<PositionKey> = commissions.iter().map(|c| c.key).collect();
        self.locks
            .lock()
            .await
            .retain(|key, lock| active.contains(key) || Arc::strong_count(lock) > 1);
    }

    fn worker(&self) -> Worker {
        Worker {
            engine: self.engine.clone(),
            store: self.store.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

/// Evaluates one position inside a spawned task.
struct Worker {
    engine: Arc<RebalancePolicyEngine>,
    store: Arc<dyn PositionStore>,
    lifecycle: Arc<LifecycleTracker>,
}

impl Worker {
    async fn evaluate(
        self,
        commission: Commission,
        lock: Arc<Mutex<()>>,
        tick: Result<i32, String>,
        snapshot: Arc<MarketSnapshot>,
        now: DateTime<Utc>,
    ) -> PositionOutcome {
        let key = commission.key;
        let Ok(_guard) = lock.try_lock_owned() else {
            debug!(%key, "Evaluation already in flight");
            return PositionOutcome::Busy(key);
        };

        match self.apply(&commission, tick, &snapshot, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%key, error = %e, "Position store failed");
                PositionOutcome::StoreFailed {
                    key,
                    message: format!("{e:#}"),
                }
            }
        }
    }

    async fn apply(
        &self,
        commission: &Commission,
        tick: Result<i32, String>,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PositionOutcome> {
        let key = commission.key;
        let pool = commission.config.pool_details.pool_id();

        let mut state = self
            .store
            .load_state(key)
            .await
            .context("loading position state")?
            .unwrap_or_else(|| PositionState::unseeded(key));
        if state.stage.is_terminal() {
            debug!(%key, "Skipping exited position");
            return Ok(PositionOutcome::Exited(key));
        }

        let before = state.clone();
        let previous_range = state.current_range;
        let result = match tick {
            Ok(tick) => self
                .engine
                .evaluate(now, commission, &mut state, tick, snapshot)
                .await
                .map(|decision| (tick, decision)),
            Err(message) => Err(RebalanceError::VenueExecutionFailed(message)),
        };

        if state != before {
            self.store
                .save_state(&state)
                .await
                .context("saving position state")?;
        }

        match result {
            Ok((tick, decision)) => {
                let record = DecisionRecord::new(key, state.epoch, decision);
                self.store
                    .append_decision(&record)
                    .await
                    .context("appending decision")?;
                self.lifecycle
                    .record_decision(&pool, tick, commission.amount_eth, previous_range, &record)
                    .await;
                Ok(PositionOutcome::Decided(record))
            }
            Err(error) => {
                warn!(%key, error = %error, transient = error.is_transient(), "Evaluation failed");
                let failure = EvaluationFailure::from_error(key, &error, now);
                self.store
                    .record_failure(&failure)
                    .await
                    .context("recording failure")?;
                self.lifecycle.record_failure(&pool, &failure).await;
                Ok(PositionOutcome::Failed(failure))
            }
        }
    }
}

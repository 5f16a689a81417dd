//! In-memory store for dry runs and tests.

use anyhow::Result;
use async_trait::async_trait;
use lp_rebalancer_domain::entities::{
    Commission, DecisionRecord, EvaluationFailure, MarketSnapshot, PositionKey, PositionState,
};
use lp_rebalancer_domain::ports::{MarketDataSource, PositionStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    commissions: Vec<Commission>,
    states: HashMap<PositionKey, PositionState>,
    decisions: Vec<DecisionRecord>,
    failures: Vec<EvaluationFailure>,
    snapshots: HashMap<String, MarketSnapshot>,
}

/// Keeps commissions, state, history and snapshots in memory.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a commission, replacing any with the same key.
    pub async fn add_commission(&self, commission: Commission) {
        let mut tables = self.tables.write().await;
        tables.commissions.retain(|c| c.key != commission.key);
        tables.commissions.push(commission);
    }

    /// Sets the latest snapshot for its ticker.
    pub async fn set_snapshot(&self, snapshot: MarketSnapshot) {
        self.tables
            .write()
            .await
            .snapshots
            .insert(snapshot.ticker.clone(), snapshot);
    }

    /// Saved state of a position.
    pub async fn state(&self, key: PositionKey) -> Option<PositionState> {
        self.tables.read().await.states.get(&key).cloned()
    }

    /// Decisions of a position, oldest first.
    pub async fn decisions(&self, key: PositionKey) -> Vec<DecisionRecord> {
        self.tables
            .read()
            .await
            .decisions
            .iter()
            .filter(|d| d.key == key)
            .cloned()
            .collect()
    }

    /// Failures of a position, oldest first.
    pub async fn failures(&self, key: PositionKey) -> Vec<EvaluationFailure> {
        self.tables
            .read()
            .await
            .failures
            .iter()
            .filter(|f| f.key == key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PositionStore for InMemoryStore {
    async fn active_commissions(&self) -> Result<Vec<Commission>> {
        Ok(self
            .tables
            .read()
            .await
            .commissions
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn load_state(&self, key: PositionKey) -> Result<Option<PositionState>> {
        Ok(self.state(key).await)
    }

    async fn save_state(&self, state: &PositionState) -> Result<()> {
        self.tables
            .write()
            .await
            .states
            .insert(state.key, state.clone());
        Ok(())
    }

    async fn append_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.tables.write().await.decisions.push(record.clone());
        Ok(())
    }

    async fn record_failure(&self, failure: &EvaluationFailure) -> Result<()> {
        self.tables.write().await.failures.push(failure.clone());
        Ok(())
    }
}

#[async_trait]
impl MarketDataSource for InMemoryStore {
    async fn latest_snapshot(&self, ticker: &str) -> Result<Option<MarketSnapshot>> {
        Ok(self.tables.read().await.snapshots.get(ticker).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lp_rebalancer_domain::RebalanceError;
    use lp_rebalancer_domain::entities::{Decision, PoolConfig};
    use rust_decimal_macros::dec;

    fn commission(user_id: i64, is_active: bool) -> Commission {
        Commission {
            key: PositionKey::new(1, user_id),
            amount_eth: dec!(1),
            is_active,
            config: PoolConfig::from_json(
                r#"{
                    "pool_details": {"chain": "mainnet", "fee_tier": 1.0, "token_pair": "WBTC/ETH"},
                    "liquidity_range": {"lower": 0.2, "higher": 0.2},
                    "max_slippage": 1,
                    "rebalance_timeframe": 30
                }"#,
            )
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_only_active_commissions_are_listed() {
        let store = InMemoryStore::new();
        store.add_commission(commission(1, true)).await;
        store.add_commission(commission(2, false)).await;
        store.add_commission(commission(1, true)).await;

        let active = store.active_commissions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].key, PositionKey::new(1, 1));
    }

    #[tokio::test]
    async fn test_state_and_history() {
        let store = InMemoryStore::new();
        let key = PositionKey::new(1, 1);
        assert!(store.load_state(key).await.unwrap().is_none());

        let state = PositionState::unseeded(key);
        store.save_state(&state).await.unwrap();
        assert_eq!(store.load_state(key).await.unwrap(), Some(state));

        let now = Utc::now();
        store
            .append_decision(&DecisionRecord::new(key, 0, Decision::throttled(now)))
            .await
            .unwrap();
        store
            .record_failure(&EvaluationFailure::from_error(
                key,
                &RebalanceError::PositionExited,
                now,
            ))
            .await
            .unwrap();

        assert_eq!(store.decisions(key).await.len(), 1);
        assert_eq!(store.failures(key).await.len(), 1);
        assert!(store.decisions(PositionKey::new(9, 9)).await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_by_ticker() {
        let store = InMemoryStore::new();
        let mut snapshot = MarketSnapshot::empty("BTC-USD");
        snapshot.close_price = Some(64_000.0);
        store.set_snapshot(snapshot.clone()).await;

        assert_eq!(
            store.latest_snapshot("BTC-USD").await.unwrap(),
            Some(snapshot)
        );
        assert_eq!(store.latest_snapshot("ETH-USD").await.unwrap(), None);
    }
}

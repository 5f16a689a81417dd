//! Postgres-backed store for the batch driver.

use crate::repositories::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lp_rebalancer_domain::entities::{
    Commission, DecisionRecord, EvaluationFailure, MarketSnapshot, PositionKey, PositionState,
};
use lp_rebalancer_domain::ports::{MarketDataSource, PositionStore};
use tracing::warn;

/// Implements the store and market data ports over the repositories.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    /// Creates a store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connects to `database_url` and runs the migrations.
    ///
    /// # Errors
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = Database::connect(database_url)
            .await
            .context("connecting to database")?;
        db.migrate().await.context("running migrations")?;
        Ok(Self::new(db))
    }

    /// Writes commissions and their agent configurations.
    ///
    /// # Errors
    /// Returns an error if a write fails.
    pub async fn import_commissions(&self, commissions: &[Commission]) -> Result<()> {
        let repo = self.db.commissions();
        for commission in commissions {
            let key = commission.key;
            repo.upsert_agent(
                key.agent_id,
                &format!("agent-{}", key.agent_id),
                &commission.config,
            )
            .await
            .with_context(|| format!("saving agent {}", key.agent_id))?;
            repo.upsert(key, commission.amount_eth, commission.is_active)
                .await
                .with_context(|| format!("saving commission {key}"))?;
        }
        Ok(())
    }

    /// Saves a market snapshot.
    ///
    /// # Errors
    /// Returns an error if the snapshot has no time or the write fails.
    pub async fn save_snapshot(&self, snapshot: &MarketSnapshot) -> Result<()> {
        Ok(self.db.market().save(snapshot).await?)
    }

    /// Latest decisions and failures of a position, newest first.
    ///
    /// # Errors
    /// Returns an error if a query fails.
    pub async fn history(
        &self,
        key: PositionKey,
        limit: i64,
    ) -> Result<(Vec<DecisionRecord>, Vec<EvaluationFailure>)> {
        let decisions = self.db.decisions().find_recent(key, limit).await?;
        let failures = self.db.decisions().find_failures(key, limit).await?;
        Ok((decisions, failures))
    }

    /// Underlying database.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PositionStore for PgStore {
    async fn active_commissions(&self) -> Result<Vec<Commission>> {
        let records = self.db.commissions().find_active().await?;
        let mut commissions = Vec::with_capacity(records.len());
        for record in records {
            let key = PositionKey::new(record.agent_id, record.user_id);
            match record.into_commission() {
                Ok(commission) => commissions.push(commission),
                Err(e) => warn!(%key, error = %e, "Skipping commission with invalid config"),
            }
        }
        Ok(commissions)
    }

    async fn load_state(&self, key: PositionKey) -> Result<Option<PositionState>> {
        Ok(self.db.positions().find(key).await?)
    }

    async fn save_state(&self, state: &PositionState) -> Result<()> {
        Ok(self.db.positions().upsert(state).await?)
    }

    async fn append_decision(&self, record: &DecisionRecord) -> Result<()> {
        Ok(self.db.decisions().append(record).await?)
    }

    async fn record_failure(&self, failure: &EvaluationFailure) -> Result<()> {
        Ok(self.db.decisions().record_failure(failure).await?)
    }
}

#[async_trait]
impl MarketDataSource for PgStore {
    async fn latest_snapshot(&self, ticker: &str) -> Result<Option<MarketSnapshot>> {
        Ok(self.db.market().find_latest(ticker).await?)
    }
}

//! Append-only decision and failure history.

use super::{enum_from_text, enum_to_text, range_from_columns};
use lp_rebalancer_domain::entities::{
    AppliedBias, Decision, DecisionRecord, EvaluationFailure, PositionKey,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

fn decision_from_row(row: &PgRow) -> Result<DecisionRecord, sqlx::Error> {
    let action: String = row.try_get("action")?;
    let reason: String = row.try_get("reason")?;
    let epoch: i32 = row.try_get("epoch")?;
    let bias: Option<f64> = row.try_get("rebalance_bias")?;
    let positive: Option<bool> = row.try_get("positive_bias")?;
    let logic: Option<String> = row.try_get("rebalance_logic")?;
    let id: Uuid = row.try_get("id")?;

    let bias = match (bias, positive) {
        (Some(bias), Some(positive)) => Some(AppliedBias {
            bias,
            positive,
            explanation: logic.unwrap_or_default(),
        }),
        _ => None,
    };

    Ok(DecisionRecord {
        id,
        key: PositionKey::new(row.try_get("agent_id")?, row.try_get("user_id")?),
        epoch: u32::try_from(epoch).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        decision: Decision {
            action: enum_from_text(&action)?,
            reason: enum_from_text(&reason)?,
            rebalance_occurred: row.try_get("rebalance_occurred")?,
            bias,
            applied_new_range: range_from_columns(
                row.try_get("new_lower")?,
                row.try_get("new_upper")?,
            )?,
            timestamp: row.try_get("decided_at")?,
        },
        last_checked_at: row.try_get("last_checked_at")?,
        last_rebalanced_at: row.try_get("last_rebalanced_at")?,
    })
}

fn failure_from_row(row: &PgRow) -> Result<EvaluationFailure, sqlx::Error> {
    let id: Uuid = row.try_get("id")?;
    Ok(EvaluationFailure {
        id,
        key: PositionKey::new(row.try_get("agent_id")?, row.try_get("user_id")?),
        kind: row.try_get("kind")?,
        message: row.try_get("message")?,
        transient: row.try_get("transient")?,
        occurred_at: row.try_get("occurred_at")?,
    })
}

/// Repository for the decision history.
#[derive(Clone)]
pub struct DecisionRepository {
    pool: Arc<PgPool>,
}

impl DecisionRepository {
    /// Creates a new DecisionRepository.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Appends a decision.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn append(&self, record: &DecisionRecord) -> Result<(), sqlx::Error> {
        let decision = &record.decision;
        let epoch = i32::try_from(record.epoch).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query(
            r#"
            INSERT INTO rebalance_decisions (id, agent_id, user_id, epoch, action, reason,
                                             rebalance_occurred, rebalance_bias, positive_bias,
                                             rebalance_logic, new_lower, new_upper,
                                             last_checked_at, last_rebalanced_at, decided_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.id)
        .bind(record.key.agent_id)
        .bind(record.key.user_id)
        .bind(epoch)
        .bind(enum_to_text(&decision.action)?)
        .bind(decision.reason.as_str())
        .bind(decision.rebalance_occurred)
        .bind(decision.bias.as_ref().map(|b| b.bias))
        .bind(decision.bias.as_ref().map(|b| b.positive))
        .bind(decision.bias.as_ref().map(|b| b.explanation.as_str()))
        .bind(decision.applied_new_range.map(|r| r.lower))
        .bind(decision.applied_new_range.map(|r| r.upper))
        .bind(record.last_checked_at)
        .bind(record.last_rebalanced_at)
        .bind(decision.timestamp)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Finds the latest decisions of a position, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_recent(
        &self,
        key: PositionKey,
        limit: i64,
    ) -> Result<Vec<DecisionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM rebalance_decisions
            WHERE agent_id = $1 AND user_id = $2
            ORDER BY decided_at DESC
            LIMIT $3
            "#,
        )
        .bind(key.agent_id)
        .bind(key.user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.iter().map(decision_from_row).collect()
    }

    /// Appends a failed evaluation.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn record_failure(&self, failure: &EvaluationFailure) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO evaluation_failures (id, agent_id, user_id, kind, message, transient,
                                             occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(failure.id)
        .bind(failure.key.agent_id)
        .bind(failure.key.user_id)
        .bind(&failure.kind)
        .bind(&failure.message)
        .bind(failure.transient)
        .bind(failure.occurred_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Finds the latest failures of a position, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_failures(
        &self,
        key: PositionKey,
        limit: i64,
    ) -> Result<Vec<EvaluationFailure>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM evaluation_failures
            WHERE agent_id = $1 AND user_id = $2
            ORDER BY occurred_at DESC
            LIMIT $3
            "#,
        )
        .bind(key.agent_id)
        .bind(key.user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.iter().map(failure_from_row).collect()
    }
}

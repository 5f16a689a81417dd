//! Position state repository.

use super::{enum_from_text, enum_to_text, range_from_columns};
use lp_rebalancer_domain::entities::{LiquidityAmounts, PositionKey, PositionState};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::sync::Arc;

fn state_from_row(row: &PgRow) -> Result<PositionState, sqlx::Error> {
    let stage: String = row.try_get("stage")?;
    let epoch: i32 = row.try_get("epoch")?;
    let amounts: Json<LiquidityAmounts> = row.try_get("liquidity_amounts")?;

    Ok(PositionState {
        key: PositionKey::new(row.try_get("agent_id")?, row.try_get("user_id")?),
        stage: enum_from_text(&stage)?,
        epoch: u32::try_from(epoch).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        current_range: range_from_columns(
            row.try_get("current_lower")?,
            row.try_get("current_upper")?,
        )?,
        initial_range: range_from_columns(
            row.try_get("initial_lower")?,
            row.try_get("initial_upper")?,
        )?,
        last_checked_at: row.try_get("last_checked_at")?,
        last_rebalanced_at: row.try_get("last_rebalanced_at")?,
        liquidity_amounts: amounts.0,
        venue_position_id: row.try_get("venue_position_id")?,
    })
}

/// Repository for position state.
#[derive(Clone)]
pub struct PositionRepository {
    pool: Arc<PgPool>,
}

impl PositionRepository {
    /// Creates a new PositionRepository.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Finds the state of a position.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row is inconsistent.
    pub async fn find(&self, key: PositionKey) -> Result<Option<PositionState>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM position_states WHERE agent_id = $1 AND user_id = $2")
            .bind(key.agent_id)
            .bind(key.user_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.as_ref().map(state_from_row).transpose()
    }

    /// Creates or replaces the state of a position.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn upsert(&self, state: &PositionState) -> Result<(), sqlx::Error> {
        let epoch = i32::try_from(state.epoch).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query(
            r#"
            INSERT INTO position_states (agent_id, user_id, stage, epoch,
                                         current_lower, current_upper,
                                         initial_lower, initial_upper,
                                         last_checked_at, last_rebalanced_at,
                                         liquidity_amounts, venue_position_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (agent_id, user_id) DO UPDATE SET
                stage = EXCLUDED.stage,
                epoch = EXCLUDED.epoch,
                current_lower = EXCLUDED.current_lower,
                current_upper = EXCLUDED.current_upper,
                initial_lower = EXCLUDED.initial_lower,
                initial_upper = EXCLUDED.initial_upper,
                last_checked_at = EXCLUDED.last_checked_at,
                last_rebalanced_at = EXCLUDED.last_rebalanced_at,
                liquidity_amounts = EXCLUDED.liquidity_amounts,
                venue_position_id = EXCLUDED.venue_position_id,
                updated_at = NOW()
            "#,
        )
        .bind(state.key.agent_id)
        .bind(state.key.user_id)
        .bind(enum_to_text(&state.stage)?)
        .bind(epoch)
        .bind(state.current_range.map(|r| r.lower))
        .bind(state.current_range.map(|r| r.upper))
        .bind(state.initial_range.map(|r| r.lower))
        .bind(state.initial_range.map(|r| r.upper))
        .bind(state.last_checked_at)
        .bind(state.last_rebalanced_at)
        .bind(Json(state.liquidity_amounts))
        .bind(state.venue_position_id.as_deref())
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}

//! Commission repository: which users follow which agent, and with what.

use lp_rebalancer_domain::entities::{Commission, PoolConfig, PositionKey};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// Database record for a commission joined with its agent's configuration.
#[derive(Debug, Clone)]
pub struct CommissionRecord {
    /// Agent ID.
    pub agent_id: i64,
    /// User ID.
    pub user_id: i64,
    /// Capital in ETH.
    pub amount_eth: Decimal,
    /// Whether the commission is active.
    pub is_active: bool,
    /// Raw agent configuration.
    pub config: serde_json::Value,
}

impl CommissionRecord {
    /// Creates a CommissionRecord from a database row.
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let config: Json<serde_json::Value> = row.try_get("config")?;
        Ok(Self {
            agent_id: row.try_get("agent_id")?,
            user_id: row.try_get("user_id")?,
            amount_eth: row.try_get("amount_eth")?,
            is_active: row.try_get("is_active")?,
            config: config.0,
        })
    }

    /// Parses the agent configuration into a commission.
    ///
    /// # Errors
    /// Returns an error if the configuration does not match [`PoolConfig`].
    pub fn into_commission(self) -> Result<Commission, serde_json::Error> {
        Ok(Commission {
            key: PositionKey::new(self.agent_id, self.user_id),
            amount_eth: self.amount_eth,
            is_active: self.is_active,
            config: serde_json::from_value(self.config)?,
        })
    }
}

/// Repository for commission and agent operations.
#[derive(Clone)]
pub struct CommissionRepository {
    pool: Arc<PgPool>,
}

impl CommissionRepository {
    /// Creates a new CommissionRepository.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Finds active commissions of active agents.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_active(&self) -> Result<Vec<CommissionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT c.agent_id, c.user_id, c.amount_eth, c.is_active, a.config
            FROM user_commissions c
            JOIN agents a ON a.id = c.agent_id
            WHERE c.is_active AND a.is_active
            ORDER BY c.agent_id, c.user_id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.iter().map(CommissionRecord::from_row).collect()
    }

    /// Creates or updates an agent and its configuration.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn upsert_agent(
        &self,
        agent_id: i64,
        name: &str,
        config: &PoolConfig,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO agents (id, name, config)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                config = EXCLUDED.config
            "#,
        )
        .bind(agent_id)
        .bind(name)
        .bind(Json(config))
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Creates or updates a commission.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn upsert(
        &self,
        key: PositionKey,
        amount_eth: Decimal,
        is_active: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_commissions (agent_id, user_id, amount_eth, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (agent_id, user_id) DO UPDATE SET
                amount_eth = EXCLUDED.amount_eth,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(key.agent_id)
        .bind(key.user_id)
        .bind(amount_eth)
        .bind(is_active)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_record_into_commission() {
        let record = CommissionRecord {
            agent_id: 4,
            user_id: 11,
            amount_eth: dec!(0.75),
            is_active: true,
            config: serde_json::json!({
                "pool_details": {"chain": "mainnet", "fee_tier": 0.05, "token_pair": "ETH/USDC"},
                "liquidity_range": {"lower": 0.1, "higher": 0.1},
                "buffer": 0.01,
                "max_slippage": 0.5,
                "rebalance_timeframe": 60,
                "rebalance_strategies": ["Rsi", "MACD"]
            }),
        };

        let commission = record.into_commission().unwrap();
        assert_eq!(commission.key, PositionKey::new(4, 11));
        assert_eq!(commission.amount_eth, dec!(0.75));
        assert_eq!(commission.config.rebalance_interval_minutes, 60);
    }

    #[test]
    fn test_malformed_config_is_rejected() {
        let record = CommissionRecord {
            agent_id: 4,
            user_id: 11,
            amount_eth: dec!(1),
            is_active: true,
            config: serde_json::json!({"pool_details": "nope"}),
        };
        assert!(record.into_commission().is_err());
    }
}

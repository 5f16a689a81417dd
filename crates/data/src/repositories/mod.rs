//! Repository implementations for database persistence.
//!
//! This module provides repository patterns for storing and retrieving
//! commissions, position state, decision history and market snapshots.

mod commission_repository;
mod decision_repository;
mod market_repository;
mod position_repository;

pub use commission_repository::{CommissionRecord, CommissionRepository};
pub use decision_repository::DecisionRepository;
pub use market_repository::MarketRepository;
pub use position_repository::PositionRepository;

use lp_rebalancer_domain::entities::TickRange;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use std::sync::Arc;

/// Database connection wrapper for repositories.
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Creates a new Database wrapper from a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Creates a new database connection from a connection string.
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    ///
    /// # Errors
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates a CommissionRepository instance.
    #[must_use]
    pub fn commissions(&self) -> CommissionRepository {
        CommissionRepository::new(self.pool.clone())
    }

    /// Creates a PositionRepository instance.
    #[must_use]
    pub fn positions(&self) -> PositionRepository {
        PositionRepository::new(self.pool.clone())
    }

    /// Creates a DecisionRepository instance.
    #[must_use]
    pub fn decisions(&self) -> DecisionRepository {
        DecisionRepository::new(self.pool.clone())
    }

    /// Creates a MarketRepository instance.
    #[must_use]
    pub fn market(&self) -> MarketRepository {
        MarketRepository::new(self.pool.clone())
    }

    /// Runs database migrations.
    ///
    /// # Errors
    /// Returns an error if migrations fail.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(include_str!("../../migrations/001_initial_schema.sql"))
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}

/// Text form of a unit enum, as serde names it.
pub(crate) fn enum_to_text<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(text)) => Ok(text),
        Ok(other) => Err(sqlx::Error::Encode(
            format!("expected a string, got {other}").into(),
        )),
        Err(e) => Err(sqlx::Error::Encode(Box::new(e))),
    }
}

/// Parses a unit enum from its serde name.
pub(crate) fn enum_from_text<T: DeserializeOwned>(text: &str) -> Result<T, sqlx::Error> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Builds a range from a pair of nullable columns.
pub(crate) fn range_from_columns(
    lower: Option<i32>,
    upper: Option<i32>,
) -> Result<Option<TickRange>, sqlx::Error> {
    match (lower, upper) {
        (Some(lower), Some(upper)) => TickRange::new(lower, upper)
            .map(Some)
            .map_err(|e| sqlx::Error::Decode(Box::new(e))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_rebalancer_domain::entities::DecisionReason;
    use lp_rebalancer_domain::enums::LifecycleStage;

    #[test]
    fn test_enum_text_round_trip() {
        assert_eq!(enum_to_text(&LifecycleStage::OutOfRange).unwrap(), "OutOfRange");
        assert_eq!(
            enum_from_text::<LifecycleStage>("InRange").unwrap(),
            LifecycleStage::InRange
        );
        assert_eq!(
            enum_to_text(&DecisionReason::BelowTrigger).unwrap(),
            "Applied below-trigger"
        );
        assert!(enum_from_text::<LifecycleStage>("Sideways").is_err());
    }

    #[test]
    fn test_range_from_columns() {
        assert_eq!(
            range_from_columns(Some(-60), Some(60)).unwrap(),
            Some(TickRange::new(-60, 60).unwrap())
        );
        assert_eq!(range_from_columns(None, Some(60)).unwrap(), None);
        assert!(range_from_columns(Some(60), Some(60)).is_err());
    }
}

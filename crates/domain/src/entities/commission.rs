use super::pool_config::PoolConfig;
use super::position::PositionKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user's subscription to an agent: the unit the batch driver evaluates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    /// Position managed for this commission.
    pub key: PositionKey,
    /// Capital to deploy, in ETH.
    pub amount_eth: Decimal,
    /// Whether the commission is currently active.
    pub is_active: bool,
    /// Agent configuration.
    pub config: PoolConfig,
}

use crate::enums::Indicator;
use crate::error::RebalanceError;
use crate::fees;
use crate::math::RangeSpec;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity of the pool a configuration targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDetails {
    /// Chain name or id (e.g. "mainnet", "sepolia").
    #[serde(alias = "chain_id")]
    pub chain: String,
    /// Fee tier as a percentage (0.3 for 0.3%).
    pub fee_tier: f64,
    /// Token pair, e.g. "ETH/USDC".
    pub token_pair: String,
}

impl PoolDetails {
    /// Stable identifier used to share venue reads between positions.
    #[must_use]
    pub fn pool_id(&self) -> String {
        format!("{}:{}:{}", self.chain, self.token_pair, self.fee_tier)
    }

    /// Ticker of the price feed backing this pair.
    #[must_use]
    pub fn price_ticker(&self) -> &'static str {
        match self.token_pair.as_str() {
            "ETH/USDC" | "USDC/ETH" => "ETH-USD",
            _ => "BTC-USD",
        }
    }

    /// Tick spacing for the pool's fee tier.
    ///
    /// # Errors
    /// Returns `UnsupportedFeeTier` if the tier is unknown.
    pub fn tick_spacing(&self) -> Result<i32, RebalanceError> {
        fees::tick_spacing(self.fee_tier)
    }
}

/// Base range widths, as fractions of the reference price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityRange {
    /// Width below the reference price.
    pub lower: f64,
    /// Width above the reference price.
    #[serde(alias = "upper")]
    pub higher: f64,
}

/// One side of a dual re-entry trigger.
///
/// A trigger is only active when all three values are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Deviation from the epoch range, in percent of its span.
    #[serde(alias = "by")]
    pub by_pct: Option<f64>,
    /// Lower bound applied when the trigger fires.
    #[serde(alias = "lower_pct")]
    pub lower: Option<f64>,
    /// Upper bound applied when the trigger fires.
    #[serde(alias = "higher_pct")]
    pub higher: Option<f64>,
}

impl TriggerSpec {
    /// Creates a fully specified trigger.
    #[must_use]
    pub fn new(by_pct: f64, lower: f64, higher: f64) -> Self {
        Self {
            by_pct: Some(by_pct),
            lower: Some(lower),
            higher: Some(higher),
        }
    }

    /// Returns `(by_pct, lower, higher)` if the trigger is fully specified.
    #[must_use]
    pub fn complete(&self) -> Option<(f64, f64, f64)> {
        Some((self.by_pct?, self.lower?, self.higher?))
    }
}

/// Dual-threshold triggers evaluated when the tick leaves the range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RebalanceTriggers {
    /// Trigger for ticks below the epoch range.
    #[serde(default)]
    pub below: Option<TriggerSpec>,
    /// Trigger for ticks above the epoch range.
    #[serde(default)]
    pub above: Option<TriggerSpec>,
}

/// Token amounts committed to a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityAmounts {
    /// Amount of token0.
    #[serde(default)]
    pub amount_token0: Decimal,
    /// Amount of token1.
    #[serde(default)]
    pub amount_token1: Decimal,
}

/// Range policy for one agent, immutable for the life of an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Target pool.
    pub pool_details: PoolDetails,
    /// Base range widths.
    pub liquidity_range: LiquidityRange,
    /// Extra width on both sides of the range.
    #[serde(default)]
    pub buffer: f64,
    /// Maximum slippage tolerated by the venue, as a fraction.
    pub max_slippage: Decimal,
    /// Throttle window between evaluations, in minutes.
    #[serde(alias = "rebalance_timeframe")]
    pub rebalance_interval_minutes: u32,
    /// Optional dual triggers.
    #[serde(default)]
    pub rebalance_triggers: Option<RebalanceTriggers>,
    /// Indicator names the bias oracle should weigh.
    #[serde(default)]
    pub rebalance_strategies: Vec<String>,
    /// Token amounts recorded on the position.
    #[serde(default)]
    pub liquidity_amounts: LiquidityAmounts,
}

impl PoolConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    /// Returns an error if the JSON does not match the schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Range spec built from the base range and buffer.
    #[must_use]
    pub fn base_range_spec(&self) -> RangeSpec {
        RangeSpec::new(
            self.liquidity_range.lower,
            self.liquidity_range.higher,
            self.buffer,
        )
    }

    /// Throttle window.
    #[must_use]
    pub fn rebalance_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.rebalance_interval_minutes))
    }

    /// Known indicators listed in `rebalance_strategies`; unknown names are dropped.
    #[must_use]
    pub fn indicators(&self) -> Vec<Indicator> {
        let mut out = Vec::new();
        for indicator in self
            .rebalance_strategies
            .iter()
            .filter_map(|name| Indicator::from_name(name))
        {
            if !out.contains(&indicator) {
                out.push(indicator);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const AGENT_CONFIG: &str = r#"{
        "pool_details": {"chain": "sepolia", "fee_tier": 0.3, "token_pair": "ETH/USDC"},
        "liquidity_range": {"lower": 0.08, "higher": 0.08},
        "buffer": 0.01,
        "max_slippage": 0.5,
        "rebalance_timeframe": 15,
        "time_buffer": 30,
        "tags": ["eth"],
        "rebalance_strategies": ["Rsi", "Bollinger Bands", "Stochastic", "Rsi"],
        "rebalance_triggers": {
            "below": {"by": 2.5, "lower": 1, "higher": 1},
            "above": {"by": 2.5, "lower": 1}
        },
        "liquidity_amounts": {"amount_token0": 100, "amount_token1": "0.05"}
    }"#;

    #[test]
    fn test_parse_agent_config() {
        let config = PoolConfig::from_json(AGENT_CONFIG).unwrap();
        assert_eq!(config.pool_details.fee_tier, 0.3);
        assert_eq!(config.pool_details.tick_spacing().unwrap(), 60);
        assert_eq!(config.rebalance_interval_minutes, 15);
        assert_eq!(config.rebalance_interval(), chrono::Duration::minutes(15));
        assert_eq!(config.max_slippage, dec!(0.5));
        assert_eq!(config.liquidity_amounts.amount_token1, dec!(0.05));

        let spec = config.base_range_spec();
        assert_eq!(spec, RangeSpec::new(0.08, 0.08, 0.01));
    }

    #[test]
    fn test_partial_trigger_is_incomplete() {
        let config = PoolConfig::from_json(AGENT_CONFIG).unwrap();
        let triggers = config.rebalance_triggers.unwrap();
        assert_eq!(
            triggers.below.unwrap().complete(),
            Some((2.5, 1.0, 1.0))
        );
        assert_eq!(triggers.above.unwrap().complete(), None);
    }

    #[test]
    fn test_indicators_deduplicated_and_filtered() {
        let config = PoolConfig::from_json(AGENT_CONFIG).unwrap();
        assert_eq!(
            config.indicators(),
            vec![Indicator::Rsi, Indicator::BollingerBands]
        );
    }

    #[test]
    fn test_price_ticker() {
        let mut details = PoolDetails {
            chain: "mainnet".into(),
            fee_tier: 0.05,
            token_pair: "USDC/ETH".into(),
        };
        assert_eq!(details.price_ticker(), "ETH-USD");
        details.token_pair = "WBTC/USDC".into();
        assert_eq!(details.price_ticker(), "BTC-USD");
        assert_eq!(details.pool_id(), "mainnet:WBTC/USDC:0.05");
    }
}

//! Deterministic bias from indicator thresholds.
//!
//! Each selected directional indicator votes +1 (price expected to rise),
//! -1 (expected to fall) or 0. The bias direction is the sign of the mean
//! vote and its magnitude is `|mean| * max_bias`, widened by relative
//! volatility when ATR, Volatility or Price Range is selected.

use anyhow::{Result, bail};
use async_trait::async_trait;
use lp_rebalancer_domain::entities::{MarketSnapshot, PoolConfig};
use lp_rebalancer_domain::enums::Indicator;
use lp_rebalancer_domain::ports::{BiasAssessment, BiasOracle};
use tracing::debug;

/// Thresholds for [`IndicatorRulesOracle`].
#[derive(Debug, Clone, Copy)]
pub struct RulesConfig {
    /// Bias magnitude when every indicator agrees.
    pub max_bias: f64,
    /// RSI below this votes up.
    pub rsi_oversold: f64,
    /// RSI above this votes down.
    pub rsi_overbought: f64,
    /// Upper bound on the volatility multiplier.
    pub max_volatility_scale: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_bias: 0.05,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            max_volatility_scale: 2.0,
        }
    }
}

/// Reproducible oracle driven only by the market snapshot.
#[derive(Debug, Clone, Default)]
pub struct IndicatorRulesOracle {
    config: RulesConfig,
}

impl IndicatorRulesOracle {
    /// Creates an oracle with custom thresholds.
    #[must_use]
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    fn vote(&self, indicator: Indicator, close: f64, s: &MarketSnapshot) -> Option<(i32, String)> {
        match indicator {
            Indicator::Rsi => {
                let rsi = s.rsi?;
                let vote = if rsi < self.config.rsi_oversold {
                    1
                } else if rsi > self.config.rsi_overbought {
                    -1
                } else {
                    0
                };
                Some((vote, format!("RSI {rsi:.1}")))
            }
            Indicator::BollingerBands => {
                let (lower, upper) = (s.bb_lower?, s.bb_upper?);
                let vote = if close < lower {
                    1
                } else if close > upper {
                    -1
                } else {
                    0
                };
                Some((vote, format!("close {close:.2} vs bands [{lower:.2}, {upper:.2}]")))
            }
            Indicator::Macd => {
                let histogram = s.macd_histogram?;
                Some((sign(histogram), format!("MACD histogram {histogram:.4}")))
            }
            Indicator::Vwap => {
                let vwap = s.vwap?;
                Some((sign(vwap - close), format!("close {close:.2} vs VWAP {vwap:.2}")))
            }
            Indicator::Atr | Indicator::Volatility | Indicator::PriceRange => None,
        }
    }

    fn volatility_scale(&self, indicators: &[Indicator], close: f64, s: &MarketSnapshot) -> f64 {
        indicators
            .iter()
            .filter_map(|indicator| match indicator {
                Indicator::Atr => s.atr,
                Indicator::Volatility => s.volatility,
                _ => None,
            })
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| 1.0 + v / close)
            .fold(1.0_f64, f64::max)
            .min(self.config.max_volatility_scale)
    }
}

fn sign(value: f64) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

#[async_trait]
impl BiasOracle for IndicatorRulesOracle {
    async fn assess(
        &self,
        config: &PoolConfig,
        snapshot: &MarketSnapshot,
    ) -> Result<BiasAssessment> {
        let Some(close) = snapshot.close_price.filter(|_| snapshot.has_price()) else {
            bail!("no close price for {}", snapshot.ticker);
        };

        let mut indicators = config.indicators();
        if indicators.is_empty() {
            indicators = Indicator::ALL.to_vec();
        }

        let votes: Vec<(i32, String)> = indicators
            .iter()
            .filter_map(|indicator| self.vote(*indicator, close, snapshot))
            .collect();
        if votes.is_empty() {
            bail!("no directional indicator data for {}", snapshot.ticker);
        }

        let score = votes.iter().map(|(v, _)| f64::from(*v)).sum::<f64>() / votes.len() as f64;
        let scale = self.volatility_scale(&indicators, close, snapshot);
        let bias = score.abs() * self.config.max_bias * scale;

        let notes: Vec<String> = votes
            .iter()
            .map(|(vote, note)| format!("{note} ({vote:+})"))
            .collect();
        let explanation = format!(
            "{}; score {score:.2}, volatility scale {scale:.2}",
            notes.join(", ")
        );
        debug!(ticker = %snapshot.ticker, score, bias, "Rules oracle assessment");

        Ok(BiasAssessment {
            bias,
            positive: score >= 0.0,
            explanation,
        })
    }

    fn name(&self) -> &'static str {
        "indicator-rules"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategies: &[&str]) -> PoolConfig {
        let mut config = PoolConfig::from_json(
            r#"{
                "pool_details": {"chain": "sepolia", "fee_tier": 0.3, "token_pair": "ETH/USDC"},
                "liquidity_range": {"lower": 0.08, "higher": 0.08},
                "max_slippage": 0.5,
                "rebalance_timeframe": 15
            }"#,
        )
        .unwrap();
        config.rebalance_strategies = strategies.iter().map(|s| s.to_string()).collect();
        config
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            ticker: "ETH-USD".into(),
            close_price: Some(2_000.0),
            rsi: Some(25.0),
            bb_lower: Some(2_050.0),
            bb_upper: Some(2_300.0),
            macd_histogram: Some(-1.5),
            vwap: Some(2_100.0),
            atr: Some(400.0),
            ..MarketSnapshot::default()
        }
    }

    #[tokio::test]
    async fn test_all_up_votes_give_full_positive_bias() {
        let oracle = IndicatorRulesOracle::default();
        let answer = oracle
            .assess(&config(&["Rsi", "Bollinger Bands", "VWAP"]), &snapshot())
            .await
            .unwrap();
        assert!(answer.positive);
        assert!((answer.bias - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_mixed_votes_average() {
        let oracle = IndicatorRulesOracle::default();
        // RSI up, MACD down: score 0.
        let answer = oracle
            .assess(&config(&["Rsi", "MACD"]), &snapshot())
            .await
            .unwrap();
        assert!(answer.positive);
        assert_eq!(answer.bias, 0.0);

        let answer = oracle.assess(&config(&["MACD"]), &snapshot()).await.unwrap();
        assert!(!answer.positive);
        assert!((answer.bias - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_volatility_widens_bias() {
        let oracle = IndicatorRulesOracle::default();
        // ATR / close = 0.2 -> scale 1.2.
        let answer = oracle
            .assess(&config(&["Rsi", "ATR"]), &snapshot())
            .await
            .unwrap();
        assert!((answer.bias - 0.06).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_price_range_does_not_scale_bias() {
        let oracle = IndicatorRulesOracle::default();
        let wide = MarketSnapshot {
            price_range: Some(800.0),
            ..snapshot()
        };
        let answer = oracle
            .assess(&config(&["Rsi", "Price Range"]), &wide)
            .await
            .unwrap();
        assert!((answer.bias - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_is_deterministic() {
        let oracle = IndicatorRulesOracle::default();
        let cfg = config(&["Rsi", "Bollinger Bands", "MACD", "ATR"]);
        let first = oracle.assess(&cfg, &snapshot()).await.unwrap();
        let second = oracle.assess(&cfg, &snapshot()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_data_fails() {
        let oracle = IndicatorRulesOracle::default();
        assert!(
            oracle
                .assess(&config(&["Rsi"]), &MarketSnapshot::empty("ETH-USD"))
                .await
                .is_err()
        );

        let only_close = MarketSnapshot {
            close_price: Some(2_000.0),
            ..MarketSnapshot::empty("ETH-USD")
        };
        assert!(oracle.assess(&config(&["Rsi"]), &only_close).await.is_err());
    }
}

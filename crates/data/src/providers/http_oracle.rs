//! Model-backed bias oracle reached over HTTP.
//!
//! Posts the pool configuration, the latest market snapshot and a reference
//! of the selected indicators to a JSON endpoint, and reads back
//! `{answer, positive, bias}`.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use lp_rebalancer_domain::entities::{MarketSnapshot, PoolConfig};
use lp_rebalancer_domain::enums::Indicator;
use lp_rebalancer_domain::ports::{BiasAssessment, BiasOracle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Connection settings for [`HttpBiasOracle`].
#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    /// Endpoint receiving the POST.
    pub url: String,
    /// Bearer token, if the endpoint needs one.
    pub api_key: Option<String>,
    /// Model name forwarded to the endpoint.
    pub model: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct IndicatorReference {
    description: &'static str,
    fields: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct OracleRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    config: &'a PoolConfig,
    market: &'a MarketSnapshot,
    indicator_reference: BTreeMap<&'static str, IndicatorReference>,
}

#[derive(Debug, Deserialize)]
struct OracleAnswer {
    answer: String,
    positive: bool,
    bias: f64,
}

/// Bias oracle backed by a remote model.
pub struct HttpBiasOracle {
    client: reqwest::Client,
    config: HttpOracleConfig,
}

impl HttpBiasOracle {
    /// Creates a new oracle.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpOracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building oracle HTTP client")?;
        Ok(Self { client, config })
    }

    /// Builds the request body for `config` and `snapshot`.
    fn request<'a>(
        &'a self,
        config: &'a PoolConfig,
        snapshot: &'a MarketSnapshot,
    ) -> OracleRequest<'a> {
        let mut indicators = config.indicators();
        if indicators.is_empty() {
            indicators = Indicator::ALL.to_vec();
        }
        let indicator_reference = indicators
            .into_iter()
            .map(|indicator| {
                (
                    indicator.name(),
                    IndicatorReference {
                        description: indicator.description(),
                        fields: indicator.fields(),
                    },
                )
            })
            .collect();

        OracleRequest {
            model: self.config.model.as_deref(),
            config,
            market: snapshot,
            indicator_reference,
        }
    }

    /// Parses and validates a response body.
    fn parse_answer(body: &str) -> Result<BiasAssessment> {
        let answer: OracleAnswer =
            serde_json::from_str(body).context("malformed oracle response")?;
        let assessment = BiasAssessment {
            bias: answer.bias,
            positive: answer.positive,
            explanation: answer.answer,
        };
        assessment.validate()?;
        Ok(assessment)
    }
}

#[async_trait]
impl BiasOracle for HttpBiasOracle {
    async fn assess(
        &self,
        config: &PoolConfig,
        snapshot: &MarketSnapshot,
    ) -> Result<BiasAssessment> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&self.request(config, snapshot));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("oracle request failed: {e}"))?;
        let status = response.status();
        let body = response.text().await.context("reading oracle response")?;
        if !status.is_success() {
            bail!("oracle returned {status}: {body}");
        }

        let assessment = Self::parse_answer(&body)?;
        debug!(
            ticker = %snapshot.ticker,
            bias = assessment.bias,
            positive = assessment.positive,
            "Oracle answered"
        );
        Ok(assessment)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> HttpBiasOracle {
        HttpBiasOracle::new(HttpOracleConfig {
            url: "http://localhost:9/bias".into(),
            api_key: None,
            model: Some("gpt-4o".into()),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    fn config(strategies: &str) -> PoolConfig {
        PoolConfig::from_json(&format!(
            r#"{{
                "pool_details": {{"chain": "mainnet", "fee_tier": 0.3, "token_pair": "ETH/USDC"}},
                "liquidity_range": {{"lower": 0.08, "higher": 0.08}},
                "max_slippage": 0.5,
                "rebalance_timeframe": 15,
                "rebalance_strategies": {strategies}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_parse_valid_answer() {
        let assessment = HttpBiasOracle::parse_answer(
            r#"{"answer": "RSI oversold", "positive": true, "bias": 0.04}"#,
        )
        .unwrap();
        assert_eq!(assessment.bias, 0.04);
        assert!(assessment.positive);
        assert_eq!(assessment.explanation, "RSI oversold");
    }

    #[test]
    fn test_parse_rejects_bad_answers() {
        assert!(HttpBiasOracle::parse_answer("not json").is_err());
        assert!(HttpBiasOracle::parse_answer(r#"{"answer": "x", "positive": true}"#).is_err());
        assert!(
            HttpBiasOracle::parse_answer(r#"{"answer": "x", "positive": false, "bias": -0.05}"#)
                .is_err()
        );
    }

    #[test]
    fn test_request_carries_selected_indicators() {
        let oracle = oracle();
        let config = config(r#"["Rsi", "VWAP", "Unknown"]"#);
        let snapshot = MarketSnapshot::empty("ETH-USD");

        let body = serde_json::to_value(oracle.request(&config, &snapshot)).unwrap();
        let reference = body["indicator_reference"].as_object().unwrap();
        assert_eq!(reference.len(), 2);
        assert!(reference.contains_key("Rsi"));
        assert_eq!(reference["VWAP"]["fields"][0], "vwap");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["market"]["ticker"], "ETH-USD");
    }

    #[test]
    fn test_request_defaults_to_all_indicators() {
        let oracle = oracle();
        let config = config("[]");
        let snapshot = MarketSnapshot::empty("ETH-USD");

        let body = serde_json::to_value(oracle.request(&config, &snapshot)).unwrap();
        assert_eq!(
            body["indicator_reference"].as_object().unwrap().len(),
            Indicator::ALL.len()
        );
    }
}

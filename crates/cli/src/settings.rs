//! Runtime settings read from the environment.

use anyhow::{Context, Result, bail};
use lp_rebalancer_data::{HttpBiasOracle, HttpOracleConfig};
use lp_rebalancer_domain::ports::BiasOracle;
use lp_rebalancer_execution::oracle::IndicatorRulesOracle;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which bias oracle to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OracleKind {
    /// Deterministic indicator rules.
    Rules,
    /// Remote model over HTTP.
    Http,
}

impl FromStr for OracleKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "http" => Ok(Self::Http),
            other => bail!("unknown bias oracle '{other}', expected 'rules' or 'http'"),
        }
    }
}

/// Settings shared by all commands.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub oracle: OracleKind,
    pub oracle_url: Option<String>,
    pub oracle_api_key: Option<String>,
    pub oracle_model: Option<String>,
    pub oracle_timeout: Duration,
    pub eval_interval_secs: u64,
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let oracle = match non_empty("BIAS_ORACLE") {
            Some(value) => value.parse()?,
            None => OracleKind::Rules,
        };
        let oracle_timeout_secs = match non_empty("ORACLE_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("invalid ORACLE_TIMEOUT_SECS '{value}'"))?,
            None => 30,
        };
        let eval_interval_secs = match non_empty("EVAL_INTERVAL_SECS") {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("invalid EVAL_INTERVAL_SECS '{value}'"))?,
            None => 300,
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            oracle,
            oracle_url: non_empty("BIAS_ORACLE_URL"),
            oracle_api_key: non_empty("BIAS_ORACLE_API_KEY"),
            oracle_model: non_empty("BIAS_ORACLE_MODEL"),
            oracle_timeout: Duration::from_secs(oracle_timeout_secs),
            eval_interval_secs,
        })
    }

    /// Builds the configured bias oracle.
    ///
    /// # Errors
    /// Returns an error if the HTTP oracle is selected without a URL.
    pub fn bias_oracle(&self) -> Result<Arc<dyn BiasOracle>> {
        match self.oracle {
            OracleKind::Rules => Ok(Arc::new(IndicatorRulesOracle::default())),
            OracleKind::Http => {
                let Some(url) = self.oracle_url.clone() else {
                    bail!("BIAS_ORACLE=http requires BIAS_ORACLE_URL");
                };
                Ok(Arc::new(HttpBiasOracle::new(HttpOracleConfig {
                    url,
                    api_key: self.oracle_api_key.clone(),
                    model: self.oracle_model.clone(),
                    timeout: self.oracle_timeout,
                })?))
            }
        }
    }
}

/// Parses a `<pool_id>=<tick>` argument.
///
/// # Errors
/// Returns an error if the separator or the tick is missing.
pub fn parse_pool_tick(arg: &str) -> Result<(String, i32)> {
    let Some((pool, tick)) = arg.rsplit_once('=') else {
        bail!("expected <pool_id>=<tick>, got '{arg}'");
    };
    let tick = tick
        .trim()
        .parse()
        .with_context(|| format!("invalid tick in '{arg}'"))?;
    Ok((pool.trim().to_string(), tick))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.database_url, None);
        assert_eq!(settings.oracle, OracleKind::Rules);
        assert_eq!(settings.oracle_timeout, Duration::from_secs(30));
        assert_eq!(settings.eval_interval_secs, 300);
        assert!(settings.bias_oracle().is_ok());
    }

    #[test]
    fn test_http_oracle_requires_url() {
        let settings = settings(&[("BIAS_ORACLE", "http"), ("ORACLE_TIMEOUT_SECS", "5")]).unwrap();
        assert_eq!(settings.oracle_timeout, Duration::from_secs(5));
        assert!(settings.bias_oracle().is_err());

        let settings = settings_with_url();
        assert_eq!(settings.bias_oracle().unwrap().name(), "http");
    }

    fn settings_with_url() -> Settings {
        settings(&[
            ("BIAS_ORACLE", "HTTP"),
            ("BIAS_ORACLE_URL", "http://localhost:8080/bias"),
        ])
        .unwrap()
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(settings(&[("BIAS_ORACLE", "magic")]).is_err());
        assert!(settings(&[("EVAL_INTERVAL_SECS", "soon")]).is_err());
        assert_eq!(settings(&[("DATABASE_URL", " ")]).unwrap().database_url, None);
    }

    #[test]
    fn test_parse_pool_tick() {
        assert_eq!(
            parse_pool_tick("mainnet:ETH/USDC:0.3=-1200").unwrap(),
            ("mainnet:ETH/USDC:0.3".to_string(), -1200)
        );
        assert!(parse_pool_tick("mainnet:ETH/USDC:0.3").is_err());
        assert!(parse_pool_tick("pool=abc").is_err());
    }
}

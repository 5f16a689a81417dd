use anyhow::{Result, anyhow};
use async_trait::async_trait;
use lp_rebalancer_domain::entities::{MarketSnapshot, PoolConfig};
use lp_rebalancer_domain::ports::{BiasAssessment, BiasOracle};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Oracle returning a fixed assessment, or failing when none is set.
pub struct StaticBiasOracle {
    answer: Option<BiasAssessment>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl StaticBiasOracle {
    /// Oracle that always answers `bias` in direction `positive`.
    #[must_use]
    pub fn new(bias: f64, positive: bool) -> Self {
        Self {
            answer: Some(BiasAssessment {
                bias,
                positive,
                explanation: format!(
                    "static {} bias of {bias}",
                    if positive { "positive" } else { "negative" }
                ),
            }),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Oracle that always fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            answer: None,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Delays every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times the oracle was consulted.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiasOracle for StaticBiasOracle {
    async fn assess(
        &self,
        _config: &PoolConfig,
        _snapshot: &MarketSnapshot,
    ) -> Result<BiasAssessment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer
            .clone()
            .ok_or_else(|| anyhow!("static oracle has no answer"))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

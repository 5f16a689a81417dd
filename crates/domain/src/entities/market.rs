use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest OHLC and indicator values for a price feed.
///
/// Passed opaquely to the bias oracle. Every value is optional because the
/// upstream feed fills indicators lazily.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Feed ticker, e.g. "ETH-USD".
    pub ticker: String,
    /// Candle time.
    pub observed_at: Option<DateTime<Utc>>,
    pub open_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub close_price: Option<f64>,
    pub volume: Option<f64>,
    pub rsi: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub volatility: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub atr: Option<f64>,
    pub price_range: Option<f64>,
    pub vwap: Option<f64>,
}

impl MarketSnapshot {
    /// Snapshot with no data, used when the feed could not be read.
    #[must_use]
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    /// Returns true if at least a close price is known.
    #[must_use]
    pub fn has_price(&self) -> bool {
        self.close_price.is_some_and(|p| p.is_finite() && p > 0.0)
    }
}

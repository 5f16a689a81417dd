use serde::{Deserialize, Serialize};

/// Stage of a position within its lifecycle.
///
/// `Unseeded -> Deployed -> {InRange, OutOfRange} -> Deployed (new epoch)`,
/// with `Exited` as a terminal stage reached only through an explicit exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleStage {
    /// No position has been deployed yet.
    #[default]
    Unseeded,
    /// Freshly deployed or repositioned, not yet checked.
    Deployed,
    /// Last check found the tick inside the current range.
    InRange,
    /// Tick was found outside the current range.
    OutOfRange,
    /// Liquidity was withdrawn; terminal.
    Exited,
}

impl LifecycleStage {
    /// Returns true if the stage is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited)
    }

    /// Returns true if capital is currently deployed.
    #[must_use]
    pub fn has_position(&self) -> bool {
        matches!(self, Self::Deployed | Self::InRange | Self::OutOfRange)
    }
}

/// Action chosen by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionAction {
    /// Initial deployment of liquidity.
    Deploy,
    /// Evaluation skipped because the throttle window has not elapsed.
    SkipThrottled,
    /// Evaluation found the position in range.
    SkipInRange,
    /// Position was moved to a new range.
    Rebalance,
}

impl DecisionAction {
    /// Returns true if the action moved capital.
    #[must_use]
    pub fn moves_capital(&self) -> bool {
        matches!(self, Self::Deploy | Self::Rebalance)
    }
}

/// Technical indicators a pool configuration can ask the oracle to weigh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    /// Relative strength index.
    #[serde(alias = "RSI")]
    Rsi,
    /// Bollinger bands.
    #[serde(rename = "Bollinger Bands")]
    BollingerBands,
    /// Moving average convergence divergence.
    #[serde(rename = "MACD")]
    Macd,
    /// Average true range.
    #[serde(rename = "ATR")]
    Atr,
    /// Rolling standard deviation of price.
    Volatility,
    /// Volume weighted average price.
    #[serde(rename = "VWAP")]
    Vwap,
    /// High/low spread.
    #[serde(rename = "Price Range")]
    PriceRange,
}

impl Indicator {
    /// Parses an indicator from its configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rsi" => Some(Self::Rsi),
            "bollinger bands" | "bollinger" => Some(Self::BollingerBands),
            "macd" => Some(Self::Macd),
            "atr" => Some(Self::Atr),
            "volatility" => Some(Self::Volatility),
            "vwap" => Some(Self::Vwap),
            "price range" => Some(Self::PriceRange),
            _ => None,
        }
    }

    /// Configuration name of the indicator.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rsi => "Rsi",
            Self::BollingerBands => "Bollinger Bands",
            Self::Macd => "MACD",
            Self::Atr => "ATR",
            Self::Volatility => "Volatility",
            Self::Vwap => "VWAP",
            Self::PriceRange => "Price Range",
        }
    }

    /// One-line description handed to model-backed oracles.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Rsi => {
                "Momentum oscillator; values near 100 suggest overbought, near 0 oversold."
            }
            Self::BollingerBands => {
                "Moving average with two standard-deviation bands; price near the upper band is expensive, near the lower band cheap."
            }
            Self::Macd => {
                "Difference of short and long EMAs with a signal line; the histogram shows momentum shifts."
            }
            Self::Atr => "Average true range; large values mean large price swings.",
            Self::Volatility => "Standard deviation of price around its average.",
            Self::Vwap => {
                "Volume weighted average price; price far above or below it signals over- or undervaluation."
            }
            Self::PriceRange => "Spread between high and low over the period.",
        }
    }

    /// Snapshot fields the indicator reads.
    #[must_use]
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Self::Rsi => &["rsi"],
            Self::BollingerBands => &["bb_upper", "bb_middle", "bb_lower"],
            Self::Macd => &["macd", "macd_signal", "macd_histogram"],
            Self::Atr => &["atr"],
            Self::Volatility => &["volatility"],
            Self::Vwap => &["vwap"],
            Self::PriceRange => &["price_range"],
        }
    }

    /// All known indicators.
    pub const ALL: [Indicator; 7] = [
        Self::Rsi,
        Self::BollingerBands,
        Self::Macd,
        Self::Atr,
        Self::Volatility,
        Self::Vwap,
        Self::PriceRange,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_names_round_trip() {
        for indicator in Indicator::ALL {
            assert_eq!(Indicator::from_name(indicator.name()), Some(indicator));
        }
        assert_eq!(Indicator::from_name("Stochastic"), None);
    }

    #[test]
    fn test_stage_flags() {
        assert!(!LifecycleStage::Unseeded.has_position());
        assert!(LifecycleStage::OutOfRange.has_position());
        assert!(LifecycleStage::Exited.is_terminal());
        assert!(DecisionAction::Deploy.moves_capital());
        assert!(!DecisionAction::SkipInRange.moves_capital());
    }
}

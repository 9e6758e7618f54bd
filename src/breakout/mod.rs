//! Daily breakout detection
//!
//! A breakout is a close above the highest high of the trailing `lookback`
//! window as it stood one bar earlier. Breakouts are graded by size against
//! ATR and by volume against the trailing volume average.

mod classifier;
mod config;

pub use classifier::{classify, classify_with};
pub use config::BreakoutConfig;

use serde::{Deserialize, Serialize};

use crate::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakoutCategory {
    NoBreakout,
    InsufficientData,
    FullBreakout,
    PartialBreakoutLowVolume,
    PartialBreakoutSmallSize,
}

impl BreakoutCategory {
    pub fn is_breakout(&self) -> bool {
        self.is_full() || self.is_partial()
    }

    pub fn is_full(&self) -> bool {
        matches!(self, BreakoutCategory::FullBreakout)
    }

    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            BreakoutCategory::PartialBreakoutLowVolume | BreakoutCategory::PartialBreakoutSmallSize
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BreakoutCategory::NoBreakout => "No Breakout",
            BreakoutCategory::InsufficientData => "Insufficient Data",
            BreakoutCategory::FullBreakout => "Full Breakout",
            BreakoutCategory::PartialBreakoutLowVolume => "Partial Breakout - Low Volume",
            BreakoutCategory::PartialBreakoutSmallSize => "Partial Breakout - Small Size",
        }
    }
}

impl std::fmt::Display for BreakoutCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supporting numbers for a breakout, taken at the last candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutMetrics {
    pub current_close: f64,
    pub previous_high: f64,
    pub breakout_size: f64,
    pub atr: f64,
    pub current_volume: u64,
    pub avg_volume: f64,
}

/// Classification result for one symbol.
///
/// `metrics` is populated exactly when the category is a breakout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutVerdict {
    pub symbol: Symbol,
    pub is_breakout: bool,
    pub category: BreakoutCategory,
    pub metrics: Option<BreakoutMetrics>,
}

impl BreakoutVerdict {
    pub fn no_breakout(symbol: Symbol) -> Self {
        Self::without_metrics(symbol, BreakoutCategory::NoBreakout)
    }

    pub fn insufficient_data(symbol: Symbol) -> Self {
        Self::without_metrics(symbol, BreakoutCategory::InsufficientData)
    }

    /// Panics in debug builds if `category` is not a breakout category
    pub fn breakout(symbol: Symbol, category: BreakoutCategory, metrics: BreakoutMetrics) -> Self {
        debug_assert!(category.is_breakout());
        Self {
            symbol,
            is_breakout: true,
            category,
            metrics: Some(metrics),
        }
    }

    fn without_metrics(symbol: Symbol, category: BreakoutCategory) -> Self {
        Self {
            symbol,
            is_breakout: false,
            category,
            metrics: None,
        }
    }

    pub fn details(&self) -> Option<&BreakoutMetrics> {
        self.metrics.as_ref()
    }
}

//! Breakout classifier parameters

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutConfig {
    /// Window for the rolling high and the volume baseline (default: 20)
    pub lookback: usize,

    /// ATR window (default: 14)
    pub atr_period: usize,

    /// Current volume must exceed this multiple of the average for a full breakout (default: 1.5)
    pub volume_multiplier: f64,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            atr_period: 14,
            volume_multiplier: 1.5,
        }
    }
}

impl BreakoutConfig {
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }
}

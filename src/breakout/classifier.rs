//! Breakout classifier
//!
//! Pure: no I/O and no state between calls. The input series is sorted by
//! timestamp before any rolling computation.

use tracing::{debug, info};

use super::{BreakoutCategory, BreakoutConfig, BreakoutMetrics, BreakoutVerdict};
use crate::indicators::{rolling_max, rolling_mean, simple_atr};
use crate::{CandleSeries, Symbol};

/// Classify with the default ATR period and volume multiplier
pub fn classify(symbol: &Symbol, series: CandleSeries, lookback: usize) -> BreakoutVerdict {
    let config = BreakoutConfig::default().with_lookback(lookback);
    classify_with(&config, symbol, series)
}

pub fn classify_with(
    config: &BreakoutConfig,
    symbol: &Symbol,
    mut series: CandleSeries,
) -> BreakoutVerdict {
    debug_assert!(config.lookback > 0, "lookback must be positive");
    let lookback = config.lookback.max(1);

    if series.len() < lookback {
        debug!(
            "{}: Not enough data for lookback period. Data points: {}",
            symbol,
            series.len()
        );
        return BreakoutVerdict::insufficient_data(symbol.clone());
    }

    series.sort_by_time();

    let highs = series.highs();
    let highest_high = rolling_max(&highs, lookback);

    let current = match series.last() {
        Some(c) => c,
        None => return BreakoutVerdict::insufficient_data(symbol.clone()),
    };
    let current_close = current.close;
    let current_volume = current.volume;

    // Benchmark is where the rolling high stood before today's bar
    let previous_high = highest_high.len().checked_sub(2).map(|i| highest_high[i]);

    debug!(
        "{}: Data points: {}, Current close: {}, Previous high: {:?}",
        symbol,
        series.len(),
        current_close,
        previous_high
    );

    let previous_high = match previous_high {
        Some(high) if current_close > high => high,
        _ => {
            debug!("{}: No breakout detected", symbol);
            return BreakoutVerdict::no_breakout(symbol.clone());
        }
    };

    debug!("{}: Potential breakout detected", symbol);

    let atr_values = simple_atr(&highs, &series.lows(), &series.closes(), config.atr_period);
    let atr = atr_values.last().copied().unwrap_or(0.0);
    let breakout_size = current_close - previous_high;
    debug!("{}: Breakout size: {}, ATR: {}", symbol, breakout_size, atr);

    let avg_volume = rolling_mean(&series.volumes(), lookback)
        .last()
        .copied()
        .unwrap_or(0.0);

    let category = if breakout_size <= atr {
        debug!("{}: Partial breakout - Not significant enough", symbol);
        BreakoutCategory::PartialBreakoutSmallSize
    } else if current_volume as f64 <= config.volume_multiplier * avg_volume {
        debug!("{}: Partial breakout - Volume not significant enough", symbol);
        BreakoutCategory::PartialBreakoutLowVolume
    } else {
        info!("{}: Full breakout confirmed", symbol);
        BreakoutCategory::FullBreakout
    };

    BreakoutVerdict::breakout(
        symbol.clone(),
        category,
        BreakoutMetrics {
            current_close,
            previous_high,
            breakout_size,
            atr,
            current_volume,
            avg_volume,
        },
    )
}

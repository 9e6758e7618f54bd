//! Rolling-window indicators used by the breakout classifier
//!
//! Every window here uses at-least-1-sample semantics: the first `period - 1`
//! outputs are computed over however much history is available instead of
//! being left undefined. All outputs have the same length as their inputs.
//!
//! Averages are plain arithmetic means of the window. Do not swap in an
//! exponential or Wilder-smoothed variant; the classifier's thresholds are
//! compared without tolerance.

use ta::indicators::Maximum;
use ta::Next;

/// Trailing maximum over the last `period` values, inclusive of the current one
pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match Maximum::new(period) {
        Ok(i) => i,
        Err(_) => return vec![],
    };

    values.iter().map(|&v| indicator.next(v)).collect()
}

/// Trailing arithmetic mean over the last `period` values
///
/// Each window is summed directly rather than maintained as a running sum,
/// so identical windows always produce bit-identical means.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(period);
            let window = &values[start..=i];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

/// Calculate True Range
///
/// The first bar has no prior close, so its true range is just `high - low`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Average True Range as a simple trailing mean of true range
pub fn simple_atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    if high.is_empty() || period == 0 || high.len() != low.len() || high.len() != close.len() {
        return vec![];
    }

    rolling_mean(&true_range(high, low, close), period)
}

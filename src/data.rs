//! Result persistence
//!
//! Writes the verdicts of a scan run to a timestamped CSV file.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::breakout::BreakoutVerdict;

/// One output row. Metric columns are empty for retained non-breakouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutRecord {
    pub symbol: String,
    pub breakout_type: String,
    pub current_close: Option<f64>,
    pub previous_high: Option<f64>,
    pub breakout_size: Option<f64>,
    pub atr: Option<f64>,
    pub current_volume: Option<u64>,
    pub avg_volume: Option<f64>,
}

impl From<&BreakoutVerdict> for BreakoutRecord {
    fn from(v: &BreakoutVerdict) -> Self {
        let m = v.details();
        Self {
            symbol: v.symbol.to_string(),
            breakout_type: v.category.to_string(),
            current_close: m.map(|m| m.current_close),
            previous_high: m.map(|m| m.previous_high),
            breakout_size: m.map(|m| m.breakout_size),
            atr: m.map(|m| m.atr),
            current_volume: m.map(|m| m.current_volume),
            avg_volume: m.map(|m| m.avg_volume),
        }
    }
}

/// `breakout_stocks_<YYYYmmdd_HHMMSS>.csv`
pub fn results_filename(at: NaiveDateTime) -> String {
    format!("breakout_stocks_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// Save results under `results_dir`, stamped with the local time.
///
/// Returns `None` without touching the filesystem when there is nothing to save.
pub fn save_breakout_results(
    verdicts: &[BreakoutVerdict],
    results_dir: impl AsRef<Path>,
) -> Result<Option<PathBuf>> {
    save_breakout_results_at(verdicts, results_dir, Local::now().naive_local())
}

pub fn save_breakout_results_at(
    verdicts: &[BreakoutVerdict],
    results_dir: impl AsRef<Path>,
    at: NaiveDateTime,
) -> Result<Option<PathBuf>> {
    if verdicts.is_empty() {
        info!("No breakout stocks to save.");
        return Ok(None);
    }

    let results_dir = results_dir.as_ref();
    fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create {}", results_dir.display()))?;

    let filepath = results_dir.join(results_filename(at));
    let mut writer = csv::Writer::from_path(&filepath).context("Failed to create output file")?;
    for verdict in verdicts {
        writer.serialize(BreakoutRecord::from(verdict))?;
    }
    writer.flush()?;

    info!("Saved breakout results to {}", filepath.display());
    Ok(Some(filepath))
}

/// Read back a results file
pub fn load_breakout_results(path: impl AsRef<Path>) -> Result<Vec<BreakoutRecord>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<BreakoutRecord>, _>>()
        .context("Failed to parse breakout results")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakout::{BreakoutCategory, BreakoutMetrics};
    use crate::Symbol;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 5)
            .unwrap()
            .and_hms_opt(16, 4, 9)
            .unwrap()
    }

    #[test]
    fn test_results_filename() {
        assert_eq!(results_filename(stamp()), "breakout_stocks_20240705_160409.csv");
    }

    #[test]
    fn test_empty_results_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_breakout_results_at(&[], dir.path(), stamp()).unwrap();

        assert!(saved.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_and_load_results() {
        let dir = tempfile::tempdir().unwrap();
        let verdicts = vec![
            BreakoutVerdict::breakout(
                Symbol::new("TATASTEEL-EQ"),
                BreakoutCategory::FullBreakout,
                BreakoutMetrics {
                    current_close: 150.0,
                    previous_high: 101.0,
                    breakout_size: 49.0,
                    atr: 6.5,
                    current_volume: 3000,
                    avg_volume: 1100.0,
                },
            ),
            BreakoutVerdict::no_breakout(Symbol::new("ITC-EQ")),
        ];

        let path = save_breakout_results_at(&verdicts, dir.path(), stamp())
            .unwrap()
            .unwrap();
        assert!(path.ends_with("breakout_stocks_20240705_160409.csv"));

        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(
            "symbol,breakout_type,current_close,previous_high,breakout_size,atr,current_volume,avg_volume"
        ));

        let records = load_breakout_results(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].breakout_type, "Full Breakout");
        assert_eq!(records[0].current_volume, Some(3000));
        assert_eq!(records[1].breakout_type, "No Breakout");
        assert_eq!(records[1].atr, None);
    }
}

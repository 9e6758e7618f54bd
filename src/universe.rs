//! Scan universe construction
//!
//! The universe is every NSE cash equity that has a stock future in the
//! nearest live expiry: FUTSTK names from the NFO segment, mapped to their
//! `-EQ` symbols on NSE.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::instruments::Instrument;

/// Scrip master expiry format, e.g. `27MAR2025`
pub const EXPIRY_FORMAT: &str = "%d%b%Y";

/// Row of `stocks_to_scan.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockToScan {
    pub token: String,
    pub symbol: String,
    pub name: String,
}

impl From<&Instrument> for StockToScan {
    fn from(i: &Instrument) -> Self {
        Self {
            token: i.token.clone(),
            symbol: i.symbol.clone(),
            name: i.name.clone(),
        }
    }
}

fn is_stock_future(i: &Instrument) -> bool {
    i.exch_seg == "NFO" && i.instrumenttype == "FUTSTK"
}

/// Nearest stock-future expiry strictly after `today`
pub fn nearest_expiry(instruments: &[Instrument], today: NaiveDate) -> Option<NaiveDate> {
    instruments
        .iter()
        .filter(|i| is_stock_future(i))
        .filter_map(|i| NaiveDate::parse_from_str(&i.expiry, EXPIRY_FORMAT).ok())
        .filter(|expiry| *expiry > today)
        .min()
}

/// NSE cash instruments underlying the nearest-expiry stock futures
pub fn select_universe(instruments: &[Instrument], today: NaiveDate) -> Vec<StockToScan> {
    let expiry = match nearest_expiry(instruments, today) {
        Some(expiry) => expiry,
        None => {
            warn!("No stock futures expiring after {}", today);
            return Vec::new();
        }
    };

    let equity_symbols: HashSet<String> = instruments
        .iter()
        .filter(|i| is_stock_future(i))
        .filter(|i| NaiveDate::parse_from_str(&i.expiry, EXPIRY_FORMAT).ok() == Some(expiry))
        .map(|i| format!("{}-EQ", i.name))
        .collect();

    instruments
        .iter()
        .filter(|i| i.exch_seg == "NSE" && equity_symbols.contains(&i.symbol))
        .map(StockToScan::from)
        .collect()
}

/// Build the universe and write it as `token,symbol,name` CSV
pub fn prepare_stocks_to_scan(
    instruments: &[Instrument],
    today: NaiveDate,
    output: impl AsRef<Path>,
) -> Result<Vec<StockToScan>> {
    let output = output.as_ref();
    let stocks = select_universe(instruments, today);

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    writer.write_record(["token", "symbol", "name"])?;
    for stock in &stocks {
        writer.write_record([&stock.token, &stock.symbol, &stock.name])?;
    }
    writer.flush()?;

    info!("Saved {} stocks to {}", stocks.len(), output.display());
    Ok(stocks)
}

/// Read the `symbol` column of a universe CSV
pub fn load_stock_symbols(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut symbols = Vec::new();
    for (row_idx, result) in reader.deserialize::<StockToScan>().enumerate() {
        let stock = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        symbols.push(stock.symbol);
    }
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(token: &str, symbol: &str, name: &str, expiry: &str, kind: &str, seg: &str) -> Instrument {
        Instrument {
            token: token.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            expiry: expiry.to_string(),
            instrumenttype: kind.to_string(),
            exch_seg: seg.to_string(),
            ..Default::default()
        }
    }

    fn master() -> Vec<Instrument> {
        vec![
            inst("2885", "RELIANCE-EQ", "RELIANCE", "", "", "NSE"),
            inst("1594", "INFY-EQ", "INFY", "", "", "NSE"),
            inst("3045", "SBIN-EQ", "SBIN", "", "", "NSE"),
            inst("500325", "RELIANCE-EQ", "RELIANCE", "", "", "BSE"),
            inst("1", "RELIANCE27MAR25FUT", "RELIANCE", "27MAR2025", "FUTSTK", "NFO"),
            inst("2", "INFY27MAR25FUT", "INFY", "27MAR2025", "FUTSTK", "NFO"),
            inst("3", "SBIN24APR25FUT", "SBIN", "24APR2025", "FUTSTK", "NFO"),
            inst("4", "NIFTY27MAR25FUT", "NIFTY", "27MAR2025", "FUTIDX", "NFO"),
            inst("5", "INFY27FEB25FUT", "INFY", "27FEB2025", "FUTSTK", "NFO"),
        ]
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nearest_expiry_skips_expired_and_today() {
        assert_eq!(nearest_expiry(&master(), date(2025, 3, 1)), Some(date(2025, 3, 27)));
        assert_eq!(nearest_expiry(&master(), date(2025, 3, 27)), Some(date(2025, 4, 24)));
        assert_eq!(nearest_expiry(&master(), date(2025, 5, 1)), None);
    }

    #[test]
    fn test_select_universe_maps_futures_to_nse_equities() {
        let stocks = select_universe(&master(), date(2025, 3, 1));
        let symbols: Vec<&str> = stocks.iter().map(|s| s.symbol.as_str()).collect();

        assert_eq!(symbols, vec!["RELIANCE-EQ", "INFY-EQ"]);
        assert_eq!(stocks[0].token, "2885");
    }

    #[test]
    fn test_prepare_then_load_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stocks_to_scan.csv");

        let stocks = prepare_stocks_to_scan(&master(), date(2025, 3, 28), &path).unwrap();
        assert_eq!(stocks.len(), 1);

        let symbols = load_stock_symbols(&path).unwrap();
        assert_eq!(symbols, vec!["SBIN-EQ".to_string()]);
    }
}

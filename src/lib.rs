//! Breakout Scanner
//!
//! Scans a universe of NSE equities for daily price breakouts: the latest
//! close clearing the prior 20-day high, graded by ATR-relative size and
//! volume confirmation. Candle data comes from the Angel One SmartAPI.

pub mod aggregate;
pub mod angelone;
pub mod breakout;
pub mod common;
pub mod config;
pub mod data;
pub mod indicators;
pub mod instruments;
pub mod scanner;
pub mod types;
pub mod universe;

pub use aggregate::ScanSummary;
pub use breakout::{
    classify, classify_with, BreakoutCategory, BreakoutConfig, BreakoutMetrics, BreakoutVerdict,
};
pub use config::Config;
pub use scanner::{scan, FetchError, FetchOutcome, ScanConfig, Scanner, SymbolOutcome};
pub use types::*;

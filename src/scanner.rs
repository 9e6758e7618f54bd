//! Scan orchestration
//!
//! Walks a symbol list in order, resolving each symbol to a broker token,
//! fetching a trailing window of candles under the retry policy, and
//! classifying the result. Requests are strictly sequential; the only pauses
//! are the backoff sleeps and the per-symbol rate-limit sleep.
//!
//! No single symbol can abort a run: lookup misses, empty responses and
//! exhausted retries are logged and the loop moves on.

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::breakout::{classify_with, BreakoutConfig, BreakoutVerdict};
use crate::common::{BackoffPolicy, BackoffState};
use crate::{CandleSeries, Interval, Symbol};

// =============================================================================
// Collaborator Interfaces
// =============================================================================

/// Errors a fetch attempt can end with. All of them are retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("session not connected")]
    NotConnected,
}

/// Successful fetch result
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Candles(CandleSeries),
    /// Upstream reported no candles for the window
    NoData,
}

/// Resolves a trading symbol to the broker's instrument token
pub trait SymbolTokenLookup {
    fn resolve(&self, symbol: &str) -> Option<String>;
}

/// Fetches historical candles for an instrument token
pub trait HistoricalFetcher {
    fn fetch(
        &self,
        token: &str,
        interval: Interval,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<FetchOutcome, FetchError>;
}

/// Blocking pause between requests
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: SymbolTokenLookup + ?Sized> SymbolTokenLookup for &T {
    fn resolve(&self, symbol: &str) -> Option<String> {
        (**self).resolve(symbol)
    }
}

impl<T: HistoricalFetcher + ?Sized> HistoricalFetcher for &T {
    fn fetch(
        &self,
        token: &str,
        interval: Interval,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<FetchOutcome, FetchError> {
        (**self).fetch(token, interval, from, to)
    }
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

impl SymbolTokenLookup for HashMap<String, String> {
    fn resolve(&self, symbol: &str) -> Option<String> {
        self.get(symbol).cloned()
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub breakout: BreakoutConfig,
    /// Candle interval requested from the broker (default: ONE_DAY)
    pub interval: Interval,
    /// Trailing calendar days to fetch (default: 30)
    pub window_days: u32,
    pub backoff: BackoffPolicy,
    /// Keep NoBreakout / InsufficientData verdicts in the output (default: false)
    pub retain_all_verdicts: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            breakout: BreakoutConfig::default(),
            interval: Interval::OneDay,
            window_days: 30,
            backoff: BackoffPolicy::default(),
            retain_all_verdicts: false,
        }
    }
}

// =============================================================================
// Scanner
// =============================================================================

/// What happened to one symbol
#[derive(Debug)]
pub enum SymbolOutcome {
    Classified(BreakoutVerdict),
    NoData,
    TokenNotFound,
    Exhausted { attempts: u32, last_error: FetchError },
}

pub struct Scanner<L, F, S = ThreadSleeper> {
    lookup: L,
    fetcher: F,
    sleeper: S,
    config: ScanConfig,
    as_of: Option<NaiveDateTime>,
}

impl<L, F> Scanner<L, F, ThreadSleeper>
where
    L: SymbolTokenLookup,
    F: HistoricalFetcher,
{
    pub fn new(lookup: L, fetcher: F) -> Self {
        Self {
            lookup,
            fetcher,
            sleeper: ThreadSleeper,
            config: ScanConfig::default(),
            as_of: None,
        }
    }
}

impl<L, F, S> Scanner<L, F, S>
where
    L: SymbolTokenLookup,
    F: HistoricalFetcher,
    S: Sleeper,
{
    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Scanner<L, F, S2> {
        Scanner {
            lookup: self.lookup,
            fetcher: self.fetcher,
            sleeper,
            config: self.config,
            as_of: self.as_of,
        }
    }

    /// Pin the end of the fetch window instead of using the local clock
    pub fn as_of(mut self, end: NaiveDateTime) -> Self {
        self.as_of = Some(end);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        let to = self.as_of.unwrap_or_else(|| Local::now().naive_local());
        let from = to - ChronoDuration::days(i64::from(self.config.window_days));
        (from, to)
    }

    /// Scan every symbol in order and return the retained verdicts
    ///
    /// The backoff state is created once for the whole run.
    pub fn scan<T: AsRef<str>>(&self, symbols: &[T]) -> Vec<BreakoutVerdict> {
        let mut backoff = self.config.backoff.start();
        self.scan_with_state(symbols, &mut backoff)
    }

    /// Like [`Scanner::scan`], continuing from caller-owned backoff state
    pub fn scan_with_state<T: AsRef<str>>(
        &self,
        symbols: &[T],
        backoff: &mut BackoffState,
    ) -> Vec<BreakoutVerdict> {
        let mut results = Vec::new();

        for symbol in symbols {
            let symbol = Symbol::new(symbol.as_ref());
            info!("Scanning {}", symbol);

            if let SymbolOutcome::Classified(verdict) = self.scan_symbol(&symbol, backoff) {
                if verdict.is_breakout || self.config.retain_all_verdicts {
                    results.push(verdict);
                }
            }

            // Rate-limit pause before the next request
            self.sleeper.sleep(backoff.current());
        }

        results
    }

    /// Resolve, fetch with retry, and classify a single symbol
    ///
    /// Every failed attempt doubles the delay in `backoff`; when another
    /// attempt remains, the scanner first sleeps for the delay as it stood
    /// before doubling. The final failed attempt is not followed by a backoff
    /// sleep, only by the caller's rate-limit pause at the doubled delay.
    pub fn scan_symbol(&self, symbol: &Symbol, backoff: &mut BackoffState) -> SymbolOutcome {
        let policy = &self.config.backoff;
        if policy.reset_per_symbol {
            backoff.reset(policy);
        }

        let token = match self.lookup.resolve(symbol.as_str()) {
            Some(token) => token,
            None => {
                warn!("Symbol token not found for {}", symbol);
                return SymbolOutcome::TokenNotFound;
            }
        };

        let (from, to) = self.window();
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.fetcher.fetch(&token, self.config.interval, from, to) {
                Ok(FetchOutcome::Candles(series)) if !series.is_empty() => {
                    debug!("{}: Retrieved {} candles", symbol, series.len());
                    let verdict = classify_with(&self.config.breakout, symbol, series);
                    return SymbolOutcome::Classified(verdict);
                }
                Ok(_) => {
                    warn!("{}: No data retrieved", symbol);
                    return SymbolOutcome::NoData;
                }
                Err(e) => {
                    error!(
                        "Error processing {} (attempt {}/{}): {}",
                        symbol, attempt, max_attempts, e
                    );
                    let wait = backoff.current();
                    backoff.record_failure();

                    if attempt >= max_attempts {
                        error!("Failed to process {} after {} attempts", symbol, attempt);
                        return SymbolOutcome::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        };
                    }

                    self.sleeper.sleep(wait);
                }
            }
        }
    }
}

/// Scan with the default configuration, blocking between requests
pub fn scan<T, L, F>(symbols: &[T], lookup: L, fetcher: F) -> Vec<BreakoutVerdict>
where
    T: AsRef<str>,
    L: SymbolTokenLookup,
    F: HistoricalFetcher,
{
    Scanner::new(lookup, fetcher).scan(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakout::BreakoutCategory;
    use crate::Candle;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    /// Fails `failures` times per call sequence, then returns `outcome`
    struct ScriptedFetcher {
        failures: Cell<u32>,
        outcome: FetchOutcome,
        calls: RefCell<Vec<(String, NaiveDateTime, NaiveDateTime)>>,
    }

    impl ScriptedFetcher {
        fn new(failures: u32, outcome: FetchOutcome) -> Self {
            Self {
                failures: Cell::new(failures),
                outcome,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl HistoricalFetcher for ScriptedFetcher {
        fn fetch(
            &self,
            token: &str,
            _interval: Interval,
            from: NaiveDateTime,
            to: NaiveDateTime,
        ) -> Result<FetchOutcome, FetchError> {
            self.calls.borrow_mut().push((token.to_string(), from, to));
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(FetchError::Transport("connection reset".to_string()));
            }
            Ok(self.outcome.clone())
        }
    }

    fn breakout_series() -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut candles: Vec<Candle> = (0..24)
            .map(|i| {
                Candle::new_unchecked(
                    start + ChronoDuration::days(i),
                    100.0,
                    101.0,
                    99.0,
                    100.0,
                    1000,
                )
            })
            .collect();
        candles.push(Candle::new_unchecked(
            start + ChronoDuration::days(24),
            100.0,
            155.0,
            95.0,
            150.0,
            3000,
        ));
        candles.into()
    }

    fn lookup(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_unknown_symbol_is_skipped_but_still_paced() {
        let fetcher = ScriptedFetcher::new(0, FetchOutcome::Candles(breakout_series()));
        let sleeper = RecordingSleeper::default();
        let scanner = Scanner::new(lookup(&[]), &fetcher).with_sleeper(&sleeper);

        let results = scanner.scan(&["MISSING-EQ"]);

        assert!(results.is_empty());
        assert!(fetcher.calls.borrow().is_empty());
        assert_eq!(*sleeper.sleeps.borrow(), secs(&[1]));
    }

    #[test]
    fn test_no_data_does_not_consume_retries() {
        let fetcher = ScriptedFetcher::new(0, FetchOutcome::NoData);
        let sleeper = RecordingSleeper::default();
        let scanner = Scanner::new(lookup(&[("A-EQ", "1")]), &fetcher).with_sleeper(&sleeper);

        let mut backoff = scanner.config().backoff.start();
        let outcome = scanner.scan_symbol(&Symbol::new("A-EQ"), &mut backoff);

        assert!(matches!(outcome, SymbolOutcome::NoData));
        assert_eq!(fetcher.calls.borrow().len(), 1);
        assert_eq!(backoff.current(), Duration::from_secs(1));
        assert!(sleeper.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_empty_series_is_treated_as_no_data() {
        let fetcher = ScriptedFetcher::new(0, FetchOutcome::Candles(CandleSeries::default()));
        let scanner = Scanner::new(lookup(&[("A-EQ", "1")]), &fetcher)
            .with_sleeper(RecordingSleeper::default());

        let mut backoff = scanner.config().backoff.start();
        let outcome = scanner.scan_symbol(&Symbol::new("A-EQ"), &mut backoff);

        assert!(matches!(outcome, SymbolOutcome::NoData));
        assert_eq!(fetcher.calls.borrow().len(), 1);
    }

    #[test]
    fn test_delay_accumulates_across_symbols() {
        // Every fetch fails: 3 attempts per symbol, sleeping before attempts 2 and 3
        let fetcher = ScriptedFetcher::new(u32::MAX, FetchOutcome::NoData);
        let sleeper = RecordingSleeper::default();
        let scanner = Scanner::new(lookup(&[("A-EQ", "1"), ("B-EQ", "2")]), &fetcher)
            .with_sleeper(&sleeper);

        let results = scanner.scan(&["A-EQ", "B-EQ"]);

        assert!(results.is_empty());
        assert_eq!(fetcher.calls.borrow().len(), 6);
        assert_eq!(*sleeper.sleeps.borrow(), secs(&[1, 2, 8, 8, 16, 64]));
    }

    #[test]
    fn test_reset_per_symbol_restarts_delay() {
        let fetcher = ScriptedFetcher::new(u32::MAX, FetchOutcome::NoData);
        let sleeper = RecordingSleeper::default();
        let config = ScanConfig {
            backoff: BackoffPolicy::default().with_reset_per_symbol(true),
            ..ScanConfig::default()
        };
        let scanner = Scanner::new(lookup(&[("A-EQ", "1"), ("B-EQ", "2")]), &fetcher)
            .with_sleeper(&sleeper)
            .with_config(config);

        scanner.scan(&["A-EQ", "B-EQ"]);

        assert_eq!(*sleeper.sleeps.borrow(), secs(&[1, 2, 8, 1, 2, 8]));
    }

    #[test]
    fn test_final_failure_doubles_delay_without_sleeping() {
        let fetcher = ScriptedFetcher::new(u32::MAX, FetchOutcome::NoData);
        let sleeper = RecordingSleeper::default();
        let scanner = Scanner::new(lookup(&[("A-EQ", "1")]), &fetcher).with_sleeper(&sleeper);
        let mut backoff = scanner.config().backoff.start();

        let outcome = scanner.scan_symbol(&Symbol::new("A-EQ"), &mut backoff);

        assert!(matches!(outcome, SymbolOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(*sleeper.sleeps.borrow(), secs(&[1, 2]));
        assert_eq!(backoff.current(), Duration::from_secs(8));
        assert_eq!(backoff.failures(), 3);
    }

    #[test]
    fn test_fetch_window_spans_trailing_days() {
        let fetcher = ScriptedFetcher::new(0, FetchOutcome::NoData);
        let end = NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        let scanner = Scanner::new(lookup(&[("A-EQ", "2885")]), &fetcher)
            .with_sleeper(RecordingSleeper::default())
            .as_of(end);

        scanner.scan(&["A-EQ"]);

        let calls = fetcher.calls.borrow();
        let (token, from, to) = &calls[0];
        assert_eq!(token, "2885");
        assert_eq!(*to, end);
        assert_eq!(*to - *from, ChronoDuration::days(30));
    }

    #[test]
    fn test_retain_all_verdicts_keeps_non_breakouts() {
        let short: CandleSeries = breakout_series().into_inner().into_iter().take(5).collect();
        let fetcher = ScriptedFetcher::new(0, FetchOutcome::Candles(short));
        let config = ScanConfig {
            retain_all_verdicts: true,
            ..ScanConfig::default()
        };
        let scanner = Scanner::new(lookup(&[("A-EQ", "1")]), &fetcher)
            .with_sleeper(RecordingSleeper::default())
            .with_config(config);

        let results = scanner.scan(&["A-EQ"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, BreakoutCategory::InsufficientData);

        let scanner = Scanner::new(lookup(&[("A-EQ", "1")]), &fetcher)
            .with_sleeper(RecordingSleeper::default());
        assert!(scanner.scan(&["A-EQ"]).is_empty());
    }
}

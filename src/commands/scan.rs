//! Scan command implementation

use anyhow::{Context, Result};
use breakout_scanner::angelone::AngelOneClient;
use breakout_scanner::instruments::InstrumentManager;
use breakout_scanner::universe::{load_stock_symbols, prepare_stocks_to_scan};
use breakout_scanner::{data, Config, ScanSummary, Scanner};
use chrono::Local;
use std::path::Path;
use tracing::{debug, info};

pub fn run(
    config_path: &Path,
    skip_universe: bool,
    lookback_override: Option<usize>,
    retain_all: bool,
) -> Result<()> {
    info!("Starting breakout scan");

    let mut config = Config::load(Some(config_path))?;

    if let Some(lookback) = lookback_override {
        info!("Overriding lookback to: {}", lookback);
        config.scan.breakout.lookback = lookback;
    }
    if retain_all {
        config.scan.retain_all_verdicts = true;
    }
    config.validate()?;

    let mut instruments = InstrumentManager::new(&config.paths.data_dir);
    instruments.fetch_instruments()?;

    if !skip_universe {
        let today = Local::now().date_naive();
        prepare_stocks_to_scan(instruments.instruments(), today, &config.paths.stocks_file)?;
    }

    let symbols = load_stock_symbols(&config.paths.stocks_file)?;
    info!("Loaded {} symbols to scan", symbols.len());
    debug!("Symbols: {:?}", symbols);

    let mut client =
        AngelOneClient::with_config(config.broker.credentials(), config.broker.client_config())?;
    client.connect().context("Failed to connect to Angel One")?;

    let scanner = Scanner::new(&instruments, &client).with_config(config.scan.clone());
    let results = scanner.scan(&symbols);

    data::save_breakout_results(&results, &config.paths.results_dir)?;

    let summary = ScanSummary::from_verdicts(symbols.len(), &results);
    summary.log();

    println!("\n{}", "=".repeat(60));
    println!("BREAKOUT SCAN RESULTS");
    println!("{}", "=".repeat(60));
    println!("Stocks scanned:     {}", summary.scanned);
    println!("Full breakouts:     {}", summary.full_count());
    println!("Partial breakouts:  {}", summary.partial_count());
    println!("{}", "=".repeat(60));
    summary.print_listing();

    client.close();
    Ok(())
}

//! Universe command implementation

use anyhow::Result;
use breakout_scanner::instruments::InstrumentManager;
use breakout_scanner::universe::{nearest_expiry, prepare_stocks_to_scan};
use breakout_scanner::Config;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let config = Config::load(Some(config_path))?;
    let output = output.unwrap_or(config.paths.stocks_file);

    let mut manager = InstrumentManager::new(&config.paths.data_dir);
    manager.fetch_instruments()?;

    let today = Local::now().date_naive();
    if let Some(expiry) = nearest_expiry(manager.instruments(), today) {
        info!("Nearest stock futures expiry: {}", expiry);
    }

    let stocks = prepare_stocks_to_scan(manager.instruments(), today, &output)?;
    println!("{} stocks written to {}", stocks.len(), output.display());
    Ok(())
}

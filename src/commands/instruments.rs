//! Instruments command implementation

use anyhow::Result;
use breakout_scanner::instruments::InstrumentManager;
use breakout_scanner::Config;
use std::path::Path;
use tracing::info;

pub fn run(config_path: &Path, force: bool) -> Result<()> {
    let config = Config::load(Some(config_path))?;
    let mut manager = InstrumentManager::new(&config.paths.data_dir);

    if force {
        info!("Forcing instrument master download");
        manager.download_instruments()?;
    } else {
        manager.fetch_instruments()?;
    }

    info!(
        "{} instruments available in {}",
        manager.instruments().len(),
        config.paths.data_dir.display()
    );
    Ok(())
}

//! Instrument master management
//!
//! Downloads the SmartAPI scrip master, caches it on disk as both JSON and
//! CSV, and resolves trading symbols to instrument tokens. The cache is
//! refreshed at most once per local calendar day.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::scanner::SymbolTokenLookup;

pub const SCRIP_MASTER_URL: &str =
    "https://margincalculator.angelbroking.com/OpenAPI_File/files/OpenAPIScripMaster.json";

/// One row of the scrip master
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instrument {
    pub token: String,
    pub symbol: String,
    pub name: String,
    pub expiry: String,
    pub strike: String,
    pub lotsize: String,
    pub instrumenttype: String,
    pub exch_seg: String,
    pub tick_size: String,
}

pub struct InstrumentManager {
    instruments_url: String,
    json_path: PathBuf,
    csv_path: PathBuf,
    instruments: Vec<Instrument>,
    tokens: HashMap<String, String>,
}

impl InstrumentManager {
    /// Cache files `instruments.json` / `instruments.csv` under `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::with_paths(dir.join("instruments.json"), dir.join("instruments.csv"))
    }

    pub fn with_paths(json_path: impl Into<PathBuf>, csv_path: impl Into<PathBuf>) -> Self {
        Self {
            instruments_url: SCRIP_MASTER_URL.to_string(),
            json_path: json_path.into(),
            csv_path: csv_path.into(),
            instruments: Vec::new(),
            tokens: HashMap::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.instruments_url = url.into();
        self
    }

    /// In-memory manager, mainly for tests and offline runs
    pub fn from_instruments(instruments: Vec<Instrument>) -> Self {
        let mut manager = Self::new(".");
        manager.set_instruments(instruments);
        manager
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Download if the cache is missing or stale, otherwise load from disk
    pub fn fetch_instruments(&mut self) -> Result<()> {
        if self.should_update_file() {
            self.download_instruments()
        } else {
            self.load_instruments()
        }
    }

    pub fn download_instruments(&mut self) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;

        let response = client
            .get(&self.instruments_url)
            .send()
            .context("Failed to fetch instruments")?;

        if !response.status().is_success() {
            error!(
                "Failed to fetch instruments. Status code: {}",
                response.status()
            );
            bail!("Instrument download returned status {}", response.status());
        }

        let instruments: Vec<Instrument> =
            response.json().context("Failed to parse instrument master")?;
        self.set_instruments(instruments);
        self.save_instruments()?;
        info!("Instruments data fetched and saved successfully.");
        Ok(())
    }

    /// Write the in-memory master to both the JSON and CSV cache files
    pub fn save_instruments(&self) -> Result<()> {
        for path in [&self.json_path, &self.csv_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let file = File::create(&self.json_path)
            .with_context(|| format!("Failed to create {}", self.json_path.display()))?;
        serde_json::to_writer(file, &self.instruments).context("Failed to write instrument JSON")?;

        let mut writer = csv::Writer::from_path(&self.csv_path)
            .with_context(|| format!("Failed to create {}", self.csv_path.display()))?;
        for instrument in &self.instruments {
            writer.serialize(instrument)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Load from the CSV cache, falling back to the JSON cache
    pub fn load_instruments(&mut self) -> Result<()> {
        if self.csv_path.exists() {
            let mut reader = csv::Reader::from_path(&self.csv_path)
                .with_context(|| format!("Failed to open {}", self.csv_path.display()))?;
            let instruments = reader
                .deserialize()
                .collect::<std::result::Result<Vec<Instrument>, _>>()
                .context("Failed to parse instrument CSV")?;
            self.set_instruments(instruments);
            info!("Instruments data loaded successfully from CSV.");
        } else if self.json_path.exists() {
            let file = File::open(&self.json_path)
                .with_context(|| format!("Failed to open {}", self.json_path.display()))?;
            let instruments: Vec<Instrument> = serde_json::from_reader(BufReader::new(file))
                .context("Failed to parse instrument JSON")?;
            self.set_instruments(instruments);
            info!("Instruments data loaded successfully from JSON.");
        } else {
            error!("Instruments file not found. Run the instruments command to download it.");
            bail!(
                "No instrument cache at {} or {}",
                self.csv_path.display(),
                self.json_path.display()
            );
        }
        Ok(())
    }

    /// True when no cache exists or the cache predates today
    pub fn should_update_file(&self) -> bool {
        let file_to_check = if self.csv_path.exists() {
            &self.csv_path
        } else if self.json_path.exists() {
            &self.json_path
        } else {
            return true;
        };

        match fs::metadata(file_to_check).and_then(|m| m.modified()) {
            Ok(modified) => {
                let modified: DateTime<Local> = modified.into();
                modified.date_naive() < Local::now().date_naive()
            }
            Err(e) => {
                warn!("Cannot read mtime of {}: {}", file_to_check.display(), e);
                true
            }
        }
    }

    /// First token listed for `symbol`
    pub fn get_symbol_token(&self, symbol: &str) -> Option<String> {
        if self.instruments.is_empty() {
            warn!("Instrument master not loaded; cannot resolve {}", symbol);
            return None;
        }
        self.tokens.get(symbol).cloned()
    }

    fn set_instruments(&mut self, instruments: Vec<Instrument>) {
        let mut tokens = HashMap::with_capacity(instruments.len());
        for instrument in &instruments {
            tokens
                .entry(instrument.symbol.clone())
                .or_insert_with(|| instrument.token.clone());
        }
        self.tokens = tokens;
        self.instruments = instruments;
    }
}

impl SymbolTokenLookup for InstrumentManager {
    fn resolve(&self, symbol: &str) -> Option<String> {
        self.get_symbol_token(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(token: &str, symbol: &str, exch_seg: &str) -> Instrument {
        Instrument {
            token: token.to_string(),
            symbol: symbol.to_string(),
            name: symbol.trim_end_matches("-EQ").to_string(),
            exch_seg: exch_seg.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_token_wins() {
        let manager = InstrumentManager::from_instruments(vec![
            instrument("2885", "RELIANCE-EQ", "NSE"),
            instrument("500325", "RELIANCE-EQ", "BSE"),
            instrument("1594", "INFY-EQ", "NSE"),
        ]);

        assert_eq!(manager.resolve("RELIANCE-EQ"), Some("2885".to_string()));
        assert_eq!(manager.resolve("INFY-EQ"), Some("1594".to_string()));
        assert_eq!(manager.resolve("TCS-EQ"), None);
    }

    #[test]
    fn test_missing_cache_needs_update() {
        let dir = tempfile::tempdir().unwrap();
        let manager = InstrumentManager::new(dir.path());
        assert!(manager.should_update_file());
    }

    #[test]
    fn test_save_then_load_prefers_csv() {
        let dir = tempfile::tempdir().unwrap();
        let source = vec![
            instrument("2885", "RELIANCE-EQ", "NSE"),
            instrument("1594", "INFY-EQ", "NSE"),
        ];

        let mut manager = InstrumentManager::new(dir.path());
        manager.set_instruments(source.clone());
        manager.save_instruments().unwrap();
        assert!(!manager.should_update_file());

        // Break the JSON copy; a CSV load must not touch it
        fs::write(dir.path().join("instruments.json"), "not json").unwrap();

        let mut reloaded = InstrumentManager::new(dir.path());
        reloaded.load_instruments().unwrap();
        assert_eq!(reloaded.instruments(), source.as_slice());
        assert_eq!(reloaded.resolve("INFY-EQ"), Some("1594".to_string()));
    }

    #[test]
    fn test_load_falls_back_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("instruments.json");
        fs::write(
            &json_path,
            r#"[{"token":"3045","symbol":"SBIN-EQ","name":"SBIN","expiry":"","strike":"-1.000000",
                "lotsize":"1","instrumenttype":"","exch_seg":"NSE","tick_size":"5.000000"}]"#,
        )
        .unwrap();

        let mut manager = InstrumentManager::new(dir.path());
        manager.load_instruments().unwrap();
        assert_eq!(manager.resolve("SBIN-EQ"), Some("3045".to_string()));
    }

    #[test]
    fn test_load_without_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = InstrumentManager::new(dir.path());
        assert!(manager.load_instruments().is_err());
    }
}

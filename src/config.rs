//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable support for broker credentials. Every section is defaulted, so a
//! missing file or a partial file is fine.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::angelone::{ClientConfig, Credentials, API_BASE_URL};
use crate::scanner::ScanConfig;

pub const ENV_APP_KEY: &str = "ANGEL_ONE_APP_KEY";
pub const ENV_CLIENT_ID: &str = "ANGEL_ONE_CLIENT_ID";
pub const ENV_TOTP_SECRET: &str = "ANGEL_ONE_TOTP_SECRET";
pub const ENV_PIN: &str = "ANGEL_ONE_PIN";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub scan: ScanConfig,
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load `path` when given and present, defaults otherwise. `.env` is read first.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let config = match path {
            Some(path) if path.exists() => {
                info!("Loaded configuration from: {}", path.display());
                Self::from_file(path)?
            }
            Some(path) => {
                info!("Config file {} not found, using defaults", path.display());
                Self::defaults_from_env()
            }
            None => Self::defaults_from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    fn defaults_from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay credentials from the environment onto the file values
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let broker = &mut self.broker;
        for (key, slot) in [
            (ENV_APP_KEY, &mut broker.api_key),
            (ENV_CLIENT_ID, &mut broker.client_id),
            (ENV_TOTP_SECRET, &mut broker.totp_secret),
            (ENV_PIN, &mut broker.pin),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                debug!("Using {} from environment", key);
                *slot = Some(value);
            }
        }
    }

    /// Reject parameter values the scanner cannot run with
    pub fn validate(&self) -> Result<()> {
        let scan = &self.scan;
        if scan.breakout.lookback == 0 {
            bail!("scan.breakout.lookback must be at least 1");
        }
        if scan.breakout.atr_period == 0 {
            bail!("scan.breakout.atr_period must be at least 1");
        }
        if !(scan.breakout.volume_multiplier.is_finite() && scan.breakout.volume_multiplier >= 0.0) {
            bail!(
                "scan.breakout.volume_multiplier must be a non-negative number, got {}",
                scan.breakout.volume_multiplier
            );
        }
        if scan.backoff.max_attempts == 0 {
            bail!("scan.backoff.max_attempts must be at least 1");
        }
        if scan.window_days == 0 {
            bail!("scan.window_days must be at least 1");
        }
        Ok(())
    }
}

/// Angel One connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Exchange segment for candle requests
    pub exchange: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            api_key: None,
            client_id: None,
            totp_secret: None,
            pin: None,
            base_url: API_BASE_URL.to_string(),
            timeout_secs: 30,
            exchange: "NSE".to_string(),
        }
    }
}

impl BrokerConfig {
    pub fn credentials(&self) -> Credentials {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        Credentials::new(
            field(&self.api_key),
            field(&self.client_id),
            field(&self.pin),
            field(&self.totp_secret),
        )
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_base_url(self.base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_exchange(self.exchange.clone())
    }
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the instrument master cache
    pub data_dir: PathBuf,
    /// Universe CSV written by `universe` and read by `scan`
    pub stocks_file: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            data_dir: PathBuf::from("data"),
            stocks_file: PathBuf::from("stocks_to_scan.csv"),
            results_dir: PathBuf::from("results"),
        }
    }
}

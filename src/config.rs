//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable support for API credentials. Every field has a default, so an
//! empty `{}` file is a valid paper-trading configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::broker::alpaca::{ClientConfig, DATA_URL, PAPER_TRADING_URL};
use crate::broker::{Credentials, RetryPolicy};

/// Symbols scanned when the config file does not list its own
pub const DEFAULT_UNIVERSE: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "TSLA", "AMD", "META", "AMZN", "GOOGL", "GOOG", "NFLX", "AVGO",
    "SMCI", "ASML", "SHOP", "UBER", "CRM", "ADBE", "MU", "INTC", "COIN", "PLTR", "SQ", "ABNB",
    "DELL", "ON", "KLAC", "LRCX", "PANW", "NOW", "ANET", "TTD", "SNOW", "MDB", "BABA", "PDD",
    "NIO", "LI", "RIVN", "CVNA", "DDOG", "CRWD", "NET", "ZS", "OKTA", "ARM", "SOFI", "UAL", "JPM",
    "BAC", "CAT",
];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl Config {
    /// Load and validate configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON file and pick up env credentials, without validating.
    /// Callers that apply overrides validate afterwards.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.broker.load_env_credentials();
        Ok(config)
    }

    /// Reject settings the scanner cannot run with
    pub fn validate(&self) -> Result<()> {
        self.broker.validate()?;
        self.scan.validate()
    }
}

/// Brokerage endpoints, credentials and request policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_trading_base_url")]
    pub trading_base_url: String,
    #[serde(default = "default_data_base_url")]
    pub data_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_trading_base_url() -> String {
    PAPER_TRADING_URL.to_string()
}

fn default_data_base_url() -> String {
    DATA_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            trading_base_url: default_trading_base_url(),
            data_base_url: default_data_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl BrokerConfig {
    /// Environment variables override anything set in the file
    fn load_env_credentials(&mut self) {
        if let Ok(api_key) = std::env::var("APCA_API_KEY_ID") {
            self.api_key = Some(api_key);
        }
        if let Ok(api_secret) = std::env::var("APCA_API_SECRET_KEY") {
            self.api_secret = Some(api_secret);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            bail!("broker.max_attempts must be at least 1");
        }
        if self.timeout_secs == 0 {
            bail!("broker.timeout_secs must be positive");
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            bail!(
                "broker.backoff_base_ms ({}) exceeds broker.backoff_max_ms ({})",
                self.backoff_base_ms,
                self.backoff_max_ms
            );
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.backoff_base_ms))
            .with_max_delay(Duration::from_millis(self.backoff_max_ms))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_trading_base_url(&self.trading_base_url)
            .with_data_base_url(&self.data_base_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(self.retry_policy())
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("Missing API key: set APCA_API_KEY_ID or broker.api_key")?;
        let api_secret = self
            .api_secret
            .clone()
            .filter(|s| !s.is_empty())
            .context("Missing API secret: set APCA_API_SECRET_KEY or broker.api_secret")?;
        Ok(Credentials::new(api_key, api_secret))
    }
}

/// Scan, screening and sizing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Bar interval requested from the data API
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_max_symbols_per_scan")]
    pub max_symbols_per_scan: usize,
    #[serde(default = "default_max_concurrent_positions")]
    pub max_concurrent_positions: usize,
    /// Fraction of buying power risked per trade (0.01 = 1%)
    #[serde(default = "default_risk_pct_per_trade")]
    pub risk_pct_per_trade: f64,
    #[serde(default = "default_take_profit_atr_mult")]
    pub take_profit_atr_mult: f64,
    #[serde(default = "default_stop_atr_mult")]
    pub stop_atr_mult: f64,
    #[serde(default = "default_min_price")]
    pub min_price: f64,
    #[serde(default = "default_max_price")]
    pub max_price: f64,
    #[serde(default = "default_min_avg_volume")]
    pub min_avg_volume: f64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_universe")]
    pub universe: Vec<String>,
    /// Pause after a failed tick before the next one
    #[serde(default = "default_recovery_pause_secs")]
    pub recovery_pause_secs: u64,
    #[serde(default = "default_time_in_force")]
    pub time_in_force: String,
}

fn default_timeframe() -> String {
    "1Min".to_string()
}

fn default_scan_interval_secs() -> u64 {
    30
}

fn default_max_symbols_per_scan() -> usize {
    40
}

fn default_max_concurrent_positions() -> usize {
    5
}

fn default_risk_pct_per_trade() -> f64 {
    0.01
}

fn default_take_profit_atr_mult() -> f64 {
    2.0
}

fn default_stop_atr_mult() -> f64 {
    1.0
}

fn default_min_price() -> f64 {
    5.0
}

fn default_max_price() -> f64 {
    800.0
}

fn default_min_avg_volume() -> f64 {
    300_000.0
}

fn default_universe() -> Vec<String> {
    DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect()
}

fn default_recovery_pause_secs() -> u64 {
    5
}

fn default_time_in_force() -> String {
    "day".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeframe: default_timeframe(),
            scan_interval_secs: default_scan_interval_secs(),
            max_symbols_per_scan: default_max_symbols_per_scan(),
            max_concurrent_positions: default_max_concurrent_positions(),
            risk_pct_per_trade: default_risk_pct_per_trade(),
            take_profit_atr_mult: default_take_profit_atr_mult(),
            stop_atr_mult: default_stop_atr_mult(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            min_avg_volume: default_min_avg_volume(),
            dry_run: false,
            universe: default_universe(),
            recovery_pause_secs: default_recovery_pause_secs(),
            time_in_force: default_time_in_force(),
        }
    }
}

impl ScanConfig {
    fn validate(&self) -> Result<()> {
        if self.universe.is_empty() {
            bail!("scan.universe must list at least one symbol");
        }
        if self.scan_interval_secs == 0 {
            bail!("scan.scan_interval_secs must be positive");
        }
        if self.max_symbols_per_scan == 0 {
            bail!("scan.max_symbols_per_scan must be positive");
        }
        if self.max_concurrent_positions == 0 {
            bail!("scan.max_concurrent_positions must be positive");
        }
        if !(self.risk_pct_per_trade > 0.0 && self.risk_pct_per_trade <= 1.0) {
            bail!(
                "scan.risk_pct_per_trade must be in (0, 1], got {}",
                self.risk_pct_per_trade
            );
        }
        if !(self.stop_atr_mult > 0.0) || !(self.take_profit_atr_mult > 0.0) {
            bail!("scan.stop_atr_mult and scan.take_profit_atr_mult must be positive");
        }
        if !(self.min_price >= 0.0) || self.min_price > self.max_price {
            bail!(
                "scan.min_price ({}) must be non-negative and not above scan.max_price ({})",
                self.min_price,
                self.max_price
            );
        }
        if self.min_avg_volume < 0.0 {
            bail!("scan.min_avg_volume must be non-negative");
        }
        if self.timeframe.trim().is_empty() {
            bail!("scan.timeframe must not be empty");
        }
        Ok(())
    }

    /// Symbols screened each cycle, in configured order
    pub fn scan_symbols(&self) -> &[String] {
        let n = self.max_symbols_per_scan.min(self.universe.len());
        &self.universe[..n]
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn recovery_pause(&self) -> Duration {
        Duration::from_secs(self.recovery_pause_secs)
    }
}

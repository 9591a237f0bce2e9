//! Configuration for the ledger

use crate::types::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Currency newly created wallets are denominated in
    pub default_currency: Currency,

    /// Payers whose balance drops below this after a transfer get a
    /// low-balance notification
    pub low_balance_threshold: Decimal,

    /// Bound on waiting for a wallet or request lock (milliseconds)
    pub lock_wait_ms: u64,

    /// Capacity of the notification dispatch channel
    pub notification_buffer: usize,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            default_currency: Currency::INR,
            low_balance_threshold: Decimal::from(500),
            lock_wait_ms: 2_000,
            notification_buffer: 1_024,
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Load defaults with environment overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(currency) = std::env::var("LEDGER_CURRENCY") {
            config.default_currency = Currency::parse(&currency)
                .ok_or_else(|| crate::Error::Config(format!("unknown currency: {currency}")))?;
        }

        if let Ok(threshold) = std::env::var("LEDGER_LOW_BALANCE_THRESHOLD") {
            config.low_balance_threshold = threshold
                .parse()
                .map_err(|e| crate::Error::Config(format!("bad low balance threshold: {e}")))?;
        }

        if let Ok(wait) = std::env::var("LEDGER_LOCK_WAIT_MS") {
            config.lock_wait_ms = wait
                .parse()
                .map_err(|e| crate::Error::Config(format!("bad lock wait: {e}")))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_currency, Currency::INR);
        assert_eq!(config.low_balance_threshold, Decimal::from(500));
        assert_eq!(config.lock_wait_ms, 2_000);
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.low_balance_threshold, config.low_balance_threshold);
        assert_eq!(parsed.data_dir, config.data_dir);
    }
}

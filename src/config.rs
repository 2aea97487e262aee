//! Simulator configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration that replays the stock universe of the original desk.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default symbol universe
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "AAPL", "AMD", "BAC", "CRM", "DOW", "GOOG", "GS", "IBM", "INTC", "JPM", "META", "MSFT",
    "NASDAQ", "NKE", "NVDA", "ORCL", "PYPL", "SPY", "TSLA", "UL", "VISA", "WMT",
];

/// Lower bound on the replay timer period
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// On-disk format of the per-symbol series files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// `<SYMBOL>.json` with `{symbol, company, data: [...]}`
    Json,
    /// `<SYMBOL>.csv` with `time,open,high,low,close,volume`
    Csv,
}

impl Default for DataFormat {
    fn default() -> Self {
        DataFormat::Json
    }
}

/// Configuration for the simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Symbols to replay, in display order
    pub symbols: Vec<String>,
    /// Symbol whose first point anchors the replay timeline
    pub reference_symbol: Option<String>,
    /// Directory holding the series files
    pub data_dir: PathBuf,
    /// Format of the series files
    pub data_format: DataFormat,
    /// Directory for persisted ledger state (used by the file store)
    pub state_dir: PathBuf,
    /// Replay timer period at speed 1.0
    pub base_interval_ms: u64,
    /// Replay speed multiplier
    pub speed_multiplier: f64,
    /// Minimum gap between subscriber notifications
    pub notify_throttle_ms: u64,
    /// Cash granted to an account the first time it is seen
    pub starting_cash: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            reference_symbol: None,
            data_dir: PathBuf::from("data"),
            data_format: DataFormat::default(),
            state_dir: PathBuf::from("state"),
            base_interval_ms: 120_000,
            speed_multiplier: 1.0,
            notify_throttle_ms: 500,
            starting_cash: 10_000.0,
        }
    }
}

impl SimConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Builder-style override of the symbol universe
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(SimError::ConfigError("symbol list is empty".to_string()));
        }
        if let Some(reference) = &self.reference_symbol {
            if !self.symbols.iter().any(|s| s == reference) {
                return Err(SimError::ConfigError(format!(
                    "reference symbol {} is not in the symbol list",
                    reference
                )));
            }
        }
        if !(self.speed_multiplier.is_finite() && self.speed_multiplier > 0.0) {
            return Err(SimError::ConfigError(format!(
                "speed multiplier must be positive, got {}",
                self.speed_multiplier
            )));
        }
        if !(self.starting_cash.is_finite() && self.starting_cash >= 0.0) {
            return Err(SimError::ConfigError(format!(
                "starting cash must be non-negative, got {}",
                self.starting_cash
            )));
        }
        if self.base_interval_ms == 0 {
            return Err(SimError::ConfigError("base interval must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Symbol anchoring `data_start`
    pub fn reference_symbol(&self) -> Option<&str> {
        self.reference_symbol
            .as_deref()
            .or_else(|| self.symbols.first().map(String::as_str))
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn notify_throttle(&self) -> Duration {
        Duration::from_millis(self.notify_throttle_ms)
    }

    /// Timer period for the configured speed
    pub fn effective_interval(&self) -> Duration {
        effective_interval(self.base_interval(), self.speed_multiplier)
    }
}

/// `max(1s, base / speed)`
pub fn effective_interval(base: Duration, speed_multiplier: f64) -> Duration {
    if !(speed_multiplier.is_finite() && speed_multiplier > 0.0) {
        return base.max(MIN_TICK_INTERVAL);
    }
    base.div_f64(speed_multiplier).max(MIN_TICK_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.symbols.len(), 22);
        assert_eq!(config.reference_symbol(), Some("AAPL"));
        assert_eq!(config.effective_interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config.notify_throttle_ms, 500);
        assert_eq!(config.starting_cash, 10_000.0);
        assert_eq!(config.data_format, DataFormat::Json);
    }

    #[test]
    fn test_toml_overrides() {
        let config = SimConfig::from_toml_str(
            r#"
            symbols = ["AAPL", "MSFT"]
            reference_symbol = "MSFT"
            data_format = "csv"
            speed_multiplier = 4.0
            "#,
        )
        .unwrap();
        assert_eq!(config.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(config.reference_symbol(), Some("MSFT"));
        assert_eq!(config.data_format, DataFormat::Csv);
        assert_eq!(config.effective_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_unknown_reference_symbol() {
        let result = SimConfig::from_toml_str(
            r#"
            symbols = ["AAPL"]
            reference_symbol = "TSLA"
            "#,
        );
        assert!(matches!(result, Err(SimError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let config = SimConfig {
            speed_multiplier: 0.0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_interval_floor() {
        let base = Duration::from_secs(120);
        assert_eq!(effective_interval(base, 2.0), Duration::from_secs(60));
        assert_eq!(effective_interval(base, 1000.0), MIN_TICK_INTERVAL);
        assert_eq!(effective_interval(base, 0.5), Duration::from_secs(240));
    }
}

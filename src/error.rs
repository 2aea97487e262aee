//! Error types for rusty-tradesim

use thiserror::Error;

/// Main error type for rusty-tradesim
#[derive(Error, Debug)]
pub enum SimError {
    /// A symbol's price series could not be loaded or failed validation.
    /// Fatal to initialization, recoverable by retrying it.
    #[error("Data load failed for {symbol}: {reason}")]
    DataLoad { symbol: String, reason: String },

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Insufficient holdings of {symbol}: requested {requested}, available {available}")]
    InsufficientHoldings {
        symbol: String,
        requested: u64,
        available: u64,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Unsupported state bundle version {found} (expected {expected})")]
    UnsupportedBundleVersion { found: u32, expected: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl SimError {
    pub fn data_load(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::DataLoad {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Business-rule or validation rejection of an order. These leave the
    /// ledger untouched and must not be retried.
    pub fn is_order_rejection(&self) -> bool {
        matches!(
            self,
            SimError::InvalidOrder(_)
                | SimError::InsufficientFunds { .. }
                | SimError::InsufficientHoldings { .. }
        )
    }

    /// Errors worth retrying at the storage boundary.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SimError::Persistence(_) | SimError::IoError(_))
    }
}

/// Result type alias for rusty-tradesim operations
pub type Result<T> = std::result::Result<T, SimError>;

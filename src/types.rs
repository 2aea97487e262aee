//! Core types and constants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type used for ledger and order records
pub type Timestamp = DateTime<Utc>;

/// Unix time in whole seconds, the key of every price point
pub type UnixTime = i64;

/// Wall-clock instant in epoch milliseconds
pub type EpochMillis = i64;

/// Ticker symbol
pub type Symbol = String;

/// Account identifier
pub type AccountId = String;

/// Price type (using f64 for precision)
pub type Price = f64;

/// Share count; orders trade whole shares only
pub type Quantity = u64;

/// Largest share count a holding or order may carry; every count up to it
/// is exact as `f64`
pub const MAX_QUANTITY: Quantity = 1 << 53;

/// Money/cash type
pub type Cash = f64;

/// Process-wide monotonic order identifier
pub type OrderId = u64;

/// One OHLCV observation of a replayed series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: UnixTime,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    #[serde(default)]
    pub volume: f64,
}

impl PricePoint {
    /// Create a new price point
    pub fn new(time: UnixTime, open: Price, high: Price, low: Price, close: Price, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Flat point where every price equals `price`
    pub fn flat(time: UnixTime, price: Price) -> Self {
        Self::new(time, price, price, price, price, 0.0)
    }

    /// Get price range (high - low)
    pub fn range(&self) -> Price {
        self.high - self.low
    }

    /// Prices are finite and non-negative
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p >= 0.0)
            && self.volume.is_finite()
    }
}

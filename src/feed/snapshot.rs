//! Snapshots - the current market state of one symbol

use crate::types::{EpochMillis, Price, PricePoint, UnixTime};
use serde::{Deserialize, Serialize};

/// Price used by [`Quote::or_default_snapshot`] when no data is loaded
pub const PLACEHOLDER_PRICE: Price = 100.0;

/// Derived view of the replay position of a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    pub name: String,
    /// Close of the selected point
    pub price: Price,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub volume: f64,
    /// `close[i] - close[i-1]`, zero at the first point
    pub change: Price,
    pub change_percent: f64,
    /// Index of the selected point within its series
    pub index: usize,
    /// `time` of the selected point
    pub source_time: UnixTime,
    /// Wall-clock instant the snapshot was derived
    pub published_at: EpochMillis,
}

impl Snapshot {
    /// Build from the selected point and its predecessor (if any)
    pub fn from_points(
        symbol: &str,
        name: &str,
        index: usize,
        current: &PricePoint,
        previous: Option<&PricePoint>,
        published_at: EpochMillis,
    ) -> Self {
        let prev_close = previous.map(|p| p.close).unwrap_or(current.close);
        let change = current.close - prev_close;
        let change_percent = if prev_close != 0.0 {
            change / prev_close * 100.0
        } else {
            0.0
        };

        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price: current.close,
            open: current.open,
            high: current.high,
            low: current.low,
            volume: current.volume,
            change,
            change_percent,
            index,
            source_time: current.time,
            published_at,
        }
    }
}

/// Current market state of a symbol, or the explicit absence of one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Quote {
    Live(Snapshot),
    /// Symbol unknown or not loaded yet. Never a tradable price.
    NoData { symbol: String },
}

impl Quote {
    pub fn symbol(&self) -> &str {
        match self {
            Quote::Live(s) => &s.symbol,
            Quote::NoData { symbol } => symbol,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Quote::Live(s) => Some(s),
            Quote::NoData { .. } => None,
        }
    }

    pub fn price(&self) -> Option<Price> {
        self.snapshot().map(|s| s.price)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Quote::Live(_))
    }

    /// Legacy behavior: a flat placeholder at [`PLACEHOLDER_PRICE`] with zero
    /// change. Only for display surfaces that cannot render "no data".
    pub fn or_default_snapshot(&self, now: EpochMillis) -> Snapshot {
        match self {
            Quote::Live(s) => s.clone(),
            Quote::NoData { symbol } => Snapshot {
                symbol: symbol.clone(),
                name: format!("{} Inc.", symbol),
                price: PLACEHOLDER_PRICE,
                open: PLACEHOLDER_PRICE,
                high: PLACEHOLDER_PRICE,
                low: PLACEHOLDER_PRICE,
                volume: 0.0,
                change: 0.0,
                change_percent: 0.0,
                index: 0,
                source_time: now / 1000,
                published_at: now,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_point_has_zero_change() {
        let point = PricePoint::new(100, 10.0, 11.0, 9.0, 10.5, 500.0);
        let snap = Snapshot::from_points("AAPL", "Apple Inc.", 0, &point, None, 1);
        assert_eq!(snap.change, 0.0);
        assert_eq!(snap.change_percent, 0.0);
        assert_eq!(snap.price, 10.5);
        assert_eq!(snap.source_time, 100);
    }

    #[test]
    fn test_change_from_previous_close() {
        let prev = PricePoint::flat(100, 200.0);
        let point = PricePoint::flat(160, 210.0);
        let snap = Snapshot::from_points("MSFT", "MSFT Inc.", 1, &point, Some(&prev), 1);
        assert_relative_eq!(snap.change, 10.0);
        assert_relative_eq!(snap.change_percent, 5.0);
    }

    #[test]
    fn test_zero_previous_close() {
        let prev = PricePoint::flat(100, 0.0);
        let point = PricePoint::flat(160, 5.0);
        let snap = Snapshot::from_points("X", "X", 1, &point, Some(&prev), 1);
        assert_eq!(snap.change, 5.0);
        assert_eq!(snap.change_percent, 0.0);
    }

    #[test]
    fn test_no_data_quote() {
        let quote = Quote::NoData {
            symbol: "ZZZ".to_string(),
        };
        assert!(!quote.is_live());
        assert_eq!(quote.price(), None);
        let placeholder = quote.or_default_snapshot(5_000);
        assert_eq!(placeholder.price, PLACEHOLDER_PRICE);
        assert_eq!(placeholder.change, 0.0);
        assert_eq!(placeholder.source_time, 5);
    }
}

//! Price series - one symbol's time-ordered OHLCV points
//!
//! A series is validated once when it is built and is read-only afterwards.
//! Lookups are binary searches over the `time` key.

use crate::error::{Result, SimError};
use crate::types::{PricePoint, Symbol, UnixTime};
use serde::{Deserialize, Serialize};

/// Time-ordered price points for a single symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: Symbol,
    company: Option<String>,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, rejecting empty, unordered, duplicated or malformed data
    pub fn new(symbol: impl Into<Symbol>, company: Option<String>, points: Vec<PricePoint>) -> Result<Self> {
        let symbol = symbol.into();

        if points.is_empty() {
            return Err(SimError::data_load(&symbol, "series has no price points"));
        }

        for (idx, point) in points.iter().enumerate() {
            if !point.is_well_formed() {
                return Err(SimError::data_load(
                    &symbol,
                    format!("malformed price point at index {} (time {})", idx, point.time),
                ));
            }
        }

        if let Some(idx) = points.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(SimError::data_load(
                &symbol,
                format!(
                    "timestamps not strictly ascending at index {} ({} then {})",
                    idx + 1,
                    points[idx].time,
                    points[idx + 1].time
                ),
            ));
        }

        Ok(Self {
            symbol,
            company,
            points,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Display name, falling back to `"<SYMBOL> Inc."`
    pub fn display_name(&self) -> String {
        self.company
            .clone()
            .unwrap_or_else(|| format!("{} Inc.", self.symbol))
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.points.get(index)
    }

    pub fn first_time(&self) -> UnixTime {
        self.points[0].time
    }

    pub fn last_time(&self) -> UnixTime {
        self.points[self.points.len() - 1].time
    }

    pub fn last_index(&self) -> usize {
        self.points.len() - 1
    }

    /// Index of the point whose time is closest to `target`.
    ///
    /// Distance is absolute; on a tie the earlier index wins. Targets before
    /// the first point or after the last clamp to the ends of the series.
    pub fn nearest_index(&self, target: UnixTime) -> usize {
        // First index with time >= target
        let upper = self.points.partition_point(|p| p.time < target);

        if upper == 0 {
            return 0;
        }
        if upper == self.points.len() {
            return self.points.len() - 1;
        }

        let before = upper - 1;
        let dist_before = target.abs_diff(self.points[before].time);
        let dist_after = self.points[upper].time.abs_diff(target);

        if dist_after < dist_before {
            upper
        } else {
            before
        }
    }

    /// Points with `start <= time <= end`
    pub fn range(&self, start: UnixTime, end: UnixTime) -> &[PricePoint] {
        if start > end {
            return &[];
        }
        let lo = self.points.partition_point(|p| p.time < start);
        let hi = self.points.partition_point(|p| p.time <= end);
        &self.points[lo..hi]
    }
}

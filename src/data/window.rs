//! Relative look-back windows for historical queries

use crate::error::SimError;
use crate::types::UnixTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Look-back window measured back from "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryWindow {
    /// 7 days
    Week,
    /// 30 days
    Month,
    /// 90 days
    Quarter,
    /// 180 days
    HalfYear,
    /// 365 days
    Year,
    /// Arbitrary number of days
    Days(u32),
}

impl HistoryWindow {
    pub fn days(&self) -> i64 {
        match self {
            HistoryWindow::Week => 7,
            HistoryWindow::Month => 30,
            HistoryWindow::Quarter => 90,
            HistoryWindow::HalfYear => 180,
            HistoryWindow::Year => 365,
            HistoryWindow::Days(d) => i64::from(*d),
        }
    }

    /// Inclusive `(start, end)` bounds ending at `now`
    pub fn bounds(&self, now: UnixTime) -> (UnixTime, UnixTime) {
        (now - self.days() * SECONDS_PER_DAY, now)
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        HistoryWindow::Month
    }
}

impl FromStr for HistoryWindow {
    type Err = SimError;

    /// Accepts `1W`, `1M`, `3M`, `6M`, `1Y` or a day count such as `45d`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1W" => Ok(HistoryWindow::Week),
            "1M" => Ok(HistoryWindow::Month),
            "3M" => Ok(HistoryWindow::Quarter),
            "6M" => Ok(HistoryWindow::HalfYear),
            "1Y" => Ok(HistoryWindow::Year),
            other => other
                .strip_suffix('D')
                .and_then(|n| n.parse::<u32>().ok())
                .map(HistoryWindow::Days)
                .ok_or_else(|| SimError::ConfigError(format!("unknown history window '{}'", s))),
        }
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryWindow::Week => write!(f, "1W"),
            HistoryWindow::Month => write!(f, "1M"),
            HistoryWindow::Quarter => write!(f, "3M"),
            HistoryWindow::HalfYear => write!(f, "6M"),
            HistoryWindow::Year => write!(f, "1Y"),
            HistoryWindow::Days(d) => write!(f, "{}d", d),
        }
    }
}

//! Series sources - where replayed price data comes from
//!
//! Every source hands back a fully validated [`PriceSeries`] or a
//! `DataLoad` error naming the symbol.

use crate::data::series::PriceSeries;
use crate::error::{Result, SimError};
use crate::types::{PricePoint, UnixTime};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use hashbrown::HashMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads one symbol's price series
pub trait SeriesSource: Send + Sync {
    fn load(&self, symbol: &str) -> Result<PriceSeries>;
}

/// JSON series file: `{"symbol": ..., "company": ..., "data": [...]}`
#[derive(Debug, Deserialize)]
struct SeriesFile {
    symbol: Option<String>,
    company: Option<String>,
    data: Vec<PricePoint>,
}

/// Reads `<dir>/<SYMBOL>.json`
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.json", symbol))
    }

    /// Parse a series document
    pub fn parse(symbol: &str, contents: &str) -> Result<PriceSeries> {
        let file: SeriesFile = serde_json::from_str(contents)
            .map_err(|e| SimError::data_load(symbol, format!("invalid series JSON: {}", e)))?;

        if let Some(declared) = &file.symbol {
            if declared != symbol {
                log::warn!("Series file for {} declares symbol {}", symbol, declared);
            }
        }

        PriceSeries::new(symbol, file.company, file.data)
    }
}

impl SeriesSource for JsonDirSource {
    fn load(&self, symbol: &str) -> Result<PriceSeries> {
        let path = self.path_for(symbol);
        let contents = fs::read_to_string(&path)
            .map_err(|e| SimError::data_load(symbol, format!("{}: {}", path.display(), e)))?;
        Self::parse(symbol, &contents)
    }
}

/// CSV column naming
#[derive(Debug, Clone)]
pub struct CsvFormat {
    /// Accepted names for the time column, matched case-insensitively
    pub time_columns: Vec<String>,
    pub open_column: String,
    pub high_column: String,
    pub low_column: String,
    pub close_column: String,
    pub volume_column: String,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            time_columns: vec!["time".to_string(), "timestamp".to_string(), "date".to_string()],
            open_column: "open".to_string(),
            high_column: "high".to_string(),
            low_column: "low".to_string(),
            close_column: "close".to_string(),
            volume_column: "volume".to_string(),
        }
    }
}

/// Reads `<dir>/<SYMBOL>.csv`
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
    format: CsvFormat,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            format: CsvFormat::default(),
        }
    }

    pub fn with_format(dir: impl Into<PathBuf>, format: CsvFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }

    /// Load a CSV file into a series
    pub fn load_csv(&self, symbol: &str, path: &Path) -> Result<PriceSeries> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| SimError::data_load(symbol, format!("failed to open {}: {}", path.display(), e)))?;

        let headers = rdr
            .headers()
            .map_err(|e| SimError::data_load(symbol, format!("failed to read headers: {}", e)))?
            .clone();

        let time_idx = self
            .format
            .time_columns
            .iter()
            .find_map(|name| find_column(&headers, name))
            .ok_or_else(|| SimError::data_load(symbol, "no time column"))?;
        let open_idx = require_column(symbol, &headers, &self.format.open_column)?;
        let high_idx = require_column(symbol, &headers, &self.format.high_column)?;
        let low_idx = require_column(symbol, &headers, &self.format.low_column)?;
        let close_idx = require_column(symbol, &headers, &self.format.close_column)?;
        let volume_idx = find_column(&headers, &self.format.volume_column);

        let mut points = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result
                .map_err(|e| SimError::data_load(symbol, format!("failed to read row {}: {}", row + 1, e)))?;

            let row = row + 1;
            let time = parse_time(field(&record, time_idx, "time", symbol, row)?)
                .ok_or_else(|| SimError::data_load(symbol, format!("row {}: unparseable time", row)))?;
            let open = number(&record, open_idx, "open", symbol, row)?;
            let high = number(&record, high_idx, "high", symbol, row)?;
            let low = number(&record, low_idx, "low", symbol, row)?;
            let close = number(&record, close_idx, "close", symbol, row)?;
            let volume = match volume_idx {
                Some(idx) => number(&record, idx, "volume", symbol, row)?,
                None => 0.0,
            };

            if high < low || open > high || open < low || close > high || close < low {
                return Err(SimError::data_load(
                    symbol,
                    format!(
                        "invalid OHLC at time {}: O={} H={} L={} C={}",
                        time, open, high, low, close
                    ),
                ));
            }

            points.push(PricePoint::new(time, open, high, low, close, volume));
        }

        PriceSeries::new(symbol, None, points)
    }
}

impl SeriesSource for CsvDirSource {
    fn load(&self, symbol: &str) -> Result<PriceSeries> {
        let path = self.path_for(symbol);
        self.load_csv(symbol, &path)
    }
}

/// Series held in memory, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<String, PriceSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validated series
    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.symbol().to_string(), series);
    }

    /// Builder-style insert from raw points
    pub fn with_points(mut self, symbol: &str, points: Vec<PricePoint>) -> Result<Self> {
        self.insert(PriceSeries::new(symbol, None, points)?);
        Ok(self)
    }
}

impl SeriesSource for InMemorySource {
    fn load(&self, symbol: &str) -> Result<PriceSeries> {
        self.series
            .get(symbol)
            .cloned()
            .ok_or_else(|| SimError::data_load(symbol, "no series registered"))
    }
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn require_column(symbol: &str, headers: &csv::StringRecord, name: &str) -> Result<usize> {
    find_column(headers, name).ok_or_else(|| SimError::data_load(symbol, format!("column '{}' not found", name)))
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str, symbol: &str, row: usize) -> Result<&'r str> {
    record
        .get(idx)
        .ok_or_else(|| SimError::data_load(symbol, format!("row {}: missing {}", row, name)))
}

fn number(record: &csv::StringRecord, idx: usize, name: &str, symbol: &str, row: usize) -> Result<f64> {
    field(record, idx, name, symbol, row)?
        .parse()
        .map_err(|_| SimError::data_load(symbol, format!("row {}: invalid {}", row, name)))
}

/// Epoch seconds, RFC 3339, `%Y-%m-%d %H:%M:%S` or `%Y-%m-%d` (UTC)
fn parse_time(raw: &str) -> Option<UnixTime> {
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

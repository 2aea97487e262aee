//! Market data handling
//!
//! The price series store is built once, all-or-nothing, from a
//! [`SeriesSource`] and is read-only afterwards.

pub mod series;
pub mod source;
pub mod window;

pub use series::PriceSeries;
pub use source::{CsvDirSource, CsvFormat, InMemorySource, JsonDirSource, SeriesSource};
pub use window::HistoryWindow;

use crate::config::{DataFormat, SimConfig};
use crate::error::Result;
use hashbrown::HashMap;
use std::sync::Arc;

/// Build the source matching the configured data format
pub fn source_for(config: &SimConfig) -> Arc<dyn SeriesSource> {
    match config.data_format {
        DataFormat::Json => Arc::new(JsonDirSource::new(config.data_dir.clone())),
        DataFormat::Csv => Arc::new(CsvDirSource::new(config.data_dir.clone())),
    }
}

/// Loaded series for every configured symbol
#[derive(Debug, Clone, Default)]
pub struct PriceSeriesStore {
    /// Symbols in configured order
    symbols: Vec<String>,
    series: HashMap<String, Arc<PriceSeries>>,
}

impl PriceSeriesStore {
    /// Load every symbol; the first failure aborts the whole load
    pub fn load_all(symbols: &[String], source: &dyn SeriesSource) -> Result<Self> {
        let mut series = HashMap::with_capacity(symbols.len());

        for symbol in symbols {
            let loaded = source.load(symbol)?;
            log::debug!("Loaded {} points for {}", loaded.len(), symbol);
            series.insert(symbol.clone(), Arc::new(loaded));
        }

        Ok(Self {
            symbols: symbols.to_vec(),
            series,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn get(&self, symbol: &str) -> Option<&Arc<PriceSeries>> {
        self.series.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Total number of points across all series
    pub fn point_count(&self) -> usize {
        self.series.values().map(|s| s.len()).sum()
    }
}

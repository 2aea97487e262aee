//! # rusty-tradesim
//!
//! A paper-trading simulator. Historical price series are replayed in
//! lock-step with the wall clock to emulate a live feed, and an average-cost
//! ledger executes orders against it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rusty_tradesim::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let config = SimConfig::default().with_symbols(["AAPL", "MSFT"]);
//! let simulator = TradingSimulator::new(config)?;
//! simulator.initialize()?;
//!
//! simulator.subscribe(|quotes| {
//!     for quote in quotes {
//!         if let Some(price) = quote.price() {
//!             println!("{} {:.2}", quote.symbol(), price);
//!         }
//!     }
//! });
//!
//! let order = simulator.place_order("demo", OrderRequest::market("AAPL", OrderSide::Buy, 10))?;
//! println!("filled at {:.2}", order.execution_price);
//!
//! let ledger = simulator.ledger("demo")?;
//! println!("total value {:.2}", ledger.valuation.total_value);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod feed;
pub mod finance;
pub mod order;
pub mod service;
pub mod store;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::config::{DataFormat, SimConfig};
    pub use crate::data::{HistoryWindow, InMemorySource, PriceSeries, SeriesSource};
    pub use crate::engine::TradeEngine;
    pub use crate::error::{Result, SimError};
    pub use crate::feed::{Clock, ManualClock, Quote, SimulationStatus, Snapshot, SubscriptionId, SystemClock};
    pub use crate::finance::{AccountLedger, Holding, RealizedTrade, TradingStats, ValuedLedger};
    pub use crate::order::{Order, OrderKind, OrderRequest, OrderSide};
    pub use crate::service::TradingSimulator;
    pub use crate::store::{JsonFileStore, LedgerStore, MemoryStore, StateBundle};
    pub use crate::types::*;
}

//! Ledger accounting, valuation and statistics

pub mod ledger;
pub mod stats;
pub mod valuation;

pub use ledger::{AccountLedger, Holding, RealizedTrade};
pub use stats::{PortfolioPerformance, TradingStats};
pub use valuation::{value_ledger, PortfolioValuation, ValuedHolding, ValuedLedger};

//! Portfolio valuation against the latest snapshots
//!
//! Valuation is a pure function of a ledger and a price lookup. It never
//! writes to the ledger or the history collections.

use crate::finance::ledger::{AccountLedger, Holding};
use crate::types::{AccountId, Cash, Price, Timestamp};
use serde::{Deserialize, Serialize};

/// Holding with market value and unrealized P&L
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedHolding {
    #[serde(flatten)]
    pub holding: Holding,
    /// Snapshot price, or the average price when no snapshot exists
    pub current_price: Price,
    /// Whether `current_price` came from a live snapshot
    pub priced: bool,
    pub market_value: Cash,
    pub unrealized_pnl: Cash,
    pub unrealized_pnl_percent: f64,
}

impl ValuedHolding {
    pub fn new(holding: &Holding, price: Option<Price>) -> Self {
        let current_price = price.unwrap_or(holding.average_price);
        let market_value = holding.market_value(current_price);
        let unrealized_pnl = market_value - holding.cost_basis;

        Self {
            holding: holding.clone(),
            current_price,
            priced: price.is_some(),
            market_value,
            unrealized_pnl,
            unrealized_pnl_percent: percent_of(unrealized_pnl, holding.cost_basis),
        }
    }
}

/// Aggregate figures for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub holdings: Vec<ValuedHolding>,
    /// Σ market value
    pub portfolio_value: Cash,
    /// cash + portfolio value
    pub total_value: Cash,
    pub total_cost_basis: Cash,
    /// portfolio value - Σ cost basis
    pub total_return: Cash,
    pub total_return_percent: f64,
}

impl PortfolioValuation {
    /// Σ unrealized P&L
    pub fn unrealized_pnl(&self) -> Cash {
        self.holdings.iter().map(|h| h.unrealized_pnl).sum()
    }
}

/// Ledger together with its valuation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedLedger {
    pub account_id: AccountId,
    pub cash: Cash,
    pub created_at: Timestamp,
    pub last_update: Timestamp,
    #[serde(flatten)]
    pub valuation: PortfolioValuation,
}

impl ValuedLedger {
    pub fn holding(&self, symbol: &str) -> Option<&ValuedHolding> {
        self.valuation.holdings.iter().find(|h| h.holding.symbol == symbol)
    }
}

/// Value every holding of `ledger` with `price_of`
pub fn value_ledger<F>(ledger: &AccountLedger, price_of: F) -> ValuedLedger
where
    F: Fn(&str) -> Option<Price>,
{
    let holdings: Vec<ValuedHolding> = ledger
        .holdings
        .values()
        .map(|holding| ValuedHolding::new(holding, price_of(&holding.symbol)))
        .collect();

    let portfolio_value: Cash = holdings.iter().map(|h| h.market_value).sum();
    let total_cost_basis = ledger.total_cost_basis();
    let total_return = portfolio_value - total_cost_basis;

    ValuedLedger {
        account_id: ledger.account_id.clone(),
        cash: ledger.cash,
        created_at: ledger.created_at,
        last_update: ledger.last_update,
        valuation: PortfolioValuation {
            holdings,
            portfolio_value,
            total_value: ledger.cash + portfolio_value,
            total_cost_basis,
            total_return,
            total_return_percent: percent_of(total_return, total_cost_basis),
        },
    }
}

fn percent_of(value: Cash, base: Cash) -> f64 {
    if base > 0.0 {
        value / base * 100.0
    } else {
        0.0
    }
}

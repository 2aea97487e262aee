//! Account ledger - cash, average-cost holdings and realized P&L
//!
//! Holdings use the average cost method: buys merge into a weighted average,
//! sells realize `(sale_price - average_price) * quantity` and leave the
//! average of the remaining shares unchanged.

use crate::error::{Result, SimError};
use crate::types::{AccountId, Cash, Price, Quantity, Symbol, Timestamp, MAX_QUANTITY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shares of one symbol held by an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: Symbol,
    pub quantity: Quantity,
    /// Total amount paid for the shares still held
    pub cost_basis: Cash,
    /// `cost_basis / quantity`
    pub average_price: Price,
    /// First purchase of the current lot
    pub purchase_date: Timestamp,
}

impl Holding {
    pub fn new(symbol: impl Into<Symbol>, quantity: Quantity, price: Price, purchase_date: Timestamp) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            cost_basis: quantity as f64 * price,
            average_price: price,
            purchase_date,
        }
    }

    /// Merge a purchase into the weighted average
    fn add_shares(&mut self, quantity: Quantity, price: Price) {
        self.quantity += quantity;
        self.cost_basis += quantity as f64 * price;
        self.average_price = self.cost_basis / self.quantity as f64;
    }

    pub fn market_value(&self, price: Price) -> Cash {
        self.quantity as f64 * price
    }
}

/// Closed portion of a holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedTrade {
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub buy_price: Price,
    pub sell_price: Price,
    /// `(sell_price - buy_price) * quantity`
    pub realized_pnl: Cash,
    pub timestamp: Timestamp,
}

impl RealizedTrade {
    pub fn is_win(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.realized_pnl < 0.0
    }
}

/// Cash and holdings of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLedger {
    pub account_id: AccountId,
    pub cash: Cash,
    /// Keyed by symbol; a symbol never appears twice
    pub holdings: BTreeMap<Symbol, Holding>,
    pub created_at: Timestamp,
    pub last_update: Timestamp,
}

impl AccountLedger {
    pub fn new(account_id: impl Into<AccountId>, starting_cash: Cash, created_at: Timestamp) -> Self {
        Self {
            account_id: account_id.into(),
            cash: starting_cash,
            holdings: BTreeMap::new(),
            created_at,
            last_update: created_at,
        }
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    pub fn quantity_of(&self, symbol: &str) -> Quantity {
        self.holding(symbol).map(|h| h.quantity).unwrap_or(0)
    }

    pub fn total_cost_basis(&self) -> Cash {
        self.holdings.values().map(|h| h.cost_basis).sum()
    }

    /// Debit `quantity * price` and merge the shares into the holding.
    ///
    /// No partial fills: without enough cash the ledger is left untouched.
    pub fn apply_buy(&mut self, symbol: &str, quantity: Quantity, price: Price, at: Timestamp) -> Result<Cash> {
        let held = self.quantity_of(symbol);
        match held.checked_add(quantity) {
            Some(total) if total <= MAX_QUANTITY => {}
            _ => {
                return Err(SimError::InvalidOrder(format!(
                    "holding of {} would exceed {} shares",
                    symbol, MAX_QUANTITY
                )))
            }
        }

        let required = quantity as f64 * price;
        if self.cash < required {
            return Err(SimError::InsufficientFunds {
                required,
                available: self.cash,
            });
        }

        self.cash -= required;
        match self.holdings.get_mut(symbol) {
            Some(holding) => holding.add_shares(quantity, price),
            None => {
                self.holdings
                    .insert(symbol.to_string(), Holding::new(symbol, quantity, price, at));
            }
        }
        self.last_update = at;
        Ok(required)
    }

    /// Credit `quantity * price`, realize P&L against the average price and
    /// shrink (or remove) the holding.
    pub fn apply_sell(
        &mut self,
        symbol: &str,
        quantity: Quantity,
        price: Price,
        at: Timestamp,
    ) -> Result<RealizedTrade> {
        let available = self.quantity_of(symbol);
        let holding = match self.holdings.get_mut(symbol) {
            Some(holding) if holding.quantity >= quantity => holding,
            _ => {
                return Err(SimError::InsufficientHoldings {
                    symbol: symbol.to_string(),
                    requested: quantity,
                    available,
                })
            }
        };

        let average_price = holding.average_price;
        let realized = RealizedTrade {
            symbol: symbol.to_string(),
            quantity,
            buy_price: average_price,
            sell_price: price,
            realized_pnl: (price - average_price) * quantity as f64,
            timestamp: at,
        };

        if quantity == holding.quantity {
            self.holdings.remove(symbol);
        } else {
            holding.quantity -= quantity;
            holding.cost_basis = holding.quantity as f64 * average_price;
        }

        self.cash += quantity as f64 * price;
        self.last_update = at;
        Ok(realized)
    }
}

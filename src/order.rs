//! Order types
//!
//! Orders fill immediately and completely, so an [`Order`] is only ever
//! created for an executed trade and is immutable afterwards.

use crate::error::{Result, SimError};
use crate::types::{AccountId, Cash, OrderId, Price, Quantity, Symbol, Timestamp, MAX_QUANTITY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(SimError::InvalidOrder(format!("unknown side '{}'", other))),
        }
    }
}

/// How the execution price is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Execute at the current snapshot price
    Market,
    /// Execute immediately at the caller's price
    Limit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "market"),
            OrderKind::Limit => write!(f, "limit"),
        }
    }
}

impl FromStr for OrderKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "market" => Ok(OrderKind::Market),
            "limit" => Ok(OrderKind::Limit),
            other => Err(SimError::InvalidOrder(format!("unknown order kind '{}'", other))),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Executed,
}

/// Caller's instruction to trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub kind: OrderKind,
    /// Required for limit orders, ignored for market orders
    pub limit_price: Option<Price>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<Symbol>, side: OrderSide, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            kind: OrderKind::Market,
            limit_price: None,
        }
    }

    pub fn limit(symbol: impl Into<Symbol>, side: OrderSide, quantity: Quantity, limit_price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            kind: OrderKind::Limit,
            limit_price: Some(limit_price),
        }
    }

    /// Shape checks that need no market data or ledger
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(SimError::InvalidOrder("symbol is empty".to_string()));
        }
        if self.quantity == 0 {
            return Err(SimError::InvalidOrder("quantity must be a positive integer".to_string()));
        }
        if self.quantity > MAX_QUANTITY {
            return Err(SimError::InvalidOrder(format!(
                "quantity {} exceeds the maximum of {}",
                self.quantity, MAX_QUANTITY
            )));
        }
        if self.kind == OrderKind::Limit {
            match self.limit_price {
                Some(price) if price.is_finite() && price > 0.0 => {}
                Some(price) => {
                    return Err(SimError::InvalidOrder(format!(
                        "limit price must be positive, got {}",
                        price
                    )))
                }
                None => return Err(SimError::InvalidOrder("limit order without a price".to_string())),
            }
        }
        Ok(())
    }
}

/// Executed trade record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub execution_price: Price,
    pub order_kind: OrderKind,
    pub limit_price: Option<Price>,
    /// `quantity * execution_price`
    pub total_value: Cash,
    pub timestamp: Timestamp,
    pub status: OrderStatus,
}

impl Order {
    pub fn executed(
        id: OrderId,
        account_id: &str,
        request: &OrderRequest,
        execution_price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            account_id: account_id.to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            execution_price,
            order_kind: request.kind,
            limit_price: match request.kind {
                OrderKind::Limit => request.limit_price,
                OrderKind::Market => None,
            },
            total_value: request.quantity as f64 * execution_price,
            timestamp,
            status: OrderStatus::Executed,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.side == OrderSide::Buy
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order(#{}, {} {} {} @ {:.2}, {})",
            self.id, self.side, self.quantity, self.symbol, self.execution_price, self.order_kind
        )
    }
}

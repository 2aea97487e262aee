//! Ledger persistence
//!
//! Four independent keyed collections: ledgers by account, orders by account
//! (most recent first), realized trades by account (append order) and the
//! order id counter. A [`TradeCommit`] lands in all of them at once or not
//! at all, and its order id is only consumed when it lands.

pub mod bundle;
pub mod file;
pub mod memory;

pub use bundle::{StateBundle, BUNDLE_VERSION};
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::finance::{AccountLedger, RealizedTrade};
use crate::order::Order;
use crate::types::{AccountId, OrderId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one executed trade writes
#[derive(Debug, Clone, PartialEq)]
pub struct TradeCommit {
    pub ledger: AccountLedger,
    pub order: Order,
    /// Present for sells only
    pub realized: Option<RealizedTrade>,
}

/// Storage backend for ledgers and their histories
pub trait LedgerStore: Send + Sync {
    /// Ledger of `account`, or `None` if it was never opened
    fn load_ledger(&self, account: &str) -> Result<Option<AccountLedger>>;

    /// Orders of `account`, most recent first
    fn load_orders(&self, account: &str) -> Result<Vec<Order>>;

    /// Realized trades of `account`, oldest first
    fn load_realized(&self, account: &str) -> Result<Vec<RealizedTrade>>;

    /// Accounts with a stored ledger
    fn accounts(&self) -> Result<Vec<AccountId>>;

    fn save_ledger(&self, ledger: &AccountLedger) -> Result<()>;

    /// Hand the next order id to `build` and apply the resulting ledger,
    /// order and realized trade atomically. On error the counter does not
    /// move.
    fn commit(&self, build: &dyn Fn(OrderId) -> TradeCommit) -> Result<Order>;

    /// Copy of every collection
    fn export(&self) -> Result<StoreState>;

    /// Replace every collection
    fn import(&self, state: StoreState) -> Result<()>;

    /// Wipe every collection and reset the order counter
    fn clear(&self) -> Result<()>;
}

/// Contents of all four collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub ledgers: BTreeMap<AccountId, AccountLedger>,
    #[serde(default)]
    pub orders: BTreeMap<AccountId, Vec<Order>>,
    #[serde(default)]
    pub realized: BTreeMap<AccountId, Vec<RealizedTrade>>,
    #[serde(default = "first_order_id")]
    pub next_order_id: OrderId,
}

fn first_order_id() -> OrderId {
    1
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            ledgers: BTreeMap::new(),
            orders: BTreeMap::new(),
            realized: BTreeMap::new(),
            next_order_id: first_order_id(),
        }
    }
}

impl StoreState {
    pub fn orders_of(&self, account: &str) -> Vec<Order> {
        self.orders.get(account).cloned().unwrap_or_default()
    }

    pub fn realized_of(&self, account: &str) -> Vec<RealizedTrade> {
        self.realized.get(account).cloned().unwrap_or_default()
    }

    /// Build a commit with the next order id and apply it
    pub fn commit_next(&mut self, build: &dyn Fn(OrderId) -> TradeCommit) -> Order {
        let commit = build(self.next_order_id);
        let order = commit.order.clone();
        self.apply(commit);
        order
    }

    pub fn apply(&mut self, commit: TradeCommit) {
        let account = commit.ledger.account_id.clone();
        // ids handed out elsewhere (e.g. before an import) must stay unique
        self.next_order_id = self.next_order_id.max(commit.order.id + 1);
        self.orders.entry(account.clone()).or_default().insert(0, commit.order);
        if let Some(realized) = commit.realized {
            self.realized.entry(account.clone()).or_default().push(realized);
        }
        self.ledgers.insert(account, commit.ledger);
    }

    /// Smallest counter value above every stored order id
    pub fn min_next_order_id(&self) -> OrderId {
        self.orders
            .values()
            .flatten()
            .map(|o| o.id + 1)
            .max()
            .unwrap_or(1)
    }

    pub fn order_count(&self) -> usize {
        self.orders.values().map(Vec::len).sum()
    }
}

//! In-process store

use crate::error::Result;
use crate::finance::{AccountLedger, RealizedTrade};
use crate::order::Order;
use crate::store::{LedgerStore, StoreState, TradeCommit};
use crate::types::{AccountId, OrderId};
use parking_lot::RwLock;

/// Store that lives and dies with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

impl LedgerStore for MemoryStore {
    fn load_ledger(&self, account: &str) -> Result<Option<AccountLedger>> {
        Ok(self.state.read().ledgers.get(account).cloned())
    }

    fn load_orders(&self, account: &str) -> Result<Vec<Order>> {
        Ok(self.state.read().orders_of(account))
    }

    fn load_realized(&self, account: &str) -> Result<Vec<RealizedTrade>> {
        Ok(self.state.read().realized_of(account))
    }

    fn accounts(&self) -> Result<Vec<AccountId>> {
        Ok(self.state.read().ledgers.keys().cloned().collect())
    }

    fn save_ledger(&self, ledger: &AccountLedger) -> Result<()> {
        self.state
            .write()
            .ledgers
            .insert(ledger.account_id.clone(), ledger.clone());
        Ok(())
    }

    fn commit(&self, build: &dyn Fn(OrderId) -> TradeCommit) -> Result<Order> {
        Ok(self.state.write().commit_next(build))
    }

    fn export(&self) -> Result<StoreState> {
        Ok(self.state.read().clone())
    }

    fn import(&self, state: StoreState) -> Result<()> {
        *self.state.write() = state;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.state.write() = StoreState::default();
        Ok(())
    }
}

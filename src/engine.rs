//! Trade execution engine
//!
//! Orders fill immediately and completely against the current snapshot (or
//! the caller's limit price). The whole read-modify-write of a trade holds
//! the account's lock, so trades on one account are serialized while
//! different accounts proceed in parallel.

use crate::error::{Result, SimError};
use crate::feed::{Clock, MarketPrices, Quote};
use crate::finance::AccountLedger;
use crate::order::{Order, OrderKind, OrderRequest, OrderSide};
use crate::store::{LedgerStore, TradeCommit};
use crate::types::{AccountId, Cash, Price};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Executes orders against ledgers held in a [`LedgerStore`]
pub struct TradeEngine {
    store: Arc<dyn LedgerStore>,
    market: Arc<dyn MarketPrices>,
    clock: Arc<dyn Clock>,
    /// Cash granted to an account on first use
    starting_cash: Cash,
    account_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

impl TradeEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        market: Arc<dyn MarketPrices>,
        clock: Arc<dyn Clock>,
        starting_cash: Cash,
    ) -> Self {
        Self {
            store,
            market,
            clock,
            starting_cash,
            account_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn starting_cash(&self) -> Cash {
        self.starting_cash
    }

    fn account_lock(&self, account: &str) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock();
        match locks.get(account) {
            Some(lock) => Arc::clone(lock),
            None => {
                let lock = Arc::new(Mutex::new(()));
                locks.insert(account.to_string(), Arc::clone(&lock));
                lock
            }
        }
    }

    /// Stored ledger of `account`, opened with the starting cash if new.
    /// Caller must hold the account lock.
    fn load_or_open(&self, account: &str) -> Result<AccountLedger> {
        if let Some(ledger) = self.store.load_ledger(account)? {
            return Ok(ledger);
        }
        let ledger = AccountLedger::new(account, self.starting_cash, self.clock.now_utc());
        self.store.save_ledger(&ledger)?;
        log::info!("Opened account {} with {:.2} cash", account, self.starting_cash);
        Ok(ledger)
    }

    /// Ledger of `account`, opening it on first use
    pub fn ledger(&self, account: &str) -> Result<AccountLedger> {
        validate_account(account)?;
        let lock = self.account_lock(account);
        let _guard = lock.lock();
        self.load_or_open(account)
    }

    /// Resolve the fill price of `request`
    fn execution_price(&self, request: &OrderRequest) -> Result<Price> {
        if !self.market.has_symbol(&request.symbol) {
            return Err(SimError::InvalidOrder(format!("unknown symbol {}", request.symbol)));
        }

        let price = match request.kind {
            OrderKind::Limit => request.limit_price.unwrap_or_default(),
            OrderKind::Market => match self.market.quote(&request.symbol) {
                Quote::Live(snapshot) => snapshot.price,
                Quote::NoData { symbol } => {
                    return Err(SimError::InvalidOrder(format!("no market data for {}", symbol)))
                }
            },
        };

        if !(price.is_finite() && price > 0.0) {
            return Err(SimError::InvalidOrder(format!(
                "execution price for {} must be positive, got {}",
                request.symbol, price
            )));
        }
        Ok(price)
    }

    /// Validate and apply one order.
    ///
    /// On any error the ledger, the order history and the realized history
    /// are left exactly as they were.
    pub fn execute(&self, account: &str, request: &OrderRequest) -> Result<Order> {
        validate_account(account)?;
        request.validate()?;
        let price = self.execution_price(request)?;

        let lock = self.account_lock(account);
        let _guard = lock.lock();

        let mut ledger = self.load_or_open(account)?;
        let now = self.clock.now_utc();

        let realized = match request.side {
            OrderSide::Buy => {
                ledger.apply_buy(&request.symbol, request.quantity, price, now)?;
                None
            }
            OrderSide::Sell => Some(ledger.apply_sell(&request.symbol, request.quantity, price, now)?),
        };

        let order = self.store.commit(&|id| TradeCommit {
            ledger: ledger.clone(),
            order: Order::executed(id, account, request, price, now),
            realized: realized.clone(),
        })?;

        match &realized {
            Some(trade) => log::info!(
                "Executed {} for {} (realized {:.2})",
                order,
                account,
                trade.realized_pnl
            ),
            None => log::info!("Executed {} for {}", order, account),
        }
        Ok(order)
    }
}

fn validate_account(account: &str) -> Result<()> {
    if account.trim().is_empty() {
        return Err(SimError::InvalidOrder("account id is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ManualClock, Snapshot};
    use crate::store::MemoryStore;
    use crate::types::PricePoint;
    use approx::assert_relative_eq;
    use parking_lot::RwLock;

    #[derive(Default)]
    struct FixedPrices {
        prices: RwLock<HashMap<String, Option<f64>>>,
    }

    impl FixedPrices {
        fn set(&self, symbol: &str, price: Option<f64>) {
            self.prices.write().insert(symbol.to_string(), price);
        }
    }

    impl MarketPrices for FixedPrices {
        fn quote(&self, symbol: &str) -> Quote {
            match self.prices.read().get(symbol).copied().flatten() {
                Some(price) => Quote::Live(Snapshot::from_points(
                    symbol,
                    symbol,
                    0,
                    &PricePoint::flat(0, price),
                    None,
                    0,
                )),
                None => Quote::NoData {
                    symbol: symbol.to_string(),
                },
            }
        }

        fn has_symbol(&self, symbol: &str) -> bool {
            self.prices.read().contains_key(symbol)
        }
    }

    fn engine() -> (TradeEngine, Arc<FixedPrices>) {
        let prices = Arc::new(FixedPrices::default());
        prices.set("AAPL", Some(150.0));
        prices.set("MSFT", Some(200.0));
        prices.set("DARK", None);
        let engine = TradeEngine::new(
            Arc::new(MemoryStore::new()),
            prices.clone(),
            Arc::new(ManualClock::new(1_000)),
            10_000.0,
        );
        (engine, prices)
    }

    #[test]
    fn test_market_buy_uses_snapshot_price() {
        let (engine, _) = engine();
        let order = engine
            .execute("u1", &OrderRequest::market("AAPL", OrderSide::Buy, 10))
            .unwrap();

        assert_eq!(order.id, 1);
        assert_eq!(order.execution_price, 150.0);
        assert_eq!(order.total_value, 1500.0);

        let ledger = engine.ledger("u1").unwrap();
        assert_eq!(ledger.cash, 8500.0);
        assert_eq!(ledger.holding("AAPL").unwrap().quantity, 10);
    }

    #[test]
    fn test_limit_fills_at_caller_price() {
        let (engine, _) = engine();
        let order = engine
            .execute("u1", &OrderRequest::limit("AAPL", OrderSide::Buy, 2, 140.0))
            .unwrap();
        assert_eq!(order.execution_price, 140.0);
        assert_eq!(order.order_kind, OrderKind::Limit);
    }

    #[test]
    fn test_sell_records_realized_trade() {
        let (engine, prices) = engine();
        engine
            .execute("u1", &OrderRequest::market("MSFT", OrderSide::Buy, 10))
            .unwrap();
        prices.set("MSFT", Some(250.0));
        engine
            .execute("u1", &OrderRequest::market("MSFT", OrderSide::Sell, 4))
            .unwrap();

        let realized = engine.store().load_realized("u1").unwrap();
        assert_eq!(realized.len(), 1);
        assert_relative_eq!(realized[0].realized_pnl, 200.0);

        let orders = engine.store().load_orders("u1").unwrap();
        assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_rejections_leave_state_untouched() {
        let (engine, _) = engine();
        engine
            .execute("u1", &OrderRequest::market("AAPL", OrderSide::Buy, 1))
            .unwrap();
        let before = engine.ledger("u1").unwrap();

        let cases = [
            OrderRequest::market("AAPL", OrderSide::Buy, 0),
            OrderRequest::market("AAPL", OrderSide::Buy, 1_000),
            OrderRequest::market("AAPL", OrderSide::Sell, 2),
            OrderRequest::market("ZZZ", OrderSide::Buy, 1),
            OrderRequest::market("DARK", OrderSide::Buy, 1),
            OrderRequest::limit("AAPL", OrderSide::Buy, 1, 0.0),
        ];
        for request in &cases {
            let err = engine.execute("u1", request).unwrap_err();
            assert!(err.is_order_rejection(), "{:?} -> {:?}", request, err);
        }

        assert_eq!(engine.ledger("u1").unwrap(), before);
        assert_eq!(engine.store().load_orders("u1").unwrap().len(), 1);
        assert!(engine.store().load_realized("u1").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_account_opens_with_starting_cash() {
        let (engine, _) = engine();
        let ledger = engine.ledger("fresh").unwrap();
        assert_eq!(ledger.cash, 10_000.0);
        assert!(ledger.holdings.is_empty());
        assert!(engine.ledger("").is_err());
    }

    #[test]
    fn test_concurrent_buys_on_one_account() {
        let (engine, _) = engine();
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    engine.execute("shared", &OrderRequest::limit("AAPL", OrderSide::Buy, 10, 100.0))
                })
            })
            .collect();
        let filled = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();

        // eight lots of 1 000 fit into 10 000 cash
        assert_eq!(filled, 8);
        let ledger = engine.ledger("shared").unwrap();
        assert_relative_eq!(ledger.cash, 2_000.0);
        assert_eq!(ledger.holding("AAPL").unwrap().quantity, 80);
    }
}

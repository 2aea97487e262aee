//! Trading simulator service
//!
//! [`TradingSimulator`] wires the replayed feed, the trade engine and the
//! ledger store together. Build one at startup and share it by `Arc`.

pub mod valuator;

pub use valuator::PortfolioValuator;

use crate::config::SimConfig;
use crate::data::{self, HistoryWindow, SeriesSource};
use crate::engine::TradeEngine;
use crate::error::Result;
use crate::feed::{
    Clock, Instrument, Quote, ReplayDriver, SimulationStatus, Snapshot, SubscriptionId, SystemClock,
    TickOutcome, TimelineSynchronizer,
};
use crate::finance::{value_ledger, PortfolioPerformance, RealizedTrade, TradingStats, ValuedLedger};
use crate::order::{Order, OrderRequest};
use crate::store::{LedgerStore, MemoryStore, StateBundle};
use crate::types::{EpochMillis, PricePoint};
use std::sync::Arc;
use std::time::Duration;

pub struct TradingSimulator {
    config: SimConfig,
    source: Arc<dyn SeriesSource>,
    timeline: Arc<TimelineSynchronizer>,
    engine: TradeEngine,
    valuator: Arc<PortfolioValuator>,
    valuator_subscription: SubscriptionId,
    replay: ReplayDriver,
}

impl std::fmt::Debug for TradingSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingSimulator")
            .field("timeline", &self.timeline)
            .field("replay", &self.replay)
            .finish()
    }
}

impl TradingSimulator {
    /// Simulator reading series as configured, with an in-memory store
    pub fn new(config: SimConfig) -> Result<Self> {
        let source = data::source_for(&config);
        Self::with_parts(config, source, Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: SimConfig,
        source: Arc<dyn SeriesSource>,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let timeline = Arc::new(TimelineSynchronizer::new(&config, Arc::clone(&clock)));
        let engine = TradeEngine::new(
            Arc::clone(&store),
            timeline.clone(),
            clock,
            config.starting_cash,
        );

        let valuator = Arc::new(PortfolioValuator::new(store));
        let subscriber = Arc::clone(&valuator);
        let valuator_subscription = timeline.subscribe(move |quotes| subscriber.on_publish(quotes));

        let replay = ReplayDriver::new(
            Arc::clone(&timeline),
            config.base_interval(),
            config.speed_multiplier,
        );

        Ok(Self {
            config,
            source,
            timeline,
            engine,
            valuator,
            valuator_subscription,
            replay,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Arc<TimelineSynchronizer> {
        &self.timeline
    }

    /// Load every configured series and start the timeline at now
    pub fn initialize(&self) -> Result<()> {
        self.timeline.initialize(self.source.as_ref())
    }

    /// Load every configured series, resuming a timeline started at
    /// `simulation_start` (epoch millis)
    pub fn initialize_from(&self, simulation_start: EpochMillis) -> Result<()> {
        self.timeline
            .initialize_from(self.source.as_ref(), Some(simulation_start))
    }

    /// Start the background replay timer (requires a tokio runtime)
    pub fn start_replay(&self) -> Result<Duration> {
        self.replay.start()
    }

    pub async fn stop_replay(&self) {
        self.replay.stop().await
    }

    /// Change the replay speed; returns the new timer period
    pub async fn set_speed(&self, multiplier: f64) -> Result<Duration> {
        self.replay.set_speed(multiplier).await
    }

    pub fn is_replaying(&self) -> bool {
        self.replay.is_running()
    }

    /// Stop the timer and detach the valuator
    pub async fn shutdown(&self) {
        self.replay.stop().await;
        self.timeline.unsubscribe(self.valuator_subscription);
        log::info!("Simulator shut down");
    }

    /// Run one replay step immediately
    pub fn tick(&self) -> TickOutcome {
        self.timeline.tick()
    }

    pub fn current_quote(&self, symbol: &str) -> Quote {
        self.timeline.current_quote(symbol)
    }

    pub fn all_current_quotes(&self) -> Vec<Quote> {
        self.timeline.all_current_quotes()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Quote]) + Send + Sync + 'static,
    {
        self.timeline.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.timeline.unsubscribe(id)
    }

    pub fn historical_series(&self, symbol: &str, window: HistoryWindow) -> Vec<PricePoint> {
        self.timeline.historical_series(symbol, window)
    }

    pub fn advance(&self, symbol: &str) -> Option<Snapshot> {
        self.timeline.advance(symbol)
    }

    pub fn retreat(&self, symbol: &str) -> Option<Snapshot> {
        self.timeline.retreat(symbol)
    }

    /// Restart the replay from the first point of every series. Ledgers are
    /// not touched. Returns false before initialization.
    pub fn reset_simulation(&self) -> bool {
        self.timeline.reset_to_start()
    }

    pub fn status(&self) -> SimulationStatus {
        self.timeline.status()
    }

    pub fn instruments(&self) -> Vec<Instrument> {
        self.timeline.instruments()
    }

    /// Execute an order and revalue the account
    pub fn place_order(&self, account: &str, request: OrderRequest) -> Result<Order> {
        let order = self.engine.execute(account, &request)?;
        if let Err(e) = self.valuator.revalue(account, |s| self.timeline.current_quote(s).price()) {
            log::warn!("Post-trade valuation of {} failed: {}", account, e);
        }
        Ok(order)
    }

    /// Ledger of `account` valued at the current snapshots
    pub fn ledger(&self, account: &str) -> Result<ValuedLedger> {
        let ledger = self.engine.ledger(account)?;
        let price_of = |symbol: &str| self.timeline.current_quote(symbol).price();
        match self.valuator.revalue(account, price_of)? {
            Some(valued) => Ok(valued),
            None => Ok(value_ledger(&ledger, price_of)),
        }
    }

    /// Valuation from the latest publish or trade, if the account has one
    pub fn cached_ledger(&self, account: &str) -> Option<ValuedLedger> {
        self.valuator.cached(account)
    }

    /// Orders of `account`, most recent first
    pub fn order_history(&self, account: &str) -> Result<Vec<Order>> {
        self.engine.store().load_orders(account)
    }

    /// Realized trades of `account`, oldest first
    pub fn realized_history(&self, account: &str) -> Result<Vec<RealizedTrade>> {
        self.engine.store().load_realized(account)
    }

    pub fn trading_stats(&self, account: &str) -> Result<TradingStats> {
        let orders = self.order_history(account)?;
        let realized = self.realized_history(account)?;
        Ok(TradingStats::from_history(&orders, &realized))
    }

    pub fn performance(&self, account: &str) -> Result<PortfolioPerformance> {
        let valued = self.ledger(account)?;
        let orders = self.order_history(account)?;
        let realized = self.realized_history(account)?;
        Ok(PortfolioPerformance::new(&valued, &orders, &realized))
    }

    pub fn export_state(&self) -> Result<StateBundle> {
        let state = self.engine.store().export()?;
        Ok(StateBundle::new(state, chrono::Utc::now()))
    }

    /// Replace every stored collection with the bundle's contents
    pub fn import_state(&self, bundle: StateBundle) -> Result<()> {
        let state = bundle.into_state()?;
        let accounts = state.ledgers.len();
        self.engine.store().import(state)?;
        self.valuator.clear();
        log::info!("Imported state with {} accounts", accounts);
        Ok(())
    }

    /// Wipe every ledger, order, realized trade and the order counter
    pub fn clear_all_data(&self) -> Result<()> {
        self.engine.store().clear()?;
        self.valuator.clear();
        log::info!("All trading data cleared");
        Ok(())
    }
}

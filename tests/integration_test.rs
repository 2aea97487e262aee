//! End-to-end tests for rusty-tradesim

use approx::assert_relative_eq;
use rusty_tradesim::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const WALL_START: i64 = 1_800_000_000_000;
const DATA_START: i64 = 1_719_792_000;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn minute_points(closes: &[f64]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| PricePoint::new(DATA_START + i as i64 * 60, *c, c + 2.0, c - 2.0, *c, 1_000.0))
        .collect()
}

fn simulator() -> (TradingSimulator, ManualClock) {
    init_logging();
    let clock = ManualClock::new(WALL_START);
    let mut config = SimConfig::default().with_symbols(["AAPL", "MSFT"]);
    config.notify_throttle_ms = 0;

    let source = InMemorySource::new()
        .with_points("AAPL", minute_points(&[100.0, 120.0, 150.0, 140.0]))
        .unwrap()
        .with_points("MSFT", minute_points(&[300.0, 310.0]))
        .unwrap();

    let simulator = TradingSimulator::with_parts(
        config,
        Arc::new(source),
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
    )
    .unwrap();
    simulator.initialize().unwrap();
    (simulator, clock)
}

/// Run the clock to the `minute`-th point and tick
fn move_to(simulator: &TradingSimulator, clock: &ManualClock, minute: i64) {
    clock.set(WALL_START + minute * 60_000);
    simulator.tick();
}

#[test]
fn test_scenarios_buy_buy_sell_oversell() {
    let (sim, clock) = simulator();
    let account = "trader";

    // Scenario 1: buy 10 @ 100
    sim.place_order(account, OrderRequest::market("AAPL", OrderSide::Buy, 10))
        .unwrap();
    let ledger = sim.ledger(account).unwrap();
    assert_relative_eq!(ledger.cash, 9000.0);
    let holding = &ledger.holding("AAPL").unwrap().holding;
    assert_eq!(holding.quantity, 10);
    assert_relative_eq!(holding.average_price, 100.0);
    assert_relative_eq!(holding.cost_basis, 1000.0);

    // Scenario 2: buy 5 more @ 120
    move_to(&sim, &clock, 1);
    let order = sim
        .place_order(account, OrderRequest::market("AAPL", OrderSide::Buy, 5))
        .unwrap();
    assert_eq!(order.execution_price, 120.0);
    let ledger = sim.ledger(account).unwrap();
    assert_relative_eq!(ledger.cash, 8400.0);
    let holding = &ledger.holding("AAPL").unwrap().holding;
    assert_eq!(holding.quantity, 15);
    assert_relative_eq!(holding.cost_basis, 1600.0);
    assert_relative_eq!(holding.average_price, 1600.0 / 15.0);

    // Scenario 3: sell 5 @ 150
    move_to(&sim, &clock, 2);
    sim.place_order(account, OrderRequest::market("AAPL", OrderSide::Sell, 5))
        .unwrap();
    let ledger = sim.ledger(account).unwrap();
    assert_relative_eq!(ledger.cash, 9150.0);
    let holding = &ledger.holding("AAPL").unwrap().holding;
    assert_eq!(holding.quantity, 10);
    assert_relative_eq!(holding.average_price, 1600.0 / 15.0);
    assert_relative_eq!(holding.cost_basis, 1066.6666666666667, epsilon = 1e-9);

    let realized = sim.realized_history(account).unwrap();
    assert_eq!(realized.len(), 1);
    assert_relative_eq!(realized[0].realized_pnl, 216.66666666666666, epsilon = 1e-9);
    assert_eq!(format!("{:.2}", realized[0].realized_pnl), "216.67");

    // Scenario 4: oversell is rejected and nothing changes
    let before = sim.ledger(account).unwrap();
    let err = sim
        .place_order(account, OrderRequest::market("AAPL", OrderSide::Sell, 20))
        .unwrap_err();
    assert!(matches!(
        err,
        SimError::InsufficientHoldings { requested: 20, available: 10, .. }
    ));
    assert_eq!(sim.ledger(account).unwrap(), before);
    assert_eq!(sim.order_history(account).unwrap().len(), 3);
    assert_eq!(sim.realized_history(account).unwrap().len(), 1);
}

#[test]
fn test_scenario_snapshots_are_byte_identical() {
    let (sim, clock) = simulator();
    move_to(&sim, &clock, 1);

    let first = sim.current_quote("AAPL");
    clock.advance_millis(1);
    let second = sim.current_quote("AAPL");

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn test_order_history_is_newest_first_with_unique_ids() {
    let (sim, _) = simulator();
    for _ in 0..3 {
        sim.place_order("a", OrderRequest::market("AAPL", OrderSide::Buy, 1))
            .unwrap();
        sim.place_order("b", OrderRequest::market("MSFT", OrderSide::Buy, 1))
            .unwrap();
    }

    let a: Vec<u64> = sim.order_history("a").unwrap().iter().map(|o| o.id).collect();
    let b: Vec<u64> = sim.order_history("b").unwrap().iter().map(|o| o.id).collect();
    assert_eq!(a, vec![5, 3, 1]);
    assert_eq!(b, vec![6, 4, 2]);
}

#[test]
fn test_valuation_follows_replay() {
    let (sim, clock) = simulator();
    sim.place_order("v", OrderRequest::market("AAPL", OrderSide::Buy, 10))
        .unwrap();

    move_to(&sim, &clock, 2);
    let ledger = sim.ledger("v").unwrap();
    let aapl = ledger.holding("AAPL").unwrap();
    assert_eq!(aapl.current_price, 150.0);
    assert_relative_eq!(aapl.unrealized_pnl, 500.0);
    assert_relative_eq!(aapl.unrealized_pnl_percent, 50.0);
    assert_relative_eq!(ledger.valuation.total_value, 9000.0 + 1500.0);

    let cached = sim.cached_ledger("v").unwrap();
    assert_eq!(cached.valuation.portfolio_value, 1500.0);
}

#[test]
fn test_replay_freezes_after_last_point() {
    let (sim, clock) = simulator();
    move_to(&sim, &clock, 60);
    assert_eq!(sim.current_quote("AAPL").price(), Some(140.0));
    assert_eq!(sim.current_quote("MSFT").price(), Some(310.0));

    move_to(&sim, &clock, 600);
    assert_eq!(sim.current_quote("AAPL").snapshot().unwrap().index, 3);
}

#[test]
fn test_subscription_lifecycle() {
    let (sim, clock) = simulator();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let id = sim.subscribe(move |quotes| {
        assert_eq!(quotes.len(), 2);
        seen.fetch_add(1, Ordering::SeqCst);
    });

    move_to(&sim, &clock, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(sim.unsubscribe(id));
    assert!(!sim.unsubscribe(id));
    move_to(&sim, &clock, 2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stats_and_performance() {
    let (sim, clock) = simulator();
    sim.place_order("s", OrderRequest::market("AAPL", OrderSide::Buy, 10))
        .unwrap();
    move_to(&sim, &clock, 2);
    sim.place_order("s", OrderRequest::market("AAPL", OrderSide::Sell, 4))
        .unwrap();
    sim.place_order("s", OrderRequest::limit("AAPL", OrderSide::Sell, 2, 90.0))
        .unwrap();

    let stats = sim.trading_stats("s").unwrap();
    assert_eq!(stats.total_orders, 3);
    assert_eq!(stats.winning_trades, 1);
    assert_eq!(stats.losing_trades, 1);
    assert_relative_eq!(stats.total_realized_pnl, 200.0 - 20.0);
    assert_relative_eq!(stats.win_rate, 50.0);

    let perf = sim.performance("s").unwrap();
    assert_relative_eq!(perf.realized_pnl, 180.0);
    // 4 shares left at 100, marked at 150
    assert_relative_eq!(perf.unrealized_pnl, 200.0);
    assert_relative_eq!(perf.total_pnl, 380.0);
}

#[test]
fn test_export_import_roundtrip() {
    let (sim, _) = simulator();
    sim.place_order("x", OrderRequest::market("MSFT", OrderSide::Buy, 3))
        .unwrap();
    let bundle = sim.export_state().unwrap();
    let json = bundle.to_json().unwrap();

    let (other, _) = simulator();
    other.import_state(StateBundle::from_json(&json).unwrap()).unwrap();
    assert_eq!(other.ledger("x").unwrap().cash, 10_000.0 - 900.0);
    assert_eq!(other.order_history("x").unwrap().len(), 1);

    // ids continue after the imported ones
    let next = other
        .place_order("y", OrderRequest::market("MSFT", OrderSide::Buy, 1))
        .unwrap();
    assert_eq!(next.id, 2);
}

#[test]
fn test_clear_all_data() {
    let (sim, _) = simulator();
    sim.place_order("c", OrderRequest::market("AAPL", OrderSide::Buy, 1))
        .unwrap();
    sim.clear_all_data().unwrap();

    assert!(sim.order_history("c").unwrap().is_empty());
    assert_eq!(sim.ledger("c").unwrap().cash, 10_000.0);
    let order = sim
        .place_order("c", OrderRequest::market("AAPL", OrderSide::Buy, 1))
        .unwrap();
    assert_eq!(order.id, 1);
}

#[test]
fn test_status_and_instruments() {
    let (sim, clock) = simulator();
    clock.advance_millis(61_000);
    match sim.status() {
        SimulationStatus::Active {
            elapsed_sim_secs,
            current_simulation_time,
            ..
        } => {
            assert_eq!(elapsed_sim_secs, 61);
            assert_eq!(current_simulation_time.timestamp(), DATA_START + 61);
        }
        SimulationStatus::Inactive { .. } => panic!("simulation should be active"),
    }

    let instruments = sim.instruments();
    let symbols: Vec<&str> = instruments.iter().map(|i| i.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    assert_eq!(instruments[0].price, Some(100.0));
}

//! Background replay through the simulator service

use rusty_tradesim::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn simulator(base_interval_ms: u64) -> TradingSimulator {
    let mut config = SimConfig::default().with_symbols(["AAPL"]);
    config.notify_throttle_ms = 0;
    config.base_interval_ms = base_interval_ms;
    let source = InMemorySource::new()
        .with_points("AAPL", vec![PricePoint::flat(0, 1.0), PricePoint::flat(1, 2.0)])
        .unwrap();
    let sim = TradingSimulator::with_parts(
        config,
        Arc::new(source),
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();
    sim.initialize().unwrap();
    sim
}

fn counter(sim: &TradingSimulator) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    sim.subscribe(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    hits
}

#[tokio::test(start_paused = true)]
async fn test_replay_publishes_until_shutdown() {
    let sim = simulator(5_000);
    let hits = counter(&sim);

    assert_eq!(sim.start_replay().unwrap(), Duration::from_secs(5));
    assert!(sim.is_replaying());

    tokio::time::sleep(Duration::from_millis(15_500)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    sim.shutdown().await;
    assert!(!sim.is_replaying());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_speed_change_shortens_interval() {
    let sim = simulator(120_000);
    let hits = counter(&sim);
    sim.start_replay().unwrap();

    assert_eq!(sim.set_speed(24.0).await.unwrap(), Duration::from_secs(5));
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    sim.stop_replay().await;
}

#[tokio::test(start_paused = true)]
async fn test_speed_change_while_stopped_applies_on_start() {
    let sim = simulator(120_000);
    assert_eq!(sim.set_speed(2.0).await.unwrap(), Duration::from_secs(60));
    assert!(!sim.is_replaying());
    assert_eq!(sim.start_replay().unwrap(), Duration::from_secs(60));
    sim.shutdown().await;
}

#[test]
fn test_replay_requires_runtime() {
    let sim = simulator(1_000);
    assert!(matches!(sim.start_replay(), Err(SimError::ConfigError(_))));
}

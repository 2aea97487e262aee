//! Property tests for ledger accounting and replay

use approx::relative_eq;
use chrono::Utc;
use proptest::prelude::*;
use rusty_tradesim::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Step {
    Buy { quantity: u64, price: f64 },
    Sell { quantity: u64, price: f64 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1u64..50, 1.0f64..500.0).prop_map(|(quantity, price)| Step::Buy { quantity, price }),
        (1u64..50, 1.0f64..500.0).prop_map(|(quantity, price)| Step::Sell { quantity, price }),
    ]
}

proptest! {
    #[test]
    fn prop_cash_plus_cost_minus_realized_is_conserved(steps in prop::collection::vec(step(), 1..40)) {
        let cash0 = 100_000.0;
        let mut ledger = AccountLedger::new("p", cash0, Utc::now());
        let mut realized = 0.0;

        for step in steps {
            let before = ledger.clone();
            let result = match step {
                Step::Buy { quantity, price } => ledger.apply_buy("AAPL", quantity, price, Utc::now()).map(|_| 0.0),
                Step::Sell { quantity, price } => ledger
                    .apply_sell("AAPL", quantity, price, Utc::now())
                    .map(|t| t.realized_pnl),
            };
            match result {
                Ok(pnl) => realized += pnl,
                Err(e) => {
                    prop_assert!(e.is_order_rejection());
                    prop_assert_eq!(&ledger, &before);
                }
            }

            prop_assert!(ledger.cash >= 0.0);
            let total = ledger.cash + ledger.total_cost_basis() - realized;
            prop_assert!(relative_eq!(total, cash0, max_relative = 1e-9), "{} != {}", total, cash0);
        }
    }

    #[test]
    fn prop_average_price_is_weighted_mean(buys in prop::collection::vec((1u64..100, 1.0f64..1000.0), 1..20)) {
        let mut ledger = AccountLedger::new("p", f64::MAX, Utc::now());
        for (quantity, price) in &buys {
            ledger.apply_buy("MSFT", *quantity, *price, Utc::now()).unwrap();
        }

        let total_qty: u64 = buys.iter().map(|(q, _)| q).sum();
        let weighted: f64 = buys.iter().map(|(q, p)| *q as f64 * p).sum::<f64>() / total_qty as f64;
        let holding = ledger.holding("MSFT").unwrap();
        prop_assert_eq!(holding.quantity, total_qty);
        prop_assert!(relative_eq!(holding.average_price, weighted, max_relative = 1e-9));
    }

    #[test]
    fn prop_partial_sell_keeps_average(qty in 2u64..500, price in 1.0f64..1000.0, sell_price in 1.0f64..1000.0, frac in 0.01f64..0.99) {
        let mut ledger = AccountLedger::new("p", f64::MAX, Utc::now());
        ledger.apply_buy("NVDA", qty, price, Utc::now()).unwrap();
        let k = ((qty as f64 * frac) as u64).clamp(1, qty - 1);

        ledger.apply_sell("NVDA", k, sell_price, Utc::now()).unwrap();
        let holding = ledger.holding("NVDA").unwrap();
        prop_assert_eq!(holding.quantity, qty - k);
        prop_assert_eq!(holding.average_price, price);
        prop_assert!(relative_eq!(holding.cost_basis, (qty - k) as f64 * price, max_relative = 1e-12));
    }

    #[test]
    fn prop_replay_index_is_monotonic(
        gaps in prop::collection::vec(1i64..600, 1..60),
        advances in prop::collection::vec(0i64..400_000, 1..40),
    ) {
        let mut time = 1_700_000_000;
        let points: Vec<PricePoint> = gaps
            .iter()
            .map(|gap| {
                time += gap;
                PricePoint::flat(time, 10.0)
            })
            .collect();
        let last = points.len() - 1;

        let clock = ManualClock::new(0);
        let config = SimConfig::default().with_symbols(["X"]);
        let source = InMemorySource::new().with_points("X", points).unwrap();
        let timeline = rusty_tradesim::feed::TimelineSynchronizer::new(&config, Arc::new(clock.clone()));
        timeline.initialize(&source).unwrap();

        let mut previous = 0;
        for step in advances {
            clock.advance_millis(step);
            timeline.tick();
            let index = timeline.current_quote("X").snapshot().unwrap().index;
            prop_assert!(index >= previous);
            prop_assert!(index <= last);
            previous = index;
        }

        clock.advance_secs(1_000_000);
        timeline.tick();
        prop_assert_eq!(timeline.current_quote("X").snapshot().unwrap().index, last);
    }
}

//! Trading statistics over an account's order and realized histories

use crate::finance::ledger::RealizedTrade;
use crate::finance::valuation::ValuedLedger;
use crate::order::{Order, OrderSide};
use crate::types::Cash;
use serde::{Deserialize, Serialize};

/// Activity summary of one account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingStats {
    pub total_orders: usize,
    pub buy_orders: usize,
    pub sell_orders: usize,
    pub total_buy_volume: Cash,
    pub total_sell_volume: Cash,
    pub total_volume: Cash,
    pub total_realized_pnl: Cash,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winning share of realized trades, in percent
    pub win_rate: f64,
    pub avg_win: Cash,
    /// Mean of losing trades (negative)
    pub avg_loss: Cash,
}

impl TradingStats {
    pub fn from_history(orders: &[Order], realized: &[RealizedTrade]) -> Self {
        let volume = |side: OrderSide| -> (usize, Cash) {
            orders
                .iter()
                .filter(|o| o.side == side)
                .fold((0, 0.0), |(n, v), o| (n + 1, v + o.total_value))
        };
        let (buy_orders, total_buy_volume) = volume(OrderSide::Buy);
        let (sell_orders, total_sell_volume) = volume(OrderSide::Sell);

        let wins: Vec<Cash> = realized.iter().filter(|t| t.is_win()).map(|t| t.realized_pnl).collect();
        let losses: Vec<Cash> = realized.iter().filter(|t| t.is_loss()).map(|t| t.realized_pnl).collect();

        Self {
            total_orders: orders.len(),
            buy_orders,
            sell_orders,
            total_buy_volume,
            total_sell_volume,
            total_volume: total_buy_volume + total_sell_volume,
            total_realized_pnl: realized.iter().map(|t| t.realized_pnl).sum(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: if realized.is_empty() {
                0.0
            } else {
                wins.len() as f64 / realized.len() as f64 * 100.0
            },
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
        }
    }
}

/// Realized plus unrealized P&L of one account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPerformance {
    pub realized_pnl: Cash,
    pub unrealized_pnl: Cash,
    pub total_pnl: Cash,
    pub total_return_percent: f64,
    pub total_trades: usize,
    pub total_volume: Cash,
}

impl PortfolioPerformance {
    pub fn new(valued: &ValuedLedger, orders: &[Order], realized: &[RealizedTrade]) -> Self {
        let realized_pnl: Cash = realized.iter().map(|t| t.realized_pnl).sum();
        let unrealized_pnl = valued.valuation.total_return;

        Self {
            realized_pnl,
            unrealized_pnl,
            total_pnl: realized_pnl + unrealized_pnl,
            total_return_percent: valued.valuation.total_return_percent,
            total_trades: orders.len(),
            total_volume: orders.iter().map(|o| o.total_value).sum(),
        }
    }
}

fn mean(values: &[Cash]) -> Cash {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<Cash>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::ledger::AccountLedger;
    use crate::finance::valuation::value_ledger;
    use crate::order::OrderRequest;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn order(id: u64, side: OrderSide, quantity: u64, price: f64) -> Order {
        let request = OrderRequest::market("AAPL", side, quantity);
        Order::executed(id, "acct", &request, price, Utc::now())
    }

    fn trade(pnl: f64) -> RealizedTrade {
        RealizedTrade {
            symbol: "AAPL".to_string(),
            quantity: 1,
            buy_price: 100.0,
            sell_price: 100.0 + pnl,
            realized_pnl: pnl,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_stats_from_history() {
        let orders = vec![
            order(3, OrderSide::Sell, 5, 120.0),
            order(2, OrderSide::Sell, 5, 90.0),
            order(1, OrderSide::Buy, 10, 100.0),
        ];
        let realized = vec![trade(100.0), trade(-50.0), trade(0.0), trade(30.0)];
        let stats = TradingStats::from_history(&orders, &realized);

        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.buy_orders, 1);
        assert_eq!(stats.sell_orders, 2);
        assert_relative_eq!(stats.total_buy_volume, 1000.0);
        assert_relative_eq!(stats.total_sell_volume, 1050.0);
        assert_relative_eq!(stats.total_volume, 2050.0);
        assert_relative_eq!(stats.total_realized_pnl, 80.0);
        assert_eq!(stats.winning_trades, 2);
        assert_eq!(stats.losing_trades, 1);
        assert_relative_eq!(stats.win_rate, 50.0);
        assert_relative_eq!(stats.avg_win, 65.0);
        assert_relative_eq!(stats.avg_loss, -50.0);
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(TradingStats::from_history(&[], &[]), TradingStats::default());
    }

    #[test]
    fn test_performance_combines_realized_and_unrealized() {
        let mut ledger = AccountLedger::new("acct", 10_000.0, Utc::now());
        ledger.apply_buy("AAPL", 10, 100.0, Utc::now()).unwrap();
        let valued = value_ledger(&ledger, |_| Some(105.0));

        let orders = vec![order(1, OrderSide::Buy, 10, 100.0)];
        let perf = PortfolioPerformance::new(&valued, &orders, &[trade(20.0)]);

        assert_relative_eq!(perf.unrealized_pnl, 50.0);
        assert_relative_eq!(perf.realized_pnl, 20.0);
        assert_relative_eq!(perf.total_pnl, 70.0);
        assert_eq!(perf.total_trades, 1);
        assert_relative_eq!(perf.total_volume, 1000.0);
    }
}

// src/portfolio/performance.rs
use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::TradeAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub price: f64,
    pub strategy: String,
    pub confidence: f64,
    pub reason: String,
    /// Realized PnL, set once when the position closes.
    pub pnl: Option<f64>,
    pub cumulative_pnl: Option<f64>,
}

impl TradeLogEntry {
    pub fn new(
        symbol: &str,
        action: TradeAction,
        quantity: f64,
        price: f64,
        strategy: &str,
        confidence: f64,
        reason: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            action,
            quantity,
            price,
            strategy: strategy.to_string(),
            confidence,
            reason: reason.to_string(),
            pnl: None,
            cumulative_pnl: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pnl.is_some()
    }

    fn trade_return(&self) -> f64 {
        let notional = self.quantity * self.price;
        match self.pnl {
            Some(pnl) if notional > 0.0 => pnl / notional,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub average_pnl: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
}

/// Append-only trade log with metrics derived on demand.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    log: Vec<TradeLogEntry>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_trade(&mut self, entry: TradeLogEntry) {
        log::debug!(
            "Logged {} {} {:.6} @ {:.4} ({})",
            entry.action,
            entry.symbol,
            entry.quantity,
            entry.price,
            entry.strategy
        );
        self.log.push(entry);
    }

    /// Attach realized PnL to the latest open entry for `symbol`.
    pub fn record_trade_pnl(
        &mut self,
        symbol: &str,
        entry_price: f64,
        exit_price: f64,
        quantity: f64,
        is_long: bool,
    ) -> TradingResult<f64> {
        let pnl = if is_long {
            (exit_price - entry_price) * quantity
        } else {
            (entry_price - exit_price) * quantity
        };

        let realized: f64 = self.log.iter().filter_map(|entry| entry.pnl).sum();

        let entry = self
            .log
            .iter_mut()
            .rev()
            .find(|entry| entry.symbol == symbol && !entry.is_closed())
            .ok_or_else(|| TradingError::TradeLog(format!("no open trade for {}", symbol)))?;

        entry.pnl = Some(pnl);
        entry.cumulative_pnl = Some(realized + pnl);
        Ok(pnl)
    }

    pub fn trades(&self) -> &[TradeLogEntry] {
        &self.log
    }

    pub fn recent_trades(&self, count: usize) -> &[TradeLogEntry] {
        let start = self.log.len().saturating_sub(count);
        &self.log[start..]
    }

    pub fn calculate_metrics(&self) -> PerformanceMetrics {
        metrics_for(self.log.iter())
    }

    pub fn symbol_metrics(&self, symbol: &str) -> PerformanceMetrics {
        metrics_for(self.log.iter().filter(|entry| entry.symbol == symbol))
    }

    pub fn summary(&self) -> String {
        let metrics = self.calculate_metrics();

        let mut summary = String::from("Performance Summary:\n");
        summary += &format!("  Total Trades: {}\n", metrics.total_trades);
        summary += &format!("  Winning Trades: {}\n", metrics.winning_trades);
        summary += &format!("  Losing Trades: {}\n", metrics.losing_trades);
        summary += &format!("  Win Rate: {:.2}%\n", metrics.win_rate * 100.0);
        summary += &format!("  Total PnL: ${:.2}\n", metrics.total_pnl);
        summary += &format!("  Average PnL: ${:.2}\n", metrics.average_pnl);
        summary += &format!("  Max Drawdown: ${:.2}\n", metrics.max_drawdown);
        summary += &format!("  Sharpe Ratio: {:.2}\n", metrics.sharpe_ratio);
        summary += &format!("  Sortino Ratio: {:.2}\n", metrics.sortino_ratio);
        summary
    }
}

// Only closed trades contribute.
fn metrics_for<'a>(entries: impl Iterator<Item = &'a TradeLogEntry>) -> PerformanceMetrics {
    let closed: Vec<&TradeLogEntry> = entries.filter(|entry| entry.is_closed()).collect();
    if closed.is_empty() {
        return PerformanceMetrics::default();
    }

    let mut metrics = PerformanceMetrics {
        total_trades: closed.len(),
        ..PerformanceMetrics::default()
    };

    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    for entry in &closed {
        let pnl = entry.pnl.unwrap_or(0.0);
        metrics.total_pnl += pnl;
        cumulative += pnl;
        peak = peak.max(cumulative);
        metrics.max_drawdown = metrics.max_drawdown.max(peak - cumulative);

        if pnl > 0.0 {
            metrics.winning_trades += 1;
        } else if pnl < 0.0 {
            metrics.losing_trades += 1;
        }
    }

    let n = closed.len() as f64;
    metrics.win_rate = metrics.winning_trades as f64 / n;
    metrics.average_pnl = metrics.total_pnl / n;

    let returns: Vec<f64> = closed.iter().map(|entry| entry.trade_return()).collect();
    if returns.len() > 1 {
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std_dev = variance.sqrt();
        if std_dev > 0.0 {
            metrics.sharpe_ratio = mean / std_dev;
        }

        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        if !downside.is_empty() {
            let downside_dev =
                (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt();
            if downside_dev > 0.0 {
                metrics.sortino_ratio = mean / downside_dev;
            }
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy(symbol: &str, quantity: f64, price: f64) -> TradeLogEntry {
        TradeLogEntry::new(symbol, TradeAction::Buy, quantity, price, "momentum", 0.8, "test")
    }

    #[test]
    fn test_metrics_ignore_open_trades() {
        let mut tracker = PerformanceTracker::new();
        tracker.log_trade(buy("BTCUSDT", 1.0, 100.0));
        tracker.log_trade(buy("ETHUSDT", 1.0, 100.0));

        assert_eq!(tracker.calculate_metrics(), PerformanceMetrics::default());

        tracker.record_trade_pnl("BTCUSDT", 100.0, 110.0, 1.0, true).unwrap();
        let metrics = tracker.calculate_metrics();
        assert_eq!(metrics.total_trades, 1);
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.win_rate, 1.0);
        assert!((metrics.total_pnl - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_pnl_attached_once() {
        let mut tracker = PerformanceTracker::new();
        tracker.log_trade(buy("BTCUSDT", 2.0, 100.0));

        let pnl = tracker.record_trade_pnl("BTCUSDT", 100.0, 90.0, 2.0, true).unwrap();
        assert!((pnl + 20.0).abs() < 1e-9);

        assert!(matches!(
            tracker.record_trade_pnl("BTCUSDT", 100.0, 120.0, 2.0, true),
            Err(TradingError::TradeLog(_))
        ));
        assert_eq!(tracker.trades()[0].pnl, Some(pnl));
    }

    #[test]
    fn test_drawdown_and_ratios() {
        let mut tracker = PerformanceTracker::new();
        for (exit, symbol) in [(110.0, "BTCUSDT"), (95.0, "BTCUSDT"), (90.0, "ETHUSDT"), (120.0, "ETHUSDT")] {
            tracker.log_trade(buy(symbol, 1.0, 100.0));
            tracker.record_trade_pnl(symbol, 100.0, exit, 1.0, true).unwrap();
        }

        let metrics = tracker.calculate_metrics();
        // Cumulative: 10, 5, -5, 15 -> peak 10, trough -5
        assert!((metrics.max_drawdown - 15.0).abs() < 1e-9);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 2);
        assert!(metrics.sharpe_ratio > 0.0);
        assert!(metrics.sortino_ratio > 0.0);
        assert_eq!(tracker.trades()[3].cumulative_pnl, Some(15.0));

        let eth = tracker.symbol_metrics("ETHUSDT");
        assert_eq!(eth.total_trades, 2);
        assert!((eth.total_pnl - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_pnl_and_recent_trades() {
        let mut tracker = PerformanceTracker::new();
        for i in 0..5 {
            tracker.log_trade(buy("SOLUSDT", 1.0, 100.0 + i as f64));
        }
        let pnl = tracker.record_trade_pnl("SOLUSDT", 100.0, 90.0, 1.0, false).unwrap();
        assert!((pnl - 10.0).abs() < 1e-9);
        // Latest open entry takes the PnL
        assert_eq!(tracker.trades()[4].pnl, Some(pnl));

        assert_eq!(tracker.recent_trades(2).len(), 2);
        assert_eq!(tracker.recent_trades(10).len(), 5);
        assert!(tracker.summary().contains("Total Trades: 1"));
    }
}

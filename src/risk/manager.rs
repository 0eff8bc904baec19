// src/risk/manager.rs
use crate::config::RiskConfig;
use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::{OrderSide, PositionUpdate};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

/// Risk state of one open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRisk {
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    /// Highest market value seen while open; drives symbol drawdown.
    pub peak_value: f64,
    /// Highest price seen since the trailing stop was armed.
    pub peak_price: f64,
    pub stop_loss_level: f64,
    pub take_profit_level: f64,
    pub trailing_stop_level: f64,
    pub trailing_stop_active: bool,
}

impl PositionRisk {
    pub fn market_value(&self) -> f64 {
        self.size * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.size * self.entry_price
    }

    pub fn is_long(&self) -> bool {
        self.side == OrderSide::Buy && self.size > 0.0
    }

    pub fn drawdown(&self) -> f64 {
        if self.peak_value <= 0.0 {
            return 0.0;
        }
        (self.peak_value - self.market_value()) / self.peak_value
    }

    fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.unrealized_pnl = match self.side {
            OrderSide::Buy => (price - self.entry_price) * self.size,
            OrderSide::Sell => (self.entry_price - price) * self.size,
        };
        self.peak_value = self.peak_value.max(self.market_value());
    }
}

/// Close recommendation produced by a risk check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskAction {
    TrailingStop { symbol: String, price: f64, level: f64 },
    StopLoss { symbol: String, price: f64, level: f64 },
    TakeProfit { symbol: String, price: f64, level: f64 },
    MaxDrawdownExceeded { symbol: String, drawdown: f64, limit: f64 },
}

impl RiskAction {
    pub fn symbol(&self) -> &str {
        match self {
            RiskAction::TrailingStop { symbol, .. }
            | RiskAction::StopLoss { symbol, .. }
            | RiskAction::TakeProfit { symbol, .. }
            | RiskAction::MaxDrawdownExceeded { symbol, .. } => symbol,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RiskAction::TrailingStop { .. } => "TRAILING_STOP",
            RiskAction::StopLoss { .. } => "STOP_LOSS",
            RiskAction::TakeProfit { .. } => "TAKE_PROFIT",
            RiskAction::MaxDrawdownExceeded { .. } => "MAX_DRAWDOWN_EXCEEDED",
        }
    }
}

impl fmt::Display for RiskAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RiskAction::TrailingStop { symbol, price, level } => write!(
                f,
                "TRAILING_STOP: close long {} at {:.4} (trailing stop {:.4})",
                symbol, price, level
            ),
            RiskAction::StopLoss { symbol, price, level } => write!(
                f,
                "STOP_LOSS: close long {} at {:.4} (stop loss {:.4})",
                symbol, price, level
            ),
            RiskAction::TakeProfit { symbol, price, level } => write!(
                f,
                "TAKE_PROFIT: close long {} at {:.4} (take profit {:.4})",
                symbol, price, level
            ),
            RiskAction::MaxDrawdownExceeded { symbol, drawdown, limit } => write!(
                f,
                "MAX_DRAWDOWN_EXCEEDED: {} drawdown {:.2}% exceeds limit {:.2}%",
                symbol,
                drawdown * 100.0,
                limit * 100.0
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub total_exposure: f64,
    /// Unrealized loss as a fraction of cost basis; 0 when in profit.
    pub portfolio_drawdown: f64,
    pub volatility: f64,
    pub correlation_risk: f64,
}

/// Per-position stops and portfolio limits.
///
/// Positions are created and removed only by inbound [`PositionUpdate`]
/// events; price checks mutate them in place.
#[derive(Debug)]
pub struct RiskManager {
    config: RiskConfig,
    positions: HashMap<String, PositionRisk>,
    volatility: HashMap<String, f64>,
    correlation_risk: f64,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            volatility: HashMap::new(),
            correlation_risk: 0.0,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn position(&self, symbol: &str) -> Option<&PositionRisk> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &PositionRisk> {
        self.positions.values()
    }

    fn stop_fraction(&self) -> f64 {
        self.config.stop_loss_percent / 100.0
    }

    /// Apply an external position event. A zero size closes the position.
    pub fn apply_position_update(&mut self, update: &PositionUpdate) {
        if update.size == 0.0 {
            if self.positions.remove(&update.symbol).is_some() {
                log::info!("Position closed for {}", update.symbol);
            }
            return;
        }

        let stop_loss_level = update.entry_price * (1.0 - self.stop_fraction());
        let take_profit_level = update.entry_price * (1.0 + self.config.take_profit_percent / 100.0);
        let current_price = update.mark_price.unwrap_or(update.entry_price);
        let size = update.size.abs();
        let market_value = size * current_price;

        let position = match self.positions.entry(update.symbol.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                existing.side = update.side;
                existing.size = size;
                existing.entry_price = update.entry_price;
                existing.current_price = current_price;
                existing.unrealized_pnl = update.unrealized_pnl;
                existing.peak_value = existing.peak_value.max(market_value);
                existing.stop_loss_level = stop_loss_level;
                existing.take_profit_level = take_profit_level;
                existing
            }
            Entry::Vacant(entry) => {
                log::info!(
                    "Tracking new {} position for {}: {} @ {:.4}",
                    update.side.as_str(),
                    update.symbol,
                    size,
                    update.entry_price
                );
                entry.insert(PositionRisk {
                    symbol: update.symbol.clone(),
                    side: update.side,
                    size,
                    entry_price: update.entry_price,
                    current_price,
                    unrealized_pnl: update.unrealized_pnl,
                    peak_value: market_value,
                    peak_price: current_price,
                    stop_loss_level,
                    take_profit_level,
                    trailing_stop_level: 0.0,
                    trailing_stop_active: false,
                })
            }
        };

        // A trailing stop never sits below the stop loss it replaces.
        if position.trailing_stop_active && position.trailing_stop_level < stop_loss_level {
            position.trailing_stop_level = stop_loss_level;
        }

        self.maybe_activate_trailing(&update.symbol, current_price);
    }

    /// Arm (or tighten) the trailing stop at `price`.
    /// Returns false when no position exists for `symbol`.
    pub fn set_trailing_stop(&mut self, symbol: &str, price: f64) -> bool {
        let stop_fraction = self.stop_fraction();
        let Some(position) = self.positions.get_mut(symbol) else {
            return false;
        };

        let level = (price * (1.0 - stop_fraction)).max(position.stop_loss_level);
        if position.trailing_stop_active {
            position.trailing_stop_level = position.trailing_stop_level.max(level);
            position.peak_price = position.peak_price.max(price);
        } else {
            position.trailing_stop_level = level;
            position.peak_price = price;
            position.trailing_stop_active = true;
        }

        log::info!(
            "Trailing stop for {} set at {:.4}",
            symbol,
            position.trailing_stop_level
        );
        true
    }

    fn maybe_activate_trailing(&mut self, symbol: &str, price: f64) {
        let Some(activation) = self.config.trailing_activation_percent else {
            return;
        };
        let should_arm = self
            .positions
            .get(symbol)
            .map(|p| {
                p.is_long()
                    && !p.trailing_stop_active
                    && price >= p.entry_price * (1.0 + activation / 100.0)
            })
            .unwrap_or(false);

        if should_arm {
            self.set_trailing_stop(symbol, price);
        }
    }

    /// At most one action per long position, checked in priority order:
    /// trailing stop, stop loss, take profit. With none triggered, an armed
    /// trailing stop ratchets up behind a new high.
    pub fn check_stop_loss_take_profit(&mut self, current_prices: &HashMap<String, f64>) -> Vec<RiskAction> {
        let stop_fraction = self.stop_fraction();
        let mut actions = Vec::new();

        let mut symbols: Vec<String> = self.positions.keys().cloned().collect();
        symbols.sort();

        for symbol in symbols {
            let Some(&price) = current_prices.get(&symbol) else {
                continue;
            };

            if let Some(position) = self.positions.get_mut(&symbol) {
                position.mark(price);
            }
            self.maybe_activate_trailing(&symbol, price);

            let Some(position) = self.positions.get_mut(&symbol) else {
                continue;
            };
            if !position.is_long() {
                continue;
            }

            if position.trailing_stop_active && price <= position.trailing_stop_level {
                actions.push(RiskAction::TrailingStop {
                    symbol: symbol.clone(),
                    price,
                    level: position.trailing_stop_level,
                });
            } else if price <= position.stop_loss_level {
                actions.push(RiskAction::StopLoss {
                    symbol: symbol.clone(),
                    price,
                    level: position.stop_loss_level,
                });
            } else if price >= position.take_profit_level {
                actions.push(RiskAction::TakeProfit {
                    symbol: symbol.clone(),
                    price,
                    level: position.take_profit_level,
                });
            } else if position.trailing_stop_active && price > position.peak_price {
                let new_level = price * (1.0 - stop_fraction);
                if new_level > position.trailing_stop_level {
                    log::debug!(
                        "{}: trailing stop {:.4} -> {:.4}",
                        symbol,
                        position.trailing_stop_level,
                        new_level
                    );
                    position.trailing_stop_level = new_level;
                    position.peak_price = price;
                }
            }
        }

        actions
    }

    pub fn check_symbol_drawdown(&self) -> Vec<RiskAction> {
        let mut actions: Vec<RiskAction> = self
            .positions
            .values()
            .filter(|p| p.drawdown() > self.config.max_drawdown)
            .map(|p| RiskAction::MaxDrawdownExceeded {
                symbol: p.symbol.clone(),
                drawdown: p.drawdown(),
                limit: self.config.max_drawdown,
            })
            .collect();
        actions.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        actions
    }

    /// Pre-trade check for an order of `size` units at `price`.
    pub fn check_position_risk(&self, symbol: &str, size: f64, price: f64) -> TradingResult<()> {
        if size > self.config.max_position_per_coin {
            return Err(TradingError::RiskLimitExceeded(format!(
                "order size {:.4} exceeds maximum position limit {:.4} for {}",
                size, self.config.max_position_per_coin, symbol
            )));
        }

        let current = self.total_exposure();
        let new_exposure = current + size * price;
        if new_exposure > self.config.total_capital {
            return Err(TradingError::RiskLimitExceeded(format!(
                "new position would exceed total capital: current {:.2} + new {:.2} > total {:.2}",
                current,
                size * price,
                self.config.total_capital
            )));
        }

        Ok(())
    }

    pub fn check_portfolio_risk(&self) -> TradingResult<()> {
        let metrics = self.calculate_risk_metrics();

        if metrics.portfolio_drawdown > self.config.max_drawdown {
            return Err(TradingError::RiskLimitExceeded(format!(
                "portfolio drawdown {:.2}% exceeds maximum allowed {:.2}%",
                metrics.portfolio_drawdown * 100.0,
                self.config.max_drawdown * 100.0
            )));
        }

        if metrics.total_exposure > self.config.total_capital {
            return Err(TradingError::RiskLimitExceeded(format!(
                "total exposure {:.2} exceeds capital {:.2}",
                metrics.total_exposure, self.config.total_capital
            )));
        }

        Ok(())
    }

    pub fn total_exposure(&self) -> f64 {
        self.positions.values().map(PositionRisk::market_value).sum()
    }

    pub fn portfolio_drawdown(&self) -> f64 {
        let cost: f64 = self.positions.values().map(PositionRisk::cost_basis).sum();
        if cost <= 0.0 {
            return 0.0;
        }
        let pnl: f64 = self.positions.values().map(|p| p.unrealized_pnl).sum();
        (-pnl / cost).max(0.0)
    }

    /// Record the latest relative volatility observed for `symbol`.
    pub fn update_volatility(&mut self, symbol: &str, volatility: f64) {
        self.volatility.insert(symbol.to_string(), volatility);
    }

    /// Portfolio correlation risk in [0, 1], usually `1 - diversification`.
    pub fn set_correlation_risk(&mut self, risk: f64) {
        self.correlation_risk = risk.clamp(0.0, 1.0);
    }

    pub fn retain_symbols(&mut self, universe: &[String]) {
        self.volatility.retain(|symbol, _| universe.contains(symbol));
    }

    pub fn calculate_risk_metrics(&self) -> RiskMetrics {
        let vols: Vec<f64> = self
            .positions
            .keys()
            .filter_map(|symbol| self.volatility.get(symbol).copied())
            .collect();
        let volatility = if vols.is_empty() {
            0.0
        } else {
            vols.iter().sum::<f64>() / vols.len() as f64
        };

        RiskMetrics {
            total_exposure: self.total_exposure(),
            portfolio_drawdown: self.portfolio_drawdown(),
            volatility,
            correlation_risk: if self.positions.len() > 1 {
                self.correlation_risk
            } else {
                0.0
            },
        }
    }

    /// Advisory halt: drawdown above twice the limit or exposure above 1.5x
    /// capital. The caller decides whether to stop.
    pub fn should_stop_trading(&self) -> bool {
        let metrics = self.calculate_risk_metrics();
        metrics.portfolio_drawdown > self.config.max_drawdown * 2.0
            || metrics.total_exposure > self.config.total_capital * 1.5
    }

    pub fn risk_report(&self) -> String {
        let metrics = self.calculate_risk_metrics();
        let capital_share = if self.config.total_capital > 0.0 {
            metrics.total_exposure / self.config.total_capital * 100.0
        } else {
            0.0
        };

        let mut report = String::from("Risk Report:\n");
        report += &format!(
            "  Total Exposure: ${:.2} ({:.1}% of capital)\n",
            metrics.total_exposure, capital_share
        );
        report += &format!("  Portfolio Drawdown: {:.2}%\n", metrics.portfolio_drawdown * 100.0);
        report += &format!("  Portfolio Volatility: {:.2}%\n", metrics.volatility * 100.0);
        report += &format!("  Correlation Risk: {:.2}\n", metrics.correlation_risk);
        report += &format!("  Stop-Loss: {:.2}%\n", self.config.stop_loss_percent);
        report += &format!("  Take-Profit: {:.2}%\n", self.config.take_profit_percent);
        report += &format!("  Drawdown Limit: {:.2}%\n", self.config.max_drawdown * 100.0);
        report += &format!("  Open Positions: {}\n", self.positions.len());
        if self.should_stop_trading() {
            report += "  WARNING: Trading should be stopped due to excessive risk!\n";
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn manager() -> RiskManager {
        RiskManager::new(Config::default().risk)
    }

    fn long(symbol: &str, size: f64, entry: f64, mark: f64, pnl: f64) -> PositionUpdate {
        PositionUpdate {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            size,
            entry_price: entry,
            mark_price: Some(mark),
            unrealized_pnl: pnl,
        }
    }

    fn prices(symbol: &str, price: f64) -> HashMap<String, f64> {
        HashMap::from([(symbol.to_string(), price)])
    }

    #[test]
    fn test_update_sets_levels_and_close_removes() {
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 1.0, 100.0, 100.0, 0.0));

        let position = risk.position("BTCUSDT").unwrap();
        assert!((position.stop_loss_level - 98.0).abs() < 1e-9);
        assert!((position.take_profit_level - 105.0).abs() < 1e-9);

        risk.apply_position_update(&long("BTCUSDT", 0.0, 100.0, 100.0, 0.0));
        assert!(risk.position("BTCUSDT").is_none());
    }

    #[test]
    fn test_update_preserves_peak_and_trailing_state() {
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 1.0, 100.0, 104.0, 4.0));
        assert!(risk.set_trailing_stop("BTCUSDT", 104.0));
        let level = risk.position("BTCUSDT").unwrap().trailing_stop_level;

        risk.apply_position_update(&long("BTCUSDT", 1.0, 100.0, 101.0, 1.0));
        let position = risk.position("BTCUSDT").unwrap();
        assert_eq!(position.peak_value, 104.0);
        assert!(position.trailing_stop_active);
        assert_eq!(position.trailing_stop_level, level);
    }

    #[test]
    fn test_priority_order_and_single_action() {
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 1.0, 100.0, 100.0, 0.0));

        assert!(risk.check_stop_loss_take_profit(&prices("BTCUSDT", 101.0)).is_empty());

        let actions = risk.check_stop_loss_take_profit(&prices("BTCUSDT", 97.0));
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].code(), "STOP_LOSS");

        let actions = risk.check_stop_loss_take_profit(&prices("BTCUSDT", 106.0));
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].code(), "TAKE_PROFIT");

        // Trailing stop above the stop loss takes precedence.
        risk.set_trailing_stop("BTCUSDT", 104.0);
        let actions = risk.check_stop_loss_take_profit(&prices("BTCUSDT", 97.0));
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].code(), "TRAILING_STOP");
    }

    #[test]
    fn test_trailing_stop_never_below_stop_loss() {
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 1.0, 100.0, 95.0, -5.0));
        risk.set_trailing_stop("BTCUSDT", 95.0);
        let position = risk.position("BTCUSDT").unwrap();
        assert!(position.trailing_stop_level >= position.stop_loss_level);
    }

    #[test]
    fn test_trailing_stop_is_monotonic_on_rising_path() {
        let mut config = Config::default().risk;
        config.take_profit_percent = 1000.0;
        let mut risk = RiskManager::new(config);
        risk.apply_position_update(&long("ETHUSDT", 2.0, 100.0, 100.0, 0.0));
        risk.set_trailing_stop("ETHUSDT", 100.0);

        let mut last = risk.position("ETHUSDT").unwrap().trailing_stop_level;
        let path = [100.0, 100.5, 100.5, 103.0, 103.0, 110.0, 125.0, 125.0, 140.0];
        for price in path {
            let actions = risk.check_stop_loss_take_profit(&prices("ETHUSDT", price));
            assert!(actions.is_empty(), "{:?}", actions);
            let level = risk.position("ETHUSDT").unwrap().trailing_stop_level;
            assert!(level >= last, "{} < {}", level, last);
            last = level;
        }
        assert!((last - 140.0 * 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_trailing_stop_auto_activation() {
        let mut config = Config::default().risk;
        config.trailing_activation_percent = Some(3.0);
        let mut risk = RiskManager::new(config);
        risk.apply_position_update(&long("SOLUSDT", 1.0, 100.0, 100.0, 0.0));
        assert!(!risk.position("SOLUSDT").unwrap().trailing_stop_active);

        risk.check_stop_loss_take_profit(&prices("SOLUSDT", 103.5));
        let position = risk.position("SOLUSDT").unwrap();
        assert!(position.trailing_stop_active);
        assert!((position.trailing_stop_level - 103.5 * 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_symbol_drawdown() {
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 1.0, 100.0, 120.0, 20.0));
        assert!(risk.check_symbol_drawdown().is_empty());

        // 120 -> 107: drawdown 10.8% > 10%
        risk.check_stop_loss_take_profit(&prices("BTCUSDT", 107.0));
        let actions = risk.check_symbol_drawdown();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].code(), "MAX_DRAWDOWN_EXCEEDED");
    }

    #[test]
    fn test_should_stop_trading_drawdown_boundary() {
        // max_drawdown 0.1 -> halt strictly above 20%
        let mut risk = manager();
        risk.apply_position_update(&PositionUpdate {
            mark_price: None,
            ..long("BTCUSDT", 1.0, 100.0, 100.0, -20.0)
        });
        assert_eq!(risk.portfolio_drawdown(), 0.2);
        assert!(!risk.should_stop_trading());

        risk.apply_position_update(&PositionUpdate {
            mark_price: None,
            ..long("BTCUSDT", 1.0, 100.0, 100.0, -20.5)
        });
        assert!(risk.should_stop_trading());
    }

    #[test]
    fn test_should_stop_trading_exposure_boundary() {
        // total capital 10_000 -> halt strictly above 15_000
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 150.0, 100.0, 100.0, 0.0));
        assert_eq!(risk.total_exposure(), 15_000.0);
        assert!(!risk.should_stop_trading());

        risk.apply_position_update(&long("BTCUSDT", 150.0, 100.0, 100.01, 1.5));
        assert!(risk.total_exposure() > 15_000.0);
        assert!(risk.should_stop_trading());
    }

    #[test]
    fn test_portfolio_risk_drawdown_boundary() {
        let mut risk = manager();
        risk.apply_position_update(&PositionUpdate {
            mark_price: None,
            ..long("BTCUSDT", 1.0, 100.0, 100.0, -10.0)
        });
        assert_eq!(risk.portfolio_drawdown(), 0.1);
        assert!(risk.check_portfolio_risk().is_ok());

        risk.apply_position_update(&PositionUpdate {
            mark_price: None,
            ..long("BTCUSDT", 1.0, 100.0, 100.0, -10.5)
        });
        assert!(matches!(
            risk.check_portfolio_risk(),
            Err(TradingError::RiskLimitExceeded(msg)) if msg.contains("drawdown")
        ));
    }

    #[test]
    fn test_portfolio_risk_exposure_boundary() {
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 100.0, 100.0, 100.0, 0.0));
        assert_eq!(risk.total_exposure(), 10_000.0);
        assert!(risk.check_portfolio_risk().is_ok());

        risk.apply_position_update(&long("BTCUSDT", 100.0, 100.0, 100.01, 1.0));
        assert!(matches!(
            risk.check_portfolio_risk(),
            Err(TradingError::RiskLimitExceeded(msg)) if msg.contains("exposure")
        ));
        // Still inside the 1.5x halt threshold
        assert!(!risk.should_stop_trading());
    }

    #[test]
    fn test_profit_is_not_drawdown() {
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 1.0, 100.0, 150.0, 50.0));
        assert_eq!(risk.portfolio_drawdown(), 0.0);
    }

    #[test]
    fn test_check_position_risk_limits() {
        let risk = manager();
        assert!(risk.check_position_risk("BTCUSDT", 10.0, 100.0).is_ok());
        assert!(matches!(
            risk.check_position_risk("BTCUSDT", 2_000.0, 1.0),
            Err(TradingError::RiskLimitExceeded(_))
        ));
        assert!(matches!(
            risk.check_position_risk("BTCUSDT", 500.0, 100.0),
            Err(TradingError::RiskLimitExceeded(_))
        ));
    }

    #[test]
    fn test_risk_report_mentions_exposure() {
        let mut risk = manager();
        risk.apply_position_update(&long("BTCUSDT", 1.0, 100.0, 100.0, 0.0));
        risk.update_volatility("BTCUSDT", 0.02);
        let metrics = risk.calculate_risk_metrics();
        assert_eq!(metrics.volatility, 0.02);
        assert_eq!(metrics.correlation_risk, 0.0);
        assert!(risk.risk_report().contains("Total Exposure: $100.00"));
    }
}

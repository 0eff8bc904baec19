// src/trading_bot.rs
//! The periodic control loop.
//!
//! Each tick refreshes the symbol universe, classifies every symbol's regime,
//! runs the selected strategy, applies the risk gates and rebalances capital.
//! Override commands (`start`, `stop`, `rebalance`, `emergency_stop`) arrive
//! through a [`ControlHandle`] and are consumed by a task spawned in
//! [`TradingBot::run`].

use crate::analysis::correlation::CorrelationTracker;
use crate::analysis::indicators::{combined_signal, volume_weighted_signal, IndicatorSnapshot};
use crate::analysis::regime::{RegimeClassifier, RegimeSnapshot};
use crate::config::Config;
use crate::domain::errors::{AppError, AppResult, CircuitBreakerError, ExchangeError};
use crate::domain::models::{MarketData, Order, OrderSide, PositionUpdate, TradeSignal};
use crate::exchange::client::MarketGateway;
use crate::notifications::{Notifier, TradeAlert};
use crate::portfolio::allocation::{AllocationEngine, AllocationTarget};
use crate::portfolio::performance::{PerformanceTracker, TradeLogEntry};
use crate::risk::circuit_breaker::CircuitBreaker;
use crate::risk::manager::{RiskAction, RiskManager, RiskMetrics};
use crate::trading::strategies::StrategyRegistry;
use crate::trading::weights::{
    trend_score, volatility_score, volume_score, StrategyKind, StrategySelector, StrategyWeights,
};
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const COMMAND_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideCommand {
    Start,
    Stop,
    Rebalance,
    EmergencyStop,
}

impl FromStr for OverrideCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(OverrideCommand::Start),
            "stop" => Ok(OverrideCommand::Stop),
            "rebalance" => Ok(OverrideCommand::Rebalance),
            "emergency_stop" => Ok(OverrideCommand::EmergencyStop),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

impl fmt::Display for OverrideCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OverrideCommand::Start => "start",
            OverrideCommand::Stop => "stop",
            OverrideCommand::Rebalance => "rebalance",
            OverrideCommand::EmergencyStop => "emergency_stop",
        };
        f.write_str(name)
    }
}

/// State shared between the loop, the command handler and control handles.
struct Controls {
    running: AtomicBool,
    stop: Notify,
    rebalance: Notify,
    notifier: Arc<dyn Notifier>,
}

impl Controls {
    async fn apply(&self, command: OverrideCommand) {
        match command {
            OverrideCommand::Start => {
                self.running.store(true, Ordering::SeqCst);
                log::info!("Trading bot started manually");
            }
            OverrideCommand::Stop => {
                self.running.store(false, Ordering::SeqCst);
                log::info!("Trading bot stopped manually");
            }
            OverrideCommand::Rebalance => {
                log::info!("Manual rebalancing triggered");
                self.rebalance.notify_one();
            }
            OverrideCommand::EmergencyStop => {
                self.running.store(false, Ordering::SeqCst);
                log::warn!("Emergency stop triggered manually");
                if let Err(e) = self
                    .notifier
                    .notify_emergency_stop("Manual emergency stop triggered")
                    .await
                {
                    log::error!("Failed to send emergency stop alert: {}", e);
                }
            }
        }
    }
}

/// Cloneable handle for steering a running [`TradingBot`].
#[derive(Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<String>,
    controls: Arc<Controls>,
}

impl ControlHandle {
    /// Queue a raw override command. Fails immediately when the queue is full.
    pub fn send_command(&self, command: &str) -> AppResult<()> {
        self.commands.try_send(command.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(cmd) => {
                AppError::CommandRejected(format!("command queue full, dropped '{}'", cmd))
            }
            mpsc::error::TrySendError::Closed(cmd) => {
                AppError::CommandRejected(format!("command handler stopped, dropped '{}'", cmd))
            }
        })
    }

    /// Ask the control loop to exit.
    pub fn stop(&self) {
        self.controls.stop.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.controls.running.load(Ordering::SeqCst)
    }
}

/// Summary of one completed (or cancelled) cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub universe: Vec<String>,
    /// Symbols whose market data could not be fetched this cycle.
    pub skipped: Vec<String>,
    pub selections: BTreeMap<String, StrategyKind>,
    pub signals: Vec<TradeSignal>,
    pub executed: Vec<String>,
    pub risk_actions: Vec<RiskAction>,
    pub diversification_score: f64,
    pub allocations: Vec<AllocationTarget>,
    pub risk_metrics: RiskMetrics,
    /// Set when exposure or drawdown breaches the configured limits.
    pub portfolio_risk_warning: Option<String>,
    pub emergency_stop: bool,
    pub cancelled: bool,
}

struct SymbolView {
    data: MarketData,
    regime: RegimeSnapshot,
    price: f64,
}

pub struct TradingBot {
    config: Config,
    gateway: Arc<dyn MarketGateway>,
    notifier: Arc<dyn Notifier>,
    classifier: RegimeClassifier,
    strategies: StrategyRegistry,
    selector: RwLock<StrategySelector>,
    correlation: RwLock<CorrelationTracker>,
    risk: RwLock<RiskManager>,
    allocation: RwLock<AllocationEngine>,
    performance: RwLock<PerformanceTracker>,
    universe_breaker: CircuitBreaker,
    market_data_breaker: CircuitBreaker,
    execution_breaker: CircuitBreaker,
    rebalance_breaker: CircuitBreaker,
    controls: Arc<Controls>,
    command_tx: mpsc::Sender<String>,
    command_rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl TradingBot {
    pub fn new(config: Config, gateway: Arc<dyn MarketGateway>, notifier: Arc<dyn Notifier>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let breakers = &config.circuit_breaker;

        Self {
            classifier: RegimeClassifier::new(),
            strategies: StrategyRegistry::new(),
            selector: RwLock::new(StrategySelector::new()),
            correlation: RwLock::new(CorrelationTracker::new()),
            risk: RwLock::new(RiskManager::new(config.risk.clone())),
            allocation: RwLock::new(AllocationEngine::new()),
            performance: RwLock::new(PerformanceTracker::new()),
            universe_breaker: CircuitBreaker::from_config("universe", breakers),
            market_data_breaker: CircuitBreaker::from_config("market_data", breakers),
            execution_breaker: CircuitBreaker::from_config("execution", breakers),
            rebalance_breaker: CircuitBreaker::from_config("rebalance", breakers),
            controls: Arc::new(Controls {
                running: AtomicBool::new(true),
                stop: Notify::new(),
                rebalance: Notify::new(),
                notifier: notifier.clone(),
            }),
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            config,
            gateway,
            notifier,
        }
    }

    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            commands: self.command_tx.clone(),
            controls: self.controls.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.controls.running.load(Ordering::SeqCst)
    }

    pub fn strategy_weights(&self, symbol: &str) -> Option<StrategyWeights> {
        self.selector.read().weights_for(symbol)
    }

    pub fn trade_log(&self) -> Vec<TradeLogEntry> {
        self.performance.read().trades().to_vec()
    }

    pub fn risk_report(&self) -> String {
        self.risk.read().risk_report()
    }

    pub fn performance_summary(&self) -> String {
        self.performance.read().summary()
    }

    /// Inbound position event from the exchange layer. A close also
    /// settles the realized PnL of the latest open trade for the symbol.
    pub fn on_position_update(&self, update: &PositionUpdate) {
        let previous = {
            let mut risk = self.risk.write();
            let previous = risk.position(&update.symbol).cloned();
            risk.apply_position_update(update);
            previous
        };

        if update.size != 0.0 {
            return;
        }
        let Some(previous) = previous else {
            return;
        };

        let exit_price = update.mark_price.unwrap_or(previous.current_price);
        match self.performance.write().record_trade_pnl(
            &update.symbol,
            previous.entry_price,
            exit_price,
            previous.size,
            previous.side == OrderSide::Buy,
        ) {
            Ok(pnl) => log::info!("{} closed with realized PnL ${:.2}", update.symbol, pnl),
            Err(e) => log::debug!("{}: {}", update.symbol, e),
        }
    }

    fn spawn_command_handler(&self) -> Option<JoinHandle<()>> {
        let mut rx = self.command_rx.lock().take()?;
        let controls = self.controls.clone();

        Some(tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                log::info!("Received manual override command: {}", raw);
                match raw.parse::<OverrideCommand>() {
                    Ok(command) => controls.apply(command).await,
                    Err(e) => log::warn!("{}", e),
                }
            }
        }))
    }

    /// Drive cycles until `shutdown` flips to true or a stop is requested.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        log::info!("Starting trading bot...");
        let handler = self.spawn_command_handler();

        let mut ticker = tokio::time::interval(self.config.trading.cycle_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(&shutdown).await,
                _ = self.controls.rebalance.notified() => self.on_tick(&shutdown).await,
                _ = self.controls.stop.notified() => {
                    log::info!("Received stop signal, shutting down...");
                    break;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        log::info!("Shutdown channel closed, shutting down...");
                        break;
                    }
                }
            }
        }

        if let Some(handler) = handler {
            handler.abort();
        }
        log::info!("Trading bot stopped");
        Ok(())
    }

    async fn on_tick(&self, shutdown: &watch::Receiver<bool>) {
        if !self.is_running() {
            log::info!("Trading bot is stopped (manual override), skipping trading cycle...");
            return;
        }

        match self.run_cycle(shutdown).await {
            Ok(report) => log::info!(
                "Cycle finished: {} symbols, {} skipped, {} executed, {} risk actions",
                report.universe.len(),
                report.skipped.len(),
                report.executed.len(),
                report.risk_actions.len()
            ),
            Err(e) => log::error!("Error in trading cycle: {}", e),
        }
    }

    /// One full pass over the universe.
    ///
    /// Universe refresh and rebalance failures abort the cycle; per-symbol
    /// failures only skip that symbol.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> AppResult<CycleReport> {
        log::info!("=== Starting Trading Cycle ===");
        let mut report = CycleReport::default();

        log::info!("1. Updating symbol universe...");
        let gateway = &self.gateway;
        let limit = self.config.trading.top_symbols;
        let universe = self
            .universe_breaker
            .call(move || gateway.fetch_top_symbols(limit))
            .await?;
        self.refresh_universe(&universe);
        report.universe = universe.clone();

        log::info!("2. Analyzing market conditions...");
        let mut views: Vec<(String, SymbolView)> = Vec::new();
        for symbol in &universe {
            match self.fetch_market_data(symbol).await {
                Some(data) => views.push((symbol.clone(), self.analyze_symbol(data))),
                None => report.skipped.push(symbol.clone()),
            }
        }
        let analyzed: Vec<String> = views.iter().map(|(symbol, _)| symbol.clone()).collect();

        log::info!("3. Calculating asset correlations...");
        report.diversification_score = self.update_correlations(&analyzed);

        log::info!("4. Checking stop-loss, take-profit and drawdown limits...");
        let current_prices: HashMap<String, f64> = views
            .iter()
            .map(|(symbol, view)| (symbol.clone(), view.price))
            .collect();
        {
            let mut risk = self.risk.write();
            report.risk_actions = risk.check_stop_loss_take_profit(&current_prices);
            report.risk_actions.extend(risk.check_symbol_drawdown());
        }
        for action in &report.risk_actions {
            log::warn!("  {}", action);
        }

        log::info!("5. Selecting and executing strategies...");
        let mut performance_samples = Vec::new();
        for (symbol, view) in &views {
            let kind = self.selector.write().select(symbol, &view.regime.regime);
            report.selections.insert(symbol.clone(), kind);

            let signal = self.strategies.analyze(kind, &view.data);
            log::info!(
                "  {} [{}] signal: {} ({:.2}) - {}",
                symbol,
                kind,
                signal.action,
                signal.strength,
                signal.reason
            );
            performance_samples.push((symbol.clone(), signal.strength * 100.0));

            if signal.action.is_actionable() {
                if *shutdown.borrow() {
                    log::warn!("Shutdown requested, not placing further orders");
                    report.cancelled = true;
                    report.signals.push(signal);
                    return Ok(report);
                }
                if self.execute(kind, &signal, view).await {
                    report.executed.push(symbol.clone());
                }
            }
            report.signals.push(signal);
        }

        log::info!("6. Updating performance...");
        {
            let mut allocation = self.allocation.write();
            for (symbol, sample) in &performance_samples {
                allocation.update_performance(symbol, *sample);
            }
        }

        log::info!("7. Rebalancing portfolio...");
        let total_capital = self.config.risk.total_capital;
        if self.allocation.read().symbols().is_empty() {
            log::warn!("Empty symbol universe, nothing to rebalance");
        } else {
            report.allocations = self
                .rebalance_breaker
                .call(|| {
                    let targets = self.allocation.read().rebalance(total_capital);
                    async move { targets }
                })
                .await?;
        }

        log::info!("8. Checking risk metrics and performance...");
        report.risk_metrics = self.risk.read().calculate_risk_metrics();
        log::info!("{}", self.risk_report());
        log::info!("{}", self.performance_summary());

        if let Err(e) = self.risk.read().check_portfolio_risk() {
            log::warn!("Portfolio risk check failed: {}", e);
            report.portfolio_risk_warning = Some(e.to_string());
        }

        if self.risk.read().should_stop_trading() {
            log::warn!("WARNING: Risk limits exceeded, stopping trading!");
            self.controls.running.store(false, Ordering::SeqCst);
            report.emergency_stop = true;
            if let Err(e) = self.notifier.notify_emergency_stop("Risk limits exceeded").await {
                log::error!("Failed to send emergency stop alert: {}", e);
            }
        }

        log::info!("=== Trading Cycle Complete ===");
        Ok(report)
    }

    fn refresh_universe(&self, universe: &[String]) {
        log::info!("Universe: {:?}", universe);
        self.allocation.write().set_universe(universe);
        self.correlation.write().retain_symbols(universe);
        self.selector.write().retain_symbols(universe);
        self.risk.write().retain_symbols(universe);
    }

    async fn fetch_market_data(&self, symbol: &str) -> Option<MarketData> {
        let gateway = &self.gateway;
        let result = self
            .market_data_breaker
            .call(move || async move {
                match gateway.fetch_market_data(symbol).await {
                    // Not enough history is neutral, not a breaker failure.
                    Err(ExchangeError::InsufficientData(reason)) => {
                        log::info!("{}: insufficient data ({}), skipping", symbol, reason);
                        Ok(None)
                    }
                    other => other.map(Some),
                }
            })
            .await;

        match result {
            Ok(data) => data.filter(|d| !d.is_empty()),
            Err(CircuitBreakerError::Open { name }) => {
                log::warn!("Skipping {}: circuit breaker '{}' is open", symbol, name);
                None
            }
            Err(CircuitBreakerError::Operation(e)) => {
                log::warn!("Warning: Failed to get market data for {}: {}", symbol, e);
                None
            }
        }
    }

    fn analyze_symbol(&self, data: MarketData) -> SymbolView {
        let symbol = data.symbol.clone();
        let regime = self.classifier.classify(&data);
        let closes = data.close_prices();
        let price = closes.last().copied().unwrap_or_default();

        log::info!(
            "  {} regime: {} (recent vol {:.4}, slope {:.5}, volume ratio {:.2}) scores v/t/vol {:.1}/{:.1}/{:.1}",
            symbol,
            regime.regime,
            regime.recent_volatility,
            regime.slope,
            regime.volume_ratio,
            volatility_score(&regime.regime),
            trend_score(&regime.regime),
            volume_score(&regime.regime)
        );

        self.correlation.write().record_prices(&symbol, &closes);
        self.allocation
            .write()
            .update_volatility(&symbol, regime.recent_volatility);
        self.risk
            .write()
            .update_volatility(&symbol, regime.recent_volatility);

        let indicators = IndicatorSnapshot::compute(&data);
        if let Some(macd) = &indicators.macd {
            log::debug!(
                "  {} MACD: {:.4}, Signal: {:.4}, Histogram: {:.4}",
                symbol,
                macd.macd_line,
                macd.signal_line,
                macd.histogram
            );
        }
        let combined = combined_signal(&symbol, &indicators);
        log::info!(
            "  {} Combined Signal: {} (Score: {:.2}, Confidence: {:.2}) - {}",
            symbol,
            combined.action,
            combined.score,
            combined.confidence,
            combined.reason
        );

        let volume_signal = volume_weighted_signal(&data);
        log::info!(
            "  {} Volume-Weighted Signal: {} (Confidence: {:.2}) - {}",
            symbol,
            volume_signal.action,
            volume_signal.overall_confidence,
            volume_signal.reason
        );

        SymbolView { data, regime, price }
    }

    fn update_correlations(&self, symbols: &[String]) -> f64 {
        let threshold = self.config.trading.correlation_threshold;
        let mut correlation = self.correlation.write();
        correlation.calculate_correlations();

        for symbol in symbols {
            let correlated = correlation.get_highly_correlated_assets(symbol, threshold);
            if !correlated.is_empty() {
                let names: Vec<String> = correlated
                    .iter()
                    .map(|(other, corr)| format!("{} ({:.2})", other, corr))
                    .collect();
                log::info!("  {} is highly correlated with: {}", symbol, names.join(", "));
            }
        }

        let score = correlation.get_diversification_score(symbols);
        drop(correlation);

        log::info!("  Portfolio diversification score: {:.2}", score);
        self.risk.write().set_correlation_risk(1.0 - score);
        score
    }

    /// Size, risk-check, place and record one actionable signal.
    async fn execute(&self, kind: StrategyKind, signal: &TradeSignal, view: &SymbolView) -> bool {
        let symbol = signal.symbol.as_str();
        if view.price <= 0.0 {
            log::warn!("{}: no usable price, signal not executed", symbol);
            return false;
        }

        let fraction = self.allocation.read().optimal_allocation(symbol);
        let quantity = self.config.risk.total_capital * fraction / view.price;

        if let Err(e) = self.risk.read().check_position_risk(symbol, quantity, view.price) {
            log::warn!("{}: {}", symbol, e);
            return false;
        }

        if !self.config.trading.auto_trading {
            log::info!(
                "{}: auto trading disabled, {} {:.6} not sent",
                symbol,
                signal.action,
                quantity
            );
            return false;
        }

        let (Some(qty), Some(price)) = (Decimal::from_f64(quantity), view.data.last_close()) else {
            log::warn!("{}: cannot express order quantity {}", symbol, quantity);
            return false;
        };
        let order = Order {
            symbol: symbol.to_string(),
            action: signal.action,
            quantity: qty.round_dp(8),
            price,
            strategy: kind.as_str().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let gateway = &self.gateway;
        let order_ref = &order;
        if let Err(e) = self
            .execution_breaker
            .call(move || gateway.execute_signal(order_ref))
            .await
        {
            log::warn!("Warning: Failed to execute strategy for {}: {}", symbol, e);
            return false;
        }

        let price = order.price.to_f64().unwrap_or(view.price);
        let entry = TradeLogEntry::new(
            symbol,
            signal.action,
            quantity,
            price,
            kind.as_str(),
            signal.strength,
            &signal.reason,
        );
        let alert = TradeAlert {
            symbol: entry.symbol.clone(),
            action: entry.action,
            quantity: entry.quantity,
            price: entry.price,
            strategy: entry.strategy.clone(),
            confidence: entry.confidence,
            reason: entry.reason.clone(),
            timestamp: entry.timestamp,
        };
        self.performance.write().log_trade(entry);

        if let Err(e) = self.notifier.notify_trade_alert(&alert).await {
            log::error!("Failed to send trade alert for {}: {}", symbol, e);
        }
        true
    }
}

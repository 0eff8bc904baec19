// src/portfolio/allocation.rs
use crate::domain::errors::{TradingError, TradingResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MIN_FACTOR: f64 = 0.1;
const MAX_FACTOR: f64 = 2.0;
const EMA_SAMPLE_WEIGHT: f64 = 0.8;

/// Capital target for one symbol after a rebalance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub symbol: String,
    /// Fraction of total capital, in [0, 1].
    pub fraction: f64,
    pub target_value: f64,
}

/// Blends per-symbol performance and volatility into capital fractions.
///
/// The base allocation is an equal split over the current universe and is
/// reset on every [`AllocationEngine::set_universe`].
#[derive(Debug, Default)]
pub struct AllocationEngine {
    symbols: Vec<String>,
    base: HashMap<String, f64>,
    performance: HashMap<String, f64>,
    volatility: HashMap<String, f64>,
}

impl AllocationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_universe(&mut self, symbols: &[String]) {
        self.symbols = symbols.to_vec();
        self.base.clear();

        if !symbols.is_empty() {
            let share = 1.0 / symbols.len() as f64;
            for symbol in symbols {
                self.base.insert(symbol.clone(), share);
            }
        }

        self.performance.retain(|symbol, _| symbols.contains(symbol));
        self.volatility.retain(|symbol, _| symbols.contains(symbol));
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Base allocation; 0 for symbols outside the universe.
    pub fn allocation(&self, symbol: &str) -> f64 {
        self.base.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn update_performance(&mut self, symbol: &str, sample: f64) {
        let ema = match self.performance.get(symbol) {
            Some(prior) => EMA_SAMPLE_WEIGHT * sample + (1.0 - EMA_SAMPLE_WEIGHT) * prior,
            None => sample,
        };
        self.performance.insert(symbol.to_string(), ema);
    }

    pub fn performance_ema(&self, symbol: &str) -> Option<f64> {
        self.performance.get(symbol).copied()
    }

    pub fn update_volatility(&mut self, symbol: &str, recent_volatility: f64) {
        self.volatility.insert(symbol.to_string(), recent_volatility);
    }

    pub fn performance_allocation(&self, symbol: &str) -> f64 {
        let base = self.allocation(symbol);
        match self.performance.get(symbol) {
            Some(ema) => base * (1.0 + ema / 100.0).clamp(MIN_FACTOR, MAX_FACTOR),
            None => base,
        }
    }

    pub fn volatility_allocation(&self, symbol: &str) -> f64 {
        let base = self.allocation(symbol);
        match self.volatility.get(symbol) {
            Some(&vol) if vol > 0.0 => base * (1.0 / (1.0 + vol * 100.0)).clamp(MIN_FACTOR, MAX_FACTOR),
            _ => base,
        }
    }

    pub fn optimal_allocation(&self, symbol: &str) -> f64 {
        let blended = (self.performance_allocation(symbol) + self.volatility_allocation(symbol)) / 2.0;
        blended.clamp(0.0, 1.0)
    }

    pub fn rebalance(&self, total_capital: f64) -> TradingResult<Vec<AllocationTarget>> {
        if self.symbols.is_empty() {
            return Err(TradingError::Allocation(
                "cannot rebalance an empty symbol universe".to_string(),
            ));
        }

        let targets: Vec<AllocationTarget> = self
            .symbols
            .iter()
            .map(|symbol| {
                let fraction = self.optimal_allocation(symbol);
                AllocationTarget {
                    symbol: symbol.clone(),
                    fraction,
                    target_value: total_capital * fraction,
                }
            })
            .collect();

        for target in &targets {
            log::info!(
                "Symbol: {}, Target Allocation: {:.2}%, Target Value: ${:.2}",
                target.symbol,
                target.fraction * 100.0,
                target.target_value
            );
        }

        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe(n: usize) -> Vec<String> {
        ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT"]
            .iter()
            .take(n)
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_blended_allocation_example() {
        let mut engine = AllocationEngine::new();
        engine.set_universe(&universe(6));
        engine.update_performance("BTCUSDT", 50.0);
        // 0.01% per bar -> factor 1/1.01
        engine.update_volatility("BTCUSDT", 0.0001);

        assert!((engine.performance_allocation("BTCUSDT") - 0.25).abs() < 1e-9);
        assert!((engine.volatility_allocation("BTCUSDT") - 0.165).abs() < 1e-3);
        assert!((engine.optimal_allocation("BTCUSDT") - 0.2075).abs() < 1e-4);
    }

    #[test]
    fn test_factors_are_clamped() {
        let mut engine = AllocationEngine::new();
        engine.set_universe(&universe(4));
        let base = 0.25;

        engine.update_performance("BTCUSDT", 1e9);
        engine.update_volatility("BTCUSDT", 1e9);
        assert!((engine.performance_allocation("BTCUSDT") - base * 2.0).abs() < 1e-12);
        assert!((engine.volatility_allocation("BTCUSDT") - base * 0.1).abs() < 1e-12);

        engine.update_performance("ETHUSDT", -1e9);
        assert!((engine.performance_allocation("ETHUSDT") - base * 0.1).abs() < 1e-12);

        // Non-positive volatility counts as no data
        engine.update_volatility("ETHUSDT", -5.0);
        assert_eq!(engine.volatility_allocation("ETHUSDT"), base);
    }

    #[test]
    fn test_optimal_allocation_is_capped_at_one() {
        let mut engine = AllocationEngine::new();
        engine.set_universe(&universe(1));
        engine.update_performance("BTCUSDT", 500.0);
        assert_eq!(engine.optimal_allocation("BTCUSDT"), 1.0);
    }

    #[test]
    fn test_performance_ema() {
        let mut engine = AllocationEngine::new();
        engine.update_performance("BTCUSDT", 60.0);
        assert_eq!(engine.performance_ema("BTCUSDT"), Some(60.0));
        engine.update_performance("BTCUSDT", 10.0);
        assert!((engine.performance_ema("BTCUSDT").unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_universe_change_resets_base_and_drops_stale_state() {
        let mut engine = AllocationEngine::new();
        engine.set_universe(&universe(4));
        engine.update_performance("XRPUSDT", 40.0);
        assert_eq!(engine.allocation("XRPUSDT"), 0.25);

        engine.set_universe(&universe(2));
        assert_eq!(engine.allocation("BTCUSDT"), 0.5);
        assert_eq!(engine.allocation("XRPUSDT"), 0.0);
        assert!(engine.performance_ema("XRPUSDT").is_none());
    }

    #[test]
    fn test_rebalance() {
        let mut engine = AllocationEngine::new();
        assert!(matches!(engine.rebalance(10_000.0), Err(TradingError::Allocation(_))));

        engine.set_universe(&universe(2));
        let targets = engine.rebalance(10_000.0).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].symbol, "BTCUSDT");
        assert!((targets[0].target_value - 5_000.0).abs() < 1e-9);
    }
}

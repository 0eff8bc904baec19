// src/trading/weights.rs
use crate::analysis::regime::{MarketRegime, TrendRegime, VolatilityRegime, VolumeRegime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const BASE_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    MarketMaking,
    Momentum,
    MeanReversion,
    VolatilityBreakout,
}

impl StrategyKind {
    /// Every strategy, in tie-break priority order.
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::MarketMaking,
        StrategyKind::Momentum,
        StrategyKind::MeanReversion,
        StrategyKind::VolatilityBreakout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::MarketMaking => "market_making",
            StrategyKind::Momentum => "momentum",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::VolatilityBreakout => "volatility_breakout",
        }
    }

    fn index(&self) -> usize {
        match self {
            StrategyKind::MarketMaking => 0,
            StrategyKind::Momentum => 1,
            StrategyKind::MeanReversion => 2,
            StrategyKind::VolatilityBreakout => 3,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized weight per strategy, indexed in [`StrategyKind::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyWeights {
    weights: [f64; 4],
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            weights: [BASE_WEIGHT; 4],
        }
    }
}

impl StrategyWeights {
    pub fn get(&self, kind: StrategyKind) -> f64 {
        self.weights[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (StrategyKind, f64)> + '_ {
        StrategyKind::ALL.iter().map(move |kind| (*kind, self.get(*kind)))
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Highest weight; earlier strategies in [`StrategyKind::ALL`] win ties.
    pub fn best(&self) -> (StrategyKind, f64) {
        let mut best = (StrategyKind::ALL[0], self.weights[0]);
        for (kind, weight) in self.iter().skip(1) {
            if weight > best.1 {
                best = (kind, weight);
            }
        }
        best
    }

    fn add(&mut self, deltas: [f64; 4]) {
        for (weight, delta) in self.weights.iter_mut().zip(deltas) {
            *weight += delta;
        }
    }
}

impl fmt::Display for StrategyWeights {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(kind, weight)| format!("{}={:.3}", kind, weight))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

// Deltas in StrategyKind::ALL order:
// market making, momentum, mean reversion, volatility breakout.

fn volatility_deltas(regime: VolatilityRegime) -> [f64; 4] {
    match regime {
        VolatilityRegime::High => [-0.1, 0.1, -0.3, 0.3],
        VolatilityRegime::Low => [0.1, -0.1, 0.3, -0.3],
        VolatilityRegime::Medium => [0.0; 4],
    }
}

fn trend_deltas(regime: TrendRegime) -> [f64; 4] {
    match regime {
        TrendRegime::Up | TrendRegime::Down => [-0.2, 0.4, -0.2, 0.0],
        TrendRegime::Ranging => [0.1, -0.3, 0.4, -0.2],
    }
}

fn volume_deltas(regime: VolumeRegime) -> [f64; 4] {
    match regime {
        VolumeRegime::High => [-0.2, 0.2, -0.2, 0.2],
        VolumeRegime::Low => [0.3, -0.2, 0.1, -0.2],
        VolumeRegime::Normal => [0.0; 4],
    }
}

/// Weights for a regime. Always non-negative and summing to 1.
pub fn calculate_weights(regime: &MarketRegime) -> StrategyWeights {
    let mut weights = StrategyWeights::default();
    weights.add(volatility_deltas(regime.volatility));
    weights.add(trend_deltas(regime.trend));
    weights.add(volume_deltas(regime.volume));

    for weight in weights.weights.iter_mut() {
        *weight = weight.max(0.0);
    }

    let total = weights.total();
    if total <= 0.0 {
        return StrategyWeights::default();
    }
    for weight in weights.weights.iter_mut() {
        *weight /= total;
    }
    weights
}

pub fn volatility_score(regime: &MarketRegime) -> f64 {
    match regime.volatility {
        VolatilityRegime::High => 0.9,
        VolatilityRegime::Medium => 0.6,
        VolatilityRegime::Low => 0.3,
    }
}

pub fn trend_score(regime: &MarketRegime) -> f64 {
    match regime.trend {
        TrendRegime::Up | TrendRegime::Down => 0.9,
        TrendRegime::Ranging => 0.3,
    }
}

pub fn volume_score(regime: &MarketRegime) -> f64 {
    match regime.volume {
        VolumeRegime::High => 0.9,
        VolumeRegime::Normal => 0.6,
        VolumeRegime::Low => 0.3,
    }
}

/// Picks a strategy per symbol and remembers the weights behind each pick.
#[derive(Debug, Default)]
pub struct StrategySelector {
    weights: HashMap<String, StrategyWeights>,
}

impl StrategySelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, symbol: &str, regime: &MarketRegime) -> StrategyKind {
        let weights = calculate_weights(regime);
        let (kind, weight) = weights.best();
        log::debug!(
            "{}: regime {} -> {} ({:.3}) [{}]",
            symbol,
            regime,
            kind,
            weight,
            weights
        );
        self.weights.insert(symbol.to_string(), weights);
        kind
    }

    pub fn weights_for(&self, symbol: &str) -> Option<StrategyWeights> {
        self.weights.get(symbol).copied()
    }

    pub fn retain_symbols(&mut self, universe: &[String]) {
        self.weights.retain(|symbol, _| universe.contains(symbol));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_regimes() -> Vec<MarketRegime> {
        let mut regimes = Vec::new();
        for volatility in [VolatilityRegime::High, VolatilityRegime::Medium, VolatilityRegime::Low] {
            for trend in [TrendRegime::Up, TrendRegime::Down, TrendRegime::Ranging] {
                for volume in [VolumeRegime::High, VolumeRegime::Normal, VolumeRegime::Low] {
                    regimes.push(MarketRegime {
                        volatility,
                        trend,
                        volume,
                    });
                }
            }
        }
        regimes
    }

    #[test]
    fn test_weights_are_normalized_for_every_regime() {
        for regime in all_regimes() {
            let weights = calculate_weights(&regime);
            assert!((weights.total() - 1.0).abs() < 1e-9, "{}: {}", regime, weights);
            for (kind, weight) in weights.iter() {
                assert!(weight >= 0.0, "{} negative for {}", kind, regime);
            }
        }
    }

    #[test]
    fn test_trending_high_volatility_prefers_momentum() {
        let regime = MarketRegime {
            volatility: VolatilityRegime::High,
            trend: TrendRegime::Up,
            volume: VolumeRegime::High,
        };
        let weights = calculate_weights(&regime);
        // Raw: mm -0.25, mom 0.95, mr -0.45, vb 0.75 -> floored sum 1.7
        assert!((weights.get(StrategyKind::Momentum) - 0.95 / 1.7).abs() < 1e-9);
        assert_eq!(weights.get(StrategyKind::MarketMaking), 0.0);
        assert_eq!(weights.best().0, StrategyKind::Momentum);
    }

    #[test]
    fn test_quiet_ranging_market_prefers_mean_reversion() {
        let regime = MarketRegime {
            volatility: VolatilityRegime::Low,
            trend: TrendRegime::Ranging,
            volume: VolumeRegime::Low,
        };
        // Raw: mm 0.75, mom -0.35, mr 1.05, vb -0.45
        assert_eq!(calculate_weights(&regime).best().0, StrategyKind::MeanReversion);
    }

    #[test]
    fn test_ties_follow_priority_order() {
        assert_eq!(StrategyWeights::default().best().0, StrategyKind::MarketMaking);

        let tied = StrategyWeights {
            weights: [0.1, 0.4, 0.4, 0.1],
        };
        assert_eq!(tied.best().0, StrategyKind::Momentum);
    }

    #[test]
    fn test_selector_stores_weights_per_symbol() {
        let mut selector = StrategySelector::new();
        let regime = MarketRegime::default();
        let kind = selector.select("BTCUSDT", &regime);

        let stored = selector.weights_for("BTCUSDT").unwrap();
        assert_eq!(stored.best().0, kind);
        assert!(selector.weights_for("ETHUSDT").is_none());

        selector.retain_symbols(&[]);
        assert!(selector.weights_for("BTCUSDT").is_none());
    }

    #[test]
    fn test_regime_scores() {
        let regime = MarketRegime::default();
        assert_eq!(volatility_score(&regime), 0.3);
        assert_eq!(trend_score(&regime), 0.3);
        assert_eq!(volume_score(&regime), 0.6);
    }
}

// src/analysis/regime.rs
use crate::domain::models::MarketData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bars in the "recent" volatility window.
const RECENT_WINDOW: usize = 10;
const HIGH_RATIO: f64 = 1.2;
const LOW_RATIO: f64 = 0.8;
const SLOPE_THRESHOLD: f64 = 0.001;
const SLOPE_CAP: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolatilityRegime {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendRegime {
    Up,
    Down,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeRegime {
    High,
    Normal,
    Low,
}

/// Categorical summary of a symbol's latest data window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketRegime {
    pub volatility: VolatilityRegime,
    pub trend: TrendRegime,
    pub volume: VolumeRegime,
}

impl Default for MarketRegime {
    fn default() -> Self {
        Self {
            volatility: VolatilityRegime::Low,
            trend: TrendRegime::Ranging,
            volume: VolumeRegime::Normal,
        }
    }
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VolatilityRegime::High => write!(f, "high_volatility"),
            VolatilityRegime::Medium => write!(f, "medium_volatility"),
            VolatilityRegime::Low => write!(f, "low_volatility"),
        }
    }
}

impl fmt::Display for TrendRegime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrendRegime::Up => write!(f, "trending_up"),
            TrendRegime::Down => write!(f, "trending_down"),
            TrendRegime::Ranging => write!(f, "ranging"),
        }
    }
}

impl fmt::Display for VolumeRegime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VolumeRegime::High => write!(f, "high_volume"),
            VolumeRegime::Normal => write!(f, "normal_volume"),
            VolumeRegime::Low => write!(f, "low_volume"),
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.volatility, self.trend, self.volume)
    }
}

/// Regime plus the raw measurements it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeSnapshot {
    pub regime: MarketRegime,
    pub recent_volatility: f64,
    pub long_term_volatility: f64,
    pub slope: f64,
    /// |slope| normalized against the cap, in [0, 1].
    pub trend_strength: f64,
    pub volume_ratio: f64,
}

impl Default for RegimeSnapshot {
    fn default() -> Self {
        Self {
            regime: MarketRegime::default(),
            recent_volatility: 0.0,
            long_term_volatility: 0.0,
            slope: 0.0,
            trend_strength: 0.0,
            volume_ratio: 1.0,
        }
    }
}

/// Turns an OHLCV window into a [`MarketRegime`].
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier;

impl RegimeClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, data: &MarketData) -> RegimeSnapshot {
        if data.len() < 2 {
            log::debug!(
                "{}: {} bars, using default regime",
                data.symbol,
                data.len()
            );
            return RegimeSnapshot::default();
        }

        let mids = data.mid_prices();
        let recent_start = mids.len().saturating_sub(RECENT_WINDOW);
        let recent_volatility = mean_abs_change(&mids[recent_start..]);
        let long_term_volatility = mean_abs_change(&mids);
        let volatility = volatility_regime(recent_volatility, long_term_volatility);

        let slope = linear_regression_slope(&data.close_prices());
        let trend = if slope > SLOPE_THRESHOLD {
            TrendRegime::Up
        } else if slope < -SLOPE_THRESHOLD {
            TrendRegime::Down
        } else {
            TrendRegime::Ranging
        };
        let trend_strength = (slope.abs().min(SLOPE_CAP) / SLOPE_CAP).clamp(0.0, 1.0);

        let volume_ratio = volume_ratio(&data.volumes());
        let volume = if volume_ratio > HIGH_RATIO {
            VolumeRegime::High
        } else if volume_ratio < LOW_RATIO {
            VolumeRegime::Low
        } else {
            VolumeRegime::Normal
        };

        RegimeSnapshot {
            regime: MarketRegime {
                volatility,
                trend,
                volume,
            },
            recent_volatility,
            long_term_volatility,
            slope,
            trend_strength,
            volume_ratio,
        }
    }
}

fn volatility_regime(recent: f64, long: f64) -> VolatilityRegime {
    if recent > long * HIGH_RATIO {
        VolatilityRegime::High
    } else if recent < long * LOW_RATIO {
        VolatilityRegime::Low
    } else {
        VolatilityRegime::Medium
    }
}

/// Mean absolute relative change between consecutive values.
pub fn mean_abs_change(prices: &[f64]) -> f64 {
    let changes: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| ((w[1] - w[0]) / w[0]).abs())
        .collect();

    if changes.is_empty() {
        return 0.0;
    }
    changes.iter().sum::<f64>() / changes.len() as f64
}

/// Ordinary least squares slope of `values` against their index.
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, value) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += value;
        sum_xy += x * value;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denominator
}

fn volume_ratio(volumes: &[f64]) -> f64 {
    let Some(current) = volumes.last() else {
        return 1.0;
    };
    let average = volumes.iter().sum::<f64>() / volumes.len() as f64;
    if average > 0.0 {
        current / average
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Candle;
    use rust_decimal::Decimal;

    fn series(closes: &[f64], volumes: &[f64]) -> MarketData {
        let candles = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (close, volume))| {
                let close = Decimal::try_from(*close).unwrap();
                Candle {
                    open_time: i as i64,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: Decimal::try_from(*volume).unwrap(),
                }
            })
            .collect();
        MarketData::new("TEST", candles)
    }

    #[test]
    fn test_short_series_yields_default_regime() {
        let snapshot = RegimeClassifier::new().classify(&series(&[100.0], &[10.0]));
        assert_eq!(snapshot.regime, MarketRegime::default());
        assert_eq!(snapshot.regime.volatility, VolatilityRegime::Low);
        assert_eq!(snapshot.regime.trend, TrendRegime::Ranging);
        assert_eq!(snapshot.regime.volume, VolumeRegime::Normal);
    }

    #[test]
    fn test_high_volatility_uptrend_high_volume() {
        // 20 calm bars rising slowly, then 10 bars of wide swings that keep rising.
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 0.1).collect();
        for i in 0..10 {
            let base = 102.0 + i as f64;
            closes.push(if i % 2 == 0 { base + 3.0 } else { base - 1.0 });
        }
        let mut volumes = vec![100.0; 29];
        volumes.push(500.0);

        let snapshot = RegimeClassifier::new().classify(&series(&closes, &volumes));

        assert!(snapshot.recent_volatility > snapshot.long_term_volatility * 1.2);
        assert_eq!(snapshot.regime.volatility, VolatilityRegime::High);
        assert!(snapshot.slope > 0.001);
        assert_eq!(snapshot.regime.trend, TrendRegime::Up);
        assert!(snapshot.volume_ratio > 1.2);
        assert_eq!(snapshot.regime.volume, VolumeRegime::High);
        assert!(snapshot.trend_strength > 0.0 && snapshot.trend_strength <= 1.0);
    }

    #[test]
    fn test_falling_quiet_market() {
        // Large early swings, calm recent decline.
        let mut closes = Vec::new();
        for i in 0..20 {
            closes.push(if i % 2 == 0 { 120.0 } else { 110.0 });
        }
        for i in 0..10 {
            closes.push(105.0 - i as f64 * 0.2);
        }
        let mut volumes = vec![100.0; 29];
        volumes.push(20.0);

        let snapshot = RegimeClassifier::new().classify(&series(&closes, &volumes));

        assert_eq!(snapshot.regime.volatility, VolatilityRegime::Low);
        assert_eq!(snapshot.regime.trend, TrendRegime::Down);
        assert_eq!(snapshot.regime.volume, VolumeRegime::Low);
    }

    #[test]
    fn test_flat_series_is_ranging_medium() {
        let closes = vec![50.0; 15];
        let volumes = vec![10.0; 15];
        let snapshot = RegimeClassifier::new().classify(&series(&closes, &volumes));

        // Both windows are zero, so recent is neither above 1.2x nor below 0.8x.
        assert_eq!(snapshot.regime.volatility, VolatilityRegime::Medium);
        assert_eq!(snapshot.regime.trend, TrendRegime::Ranging);
        assert_eq!(snapshot.regime.volume, VolumeRegime::Normal);
        assert_eq!(snapshot.trend_strength, 0.0);
    }

    #[test]
    fn test_trend_strength_is_capped() {
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + i as f64 * 10.0).collect();
        let volumes = vec![1.0; 12];
        let snapshot = RegimeClassifier::new().classify(&series(&closes, &volumes));
        assert_eq!(snapshot.trend_strength, 1.0);
    }

    #[test]
    fn test_slope_of_line() {
        assert!((linear_regression_slope(&[1.0, 3.0, 5.0, 7.0]) - 2.0).abs() < 1e-12);
        assert_eq!(linear_regression_slope(&[4.0]), 0.0);
    }

    #[test]
    fn test_mean_abs_change_skips_zero_prices() {
        assert_eq!(mean_abs_change(&[0.0, 0.0]), 0.0);
        assert!((mean_abs_change(&[100.0, 110.0, 99.0]) - 0.1).abs() < 1e-12);
    }
}

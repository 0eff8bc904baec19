// src/analysis/indicators.rs
use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::models::{MarketData, TradeAction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ta::indicators::{
    BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex,
};
use ta::Next;

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
const STOCH_PERIOD: usize = 14;
const STOCH_SMOOTHING: usize = 3;

/// Score used for an indicator that could not be computed.
pub const NEUTRAL_SCORE: f64 = 0.5;

fn ta_error(err: impl std::fmt::Debug) -> AnalysisError {
    AnalysisError::IndicatorCalculation(format!("{:?}", err))
}

fn require(values: &[f64], needed: usize, indicator: &str) -> AnalysisResult<()> {
    if values.len() < needed {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for {} calculation. Need at least {} points, got {}",
            indicator,
            needed,
            values.len()
        )));
    }
    Ok(())
}

/// Exponential Moving Average (EMA), one output per input.
pub fn calculate_ema(values: &[f64], period: usize) -> AnalysisResult<Vec<f64>> {
    require(values, period, "EMA")?;
    let mut ema = ExponentialMovingAverage::new(period).map_err(ta_error)?;
    Ok(values.iter().map(|v| ema.next(*v)).collect())
}

/// RSI values after the warm-up period.
pub fn rsi_series(closes: &[f64], period: usize) -> AnalysisResult<Vec<f64>> {
    require(closes, period + 1, "RSI")?;
    let mut rsi = RelativeStrengthIndex::new(period).map_err(ta_error)?;
    let all: Vec<f64> = closes.iter().map(|c| rsi.next(*c)).collect();
    Ok(all[period..].to_vec())
}

/// Relative Strength Index (RSI) of the latest bar
pub fn calculate_rsi(closes: &[f64], period: usize) -> AnalysisResult<f64> {
    rsi_series(closes, period)?
        .last()
        .copied()
        .ok_or_else(|| AnalysisError::InsufficientData("RSI".to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdResult {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// MACD (12, 26, 9) at the latest bar
pub fn calculate_macd(closes: &[f64]) -> AnalysisResult<MacdResult> {
    calculate_macd_with(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)
}

pub fn calculate_macd_with(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> AnalysisResult<MacdResult> {
    require(closes, slow, "MACD")?;
    let mut macd = MovingAverageConvergenceDivergence::new(fast, slow, signal).map_err(ta_error)?;

    let mut latest = None;
    for close in closes {
        latest = Some(macd.next(*close));
    }

    latest
        .map(|out| MacdResult {
            macd_line: out.macd,
            signal_line: out.signal,
            histogram: out.histogram,
        })
        .ok_or_else(|| AnalysisError::InsufficientData("MACD".to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerResult {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> AnalysisResult<BollingerResult> {
    require(closes, period, "Bollinger Bands")?;
    let mut bands = BollingerBands::new(period, multiplier).map_err(ta_error)?;

    let mut latest = None;
    for close in closes {
        latest = Some(bands.next(*close));
    }

    latest
        .map(|out| BollingerResult {
            middle: out.average,
            upper: out.upper,
            lower: out.lower,
        })
        .ok_or_else(|| AnalysisError::InsufficientData("Bollinger Bands".to_string()))
}

/// %K and %D, both on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticRsiResult {
    pub k: f64,
    pub d: f64,
}

/// Stochastic oscillator applied to the RSI series.
pub fn calculate_stochastic_rsi(closes: &[f64]) -> AnalysisResult<StochasticRsiResult> {
    let rsi = rsi_series(closes, RSI_PERIOD)?;
    require(&rsi, STOCH_PERIOD + STOCH_SMOOTHING - 1, "Stochastic RSI")?;

    let k_values: Vec<f64> = rsi
        .windows(STOCH_PERIOD)
        .map(|window| {
            let current = window[window.len() - 1];
            let lowest = window.iter().copied().fold(f64::INFINITY, f64::min);
            let highest = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if highest > lowest {
                (current - lowest) / (highest - lowest) * 100.0
            } else {
                50.0
            }
        })
        .collect();

    let k = k_values[k_values.len() - 1];
    let tail = &k_values[k_values.len() - STOCH_SMOOTHING..];
    let d = tail.iter().sum::<f64>() / STOCH_SMOOTHING as f64;

    Ok(StochasticRsiResult { k, d })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VwapResult {
    pub value: f64,
    pub upper_band: f64,
    pub lower_band: f64,
    pub bandwidth: f64,
}

/// Volume Weighted Average Price over the whole window with 2σ bands.
pub fn calculate_vwap(data: &MarketData) -> AnalysisResult<VwapResult> {
    let highs = data.high_prices();
    let lows = data.low_prices();
    let closes = data.close_prices();
    let volumes = data.volumes();

    let typical: Vec<f64> = (0..closes.len())
        .map(|i| (highs[i] + lows[i] + closes[i]) / 3.0)
        .collect();

    let total_volume: f64 = volumes.iter().sum();
    if total_volume <= 0.0 {
        return Err(AnalysisError::InsufficientData(format!(
            "{}: no traded volume for VWAP",
            data.symbol
        )));
    }

    let vwap = typical
        .iter()
        .zip(&volumes)
        .map(|(price, volume)| price * volume)
        .sum::<f64>()
        / total_volume;

    let variance = typical
        .iter()
        .zip(&volumes)
        .map(|(price, volume)| (price - vwap).powi(2) * volume)
        .sum::<f64>()
        / total_volume;
    let std_dev = variance.sqrt();

    let upper_band = vwap + 2.0 * std_dev;
    let lower_band = vwap - 2.0 * std_dev;
    let bandwidth = if vwap != 0.0 {
        (upper_band - lower_band) / vwap
    } else {
        0.0
    };

    Ok(VwapResult {
        value: vwap,
        upper_band,
        lower_band,
        bandwidth,
    })
}

/// Indicator values for one symbol; `None` where the series was too short.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub macd: Option<MacdResult>,
    pub stochastic_rsi: Option<StochasticRsiResult>,
    pub vwap: Option<VwapResult>,
    pub last_close: f64,
}

impl IndicatorSnapshot {
    /// Compute every indicator, dropping the ones that fail.
    pub fn compute(data: &MarketData) -> Self {
        let closes = data.close_prices();

        let macd = calculate_macd(&closes)
            .map_err(|e| log::debug!("{}: MACD unavailable: {}", data.symbol, e))
            .ok();
        let stochastic_rsi = calculate_stochastic_rsi(&closes)
            .map_err(|e| log::debug!("{}: stochastic RSI unavailable: {}", data.symbol, e))
            .ok();
        let vwap = calculate_vwap(data)
            .map_err(|e| log::debug!("{}: VWAP unavailable: {}", data.symbol, e))
            .ok();

        Self {
            macd,
            stochastic_rsi,
            vwap,
            last_close: closes.last().copied().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedSignal {
    pub symbol: String,
    /// Equal-weighted mean of the component scores, 0-1.
    pub score: f64,
    pub confidence: f64,
    pub components: BTreeMap<String, f64>,
    pub action: TradeAction,
    pub reason: String,
}

fn macd_score(macd: &MacdResult) -> f64 {
    if macd.signal_line == 0.0 {
        return NEUTRAL_SCORE;
    }
    let raw = (macd.macd_line - macd.signal_line) / macd.signal_line.abs();
    ((raw + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn vwap_score(vwap: &VwapResult, price: f64) -> f64 {
    let width = vwap.upper_band - vwap.lower_band;
    if width <= 0.0 {
        return NEUTRAL_SCORE;
    }
    ((price - vwap.lower_band) / width).clamp(0.0, 1.0)
}

/// Blend MACD, stochastic RSI and VWAP position into one score.
pub fn combined_signal(symbol: &str, snapshot: &IndicatorSnapshot) -> CombinedSignal {
    let macd = snapshot.macd.as_ref().map(macd_score).unwrap_or(NEUTRAL_SCORE);
    let rsi = snapshot
        .stochastic_rsi
        .map(|s| (s.k / 100.0).clamp(0.0, 1.0))
        .unwrap_or(NEUTRAL_SCORE);
    let vwap = snapshot
        .vwap
        .as_ref()
        .map(|v| vwap_score(v, snapshot.last_close))
        .unwrap_or(NEUTRAL_SCORE);

    let mut components = BTreeMap::new();
    components.insert("MACD".to_string(), macd);
    components.insert("StochasticRSI".to_string(), rsi);
    components.insert("VWAP".to_string(), vwap);

    let score = (macd + rsi + vwap) / 3.0;

    let agreement = if macd > 0.5 && rsi > 0.5 && vwap > 0.5 {
        1.0
    } else if macd < 0.5 && rsi < 0.5 && vwap < 0.5 {
        -1.0
    } else {
        (macd + rsi + vwap - 1.5) / 1.5
    };

    let (action, reason) = if score > 0.6 && agreement > 0.5 {
        (
            TradeAction::Buy,
            format!("Strong buy signal: score {:.2}, agreement {:.2}", score, agreement),
        )
    } else if score < 0.4 && agreement < -0.5 {
        (
            TradeAction::Sell,
            format!("Strong sell signal: score {:.2}, agreement {:.2}", score, agreement),
        )
    } else if score > 0.55 {
        (TradeAction::Buy, format!("Moderate buy signal: score {:.2}", score))
    } else if score < 0.45 {
        (TradeAction::Sell, format!("Moderate sell signal: score {:.2}", score))
    } else {
        (TradeAction::Hold, "Neutral conditions".to_string())
    };

    let confidence = ((score - 0.5).abs() * 2.0 + agreement.abs()) / 2.0;

    CombinedSignal {
        symbol: symbol.to_string(),
        score,
        confidence,
        components,
        action,
        reason,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeWeightedSignal {
    pub symbol: String,
    pub action: TradeAction,
    pub price_confidence: f64,
    pub volume_confidence: f64,
    pub overall_confidence: f64,
    pub reason: String,
}

/// Latest bar's price move confirmed (or not) by its volume change.
pub fn volume_weighted_signal(data: &MarketData) -> VolumeWeightedSignal {
    let closes = data.close_prices();
    let volumes = data.volumes();
    let n = closes.len();

    if n < 2 {
        return VolumeWeightedSignal {
            symbol: data.symbol.clone(),
            action: TradeAction::Hold,
            price_confidence: 0.0,
            volume_confidence: 0.0,
            overall_confidence: 0.0,
            reason: "Insufficient data".to_string(),
        };
    }

    let percent_change = |current: f64, previous: f64| {
        if previous != 0.0 {
            (current - previous) / previous * 100.0
        } else {
            0.0
        }
    };
    let price_change = percent_change(closes[n - 1], closes[n - 2]);
    let volume_change = percent_change(volumes[n - 1], volumes[n - 2]);

    let (mut action, price_confidence) = if price_change > 1.0 {
        (TradeAction::Buy, (price_change / 5.0).min(1.0))
    } else if price_change < -1.0 {
        (TradeAction::Sell, (price_change.abs() / 5.0).min(1.0))
    } else {
        (TradeAction::Hold, 0.0)
    };

    let (volume_confidence, reason) = match action {
        TradeAction::Buy | TradeAction::Sell => {
            let direction = if action == TradeAction::Buy { "up" } else { "down" };
            if volume_change > 50.0 {
                (
                    1.0,
                    format!(
                        "Strong {}: price {} {:.2}% with volume surge {:.2}%",
                        action, direction, price_change.abs(), volume_change
                    ),
                )
            } else if volume_change > 0.0 {
                (
                    0.5,
                    format!(
                        "Moderate {}: price {} {:.2}% with volume increase {:.2}%",
                        action, direction, price_change.abs(), volume_change
                    ),
                )
            } else {
                (
                    0.2,
                    format!(
                        "Weak {}: price {} {:.2}% but volume down {:.2}%",
                        action, direction, price_change.abs(), volume_change.abs()
                    ),
                )
            }
        }
        _ if volume_change > 100.0 => (
            0.7,
            format!(
                "Accumulation: high volume ({:.2}%) with no significant price change",
                volume_change
            ),
        ),
        _ => (
            0.3,
            format!(
                "Low activity: volume change {:.2}%, price change {:.2}%",
                volume_change, price_change
            ),
        ),
    };

    let overall_confidence = price_confidence * 0.6 + volume_confidence * 0.4;
    if overall_confidence < 0.3 {
        action = TradeAction::Hold;
    }

    VolumeWeightedSignal {
        symbol: data.symbol.clone(),
        action,
        price_confidence,
        volume_confidence,
        overall_confidence,
        reason,
    }
}

// src/trading/strategies.rs
use crate::analysis::indicators;
use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::{MarketData, TradeAction, TradeSignal};
use crate::trading::weights::StrategyKind;
use std::collections::HashMap;

/// Trading strategy trait that all strategies must implement
pub trait TradingStrategy: Send + Sync {
    /// Get the name of the strategy
    fn name(&self) -> &str;

    /// Get the description of the strategy
    fn description(&self) -> &str;

    fn kind(&self) -> StrategyKind;

    /// Analyze market data and generate a trading signal.
    /// Too little data yields a `Hold` signal, never an error.
    fn analyze(&self, data: &MarketData) -> TradeSignal;

    /// Get strategy parameters
    fn parameters(&self) -> Vec<StrategyParameter>;

    /// Update strategy parameters
    fn update_parameter(&mut self, name: &str, value: ParameterValue) -> TradingResult<()>;
}

/// Strategy parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Integer(i64),
    Float(f64),
}

/// Strategy parameter
#[derive(Debug, Clone)]
pub struct StrategyParameter {
    pub name: String,
    pub description: String,
    pub value: ParameterValue,
    pub range: Option<ParameterRange>,
}

/// Parameter value range
#[derive(Debug, Clone)]
pub enum ParameterRange {
    Integer(i64, i64),
    Float(f64, f64),
}

impl ParameterRange {
    fn check(&self, name: &str, value: &ParameterValue) -> TradingResult<()> {
        let in_range = match (self, value) {
            (ParameterRange::Integer(min, max), ParameterValue::Integer(v)) => v >= min && v <= max,
            (ParameterRange::Float(min, max), ParameterValue::Float(v)) => v >= min && v <= max,
            _ => false,
        };
        if in_range {
            Ok(())
        } else {
            Err(TradingError::Strategy(format!(
                "Value {:?} out of range {:?} for parameter {}",
                value, self, name
            )))
        }
    }
}

fn float_param(name: &str, description: &str, value: f64, min: f64, max: f64) -> StrategyParameter {
    StrategyParameter {
        name: name.to_string(),
        description: description.to_string(),
        value: ParameterValue::Float(value),
        range: Some(ParameterRange::Float(min, max)),
    }
}

fn int_param(name: &str, description: &str, value: usize, min: i64, max: i64) -> StrategyParameter {
    StrategyParameter {
        name: name.to_string(),
        description: description.to_string(),
        value: ParameterValue::Integer(value as i64),
        range: Some(ParameterRange::Integer(min, max)),
    }
}

/// Validate `value` against the declared range of parameter `name`.
fn checked(strategy: &dyn TradingStrategy, name: &str, value: &ParameterValue) -> TradingResult<()> {
    let parameter = strategy
        .parameters()
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| TradingError::Strategy(format!("Unknown parameter: {}", name)))?;

    match parameter.range {
        Some(range) => range.check(name, value),
        None => Ok(()),
    }
}

fn insufficient(symbol: &str, needed: usize, got: usize) -> TradeSignal {
    TradeSignal::hold(
        symbol,
        format!("Insufficient market data: need {} bars, got {}", needed, got),
    )
}

fn standard_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Avellaneda-Stoikov style quoting around the last close.
pub struct MarketMakingStrategy {
    name: String,
    description: String,
    /// Risk aversion
    gamma: f64,
    /// Order book liquidity
    k: f64,
    /// Minimum spread, as a fraction of price, worth quoting
    min_spread: f64,
    lookback: usize,
}

impl MarketMakingStrategy {
    pub fn new() -> Self {
        Self {
            name: "Market Making".to_string(),
            description: "Quotes both sides when the volatility-implied spread is profitable"
                .to_string(),
            gamma: 0.1,
            k: 1.5,
            min_spread: 0.001,
            lookback: 20,
        }
    }

    /// Spread as a fraction of price for return volatility `sigma`.
    pub fn optimal_spread(&self, sigma: f64) -> f64 {
        self.gamma * sigma * sigma + sigma / self.k
    }
}

impl Default for MarketMakingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TradingStrategy for MarketMakingStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MarketMaking
    }

    fn analyze(&self, data: &MarketData) -> TradeSignal {
        let closes = data.close_prices();
        if closes.len() < 2 {
            return insufficient(&data.symbol, 2, closes.len());
        }

        let start = closes.len().saturating_sub(self.lookback + 1);
        let returns: Vec<f64> = closes[start..]
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        let sigma = standard_deviation(&returns);
        let spread = self.optimal_spread(sigma);

        let mid = closes[closes.len() - 1];
        let bid = mid * (1.0 - spread / 2.0);
        let ask = mid * (1.0 + spread / 2.0);

        if spread > self.min_spread {
            TradeSignal {
                symbol: data.symbol.clone(),
                action: TradeAction::PlaceOrders,
                strength: (1.0 - spread).clamp(0.0, 1.0),
                reason: format!(
                    "Market making opportunity: spread {:.4}%, bid {:.4}, ask {:.4}",
                    spread * 100.0,
                    bid,
                    ask
                ),
            }
        } else {
            TradeSignal::hold(
                &data.symbol,
                format!("Spread {:.4}% below minimum {:.4}%", spread * 100.0, self.min_spread * 100.0),
            )
        }
    }

    fn parameters(&self) -> Vec<StrategyParameter> {
        vec![
            float_param("gamma", "Risk aversion", self.gamma, 0.001, 10.0),
            float_param("k", "Order book liquidity factor", self.k, 0.1, 100.0),
            float_param("min_spread", "Minimum profitable spread", self.min_spread, 0.0, 0.1),
            int_param("lookback", "Bars used for volatility", self.lookback, 2, 500),
        ]
    }

    fn update_parameter(&mut self, name: &str, value: ParameterValue) -> TradingResult<()> {
        checked(&*self, name, &value)?;
        match (name, value) {
            ("gamma", ParameterValue::Float(v)) => self.gamma = v,
            ("k", ParameterValue::Float(v)) => self.k = v,
            ("min_spread", ParameterValue::Float(v)) => self.min_spread = v,
            ("lookback", ParameterValue::Integer(v)) => self.lookback = v as usize,
            _ => return Err(TradingError::Strategy(format!("Unknown parameter: {}", name))),
        }
        Ok(())
    }
}

/// RSI extremes confirmed by the MACD line.
pub struct MomentumStrategy {
    name: String,
    description: String,
    rsi_period: usize,
    overbought: f64,
    oversold: f64,
    macd_fast: usize,
    macd_slow: usize,
    macd_signal: usize,
}

impl MomentumStrategy {
    pub fn new() -> Self {
        Self {
            name: "Momentum".to_string(),
            description: "Trades RSI extremes when MACD agrees".to_string(),
            rsi_period: indicators::RSI_PERIOD,
            overbought: 70.0,
            oversold: 30.0,
            macd_fast: indicators::MACD_FAST,
            macd_slow: indicators::MACD_SLOW,
            macd_signal: indicators::MACD_SIGNAL,
        }
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TradingStrategy for MomentumStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn analyze(&self, data: &MarketData) -> TradeSignal {
        let closes = data.close_prices();
        let needed = self.macd_slow.max(self.rsi_period + 1);
        if closes.len() < needed {
            return insufficient(&data.symbol, needed, closes.len());
        }

        let rsi = indicators::calculate_rsi(&closes, self.rsi_period);
        let macd = indicators::calculate_macd_with(
            &closes,
            self.macd_fast,
            self.macd_slow,
            self.macd_signal,
        );
        let (rsi, macd) = match (rsi, macd) {
            (Ok(rsi), Ok(macd)) => (rsi, macd),
            (Err(e), _) | (_, Err(e)) => {
                return TradeSignal::hold(&data.symbol, format!("Indicators unavailable: {}", e))
            }
        };

        if rsi < self.oversold && macd.macd_line > macd.signal_line {
            TradeSignal {
                symbol: data.symbol.clone(),
                action: TradeAction::Buy,
                strength: ((self.oversold - rsi) / self.oversold).clamp(0.0, 1.0),
                reason: format!(
                    "Oversold: RSI {:.2} < {:.2} and MACD {:.4} > signal {:.4}",
                    rsi, self.oversold, macd.macd_line, macd.signal_line
                ),
            }
        } else if rsi > self.overbought && macd.macd_line < macd.signal_line {
            TradeSignal {
                symbol: data.symbol.clone(),
                action: TradeAction::Sell,
                strength: ((rsi - self.overbought) / (100.0 - self.overbought)).clamp(0.0, 1.0),
                reason: format!(
                    "Overbought: RSI {:.2} > {:.2} and MACD {:.4} < signal {:.4}",
                    rsi, self.overbought, macd.macd_line, macd.signal_line
                ),
            }
        } else {
            TradeSignal::hold(
                &data.symbol,
                format!(
                    "Neutral: RSI {:.2}, MACD {:.4}, signal {:.4}",
                    rsi, macd.macd_line, macd.signal_line
                ),
            )
        }
    }

    fn parameters(&self) -> Vec<StrategyParameter> {
        vec![
            int_param("rsi_period", "RSI period", self.rsi_period, 2, 50),
            float_param("rsi_overbought", "RSI overbought threshold", self.overbought, 50.0, 95.0),
            float_param("rsi_oversold", "RSI oversold threshold", self.oversold, 5.0, 50.0),
            int_param("macd_fast", "Fast EMA period", self.macd_fast, 2, 50),
            int_param("macd_slow", "Slow EMA period", self.macd_slow, 5, 100),
            int_param("macd_signal", "Signal line period", self.macd_signal, 2, 50),
        ]
    }

    fn update_parameter(&mut self, name: &str, value: ParameterValue) -> TradingResult<()> {
        checked(&*self, name, &value)?;
        match (name, value) {
            ("rsi_period", ParameterValue::Integer(v)) => self.rsi_period = v as usize,
            ("rsi_overbought", ParameterValue::Float(v)) => {
                if v <= self.oversold {
                    return Err(TradingError::Strategy(format!(
                        "Overbought threshold must be > oversold threshold ({})",
                        self.oversold
                    )));
                }
                self.overbought = v;
            }
            ("rsi_oversold", ParameterValue::Float(v)) => {
                if v >= self.overbought {
                    return Err(TradingError::Strategy(format!(
                        "Oversold threshold must be < overbought threshold ({})",
                        self.overbought
                    )));
                }
                self.oversold = v;
            }
            ("macd_fast", ParameterValue::Integer(v)) => {
                if v as usize >= self.macd_slow {
                    return Err(TradingError::Strategy(format!(
                        "Fast period must be < slow period ({})",
                        self.macd_slow
                    )));
                }
                self.macd_fast = v as usize;
            }
            ("macd_slow", ParameterValue::Integer(v)) => {
                if v as usize <= self.macd_fast {
                    return Err(TradingError::Strategy(format!(
                        "Slow period must be > fast period ({})",
                        self.macd_fast
                    )));
                }
                self.macd_slow = v as usize;
            }
            ("macd_signal", ParameterValue::Integer(v)) => self.macd_signal = v as usize,
            _ => return Err(TradingError::Strategy(format!("Unknown parameter: {}", name))),
        }
        Ok(())
    }
}

/// Fades closes outside the Bollinger bands when RSI is stretched.
pub struct MeanReversionStrategy {
    name: String,
    description: String,
    bollinger_period: usize,
    bollinger_std: f64,
    rsi_period: usize,
    overbought: f64,
    oversold: f64,
}

impl MeanReversionStrategy {
    pub fn new() -> Self {
        Self {
            name: "Mean Reversion".to_string(),
            description: "Buys below the lower band and sells above the upper band".to_string(),
            bollinger_period: 20,
            bollinger_std: 2.0,
            rsi_period: indicators::RSI_PERIOD,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TradingStrategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn analyze(&self, data: &MarketData) -> TradeSignal {
        let closes = data.close_prices();
        let needed = self.bollinger_period.max(self.rsi_period + 1);
        if closes.len() < needed {
            return insufficient(&data.symbol, needed, closes.len());
        }

        let bands = indicators::calculate_bollinger(&closes, self.bollinger_period, self.bollinger_std);
        let rsi = indicators::calculate_rsi(&closes, self.rsi_period);
        let (bands, rsi) = match (bands, rsi) {
            (Ok(bands), Ok(rsi)) => (bands, rsi),
            (Err(e), _) | (_, Err(e)) => {
                return TradeSignal::hold(&data.symbol, format!("Indicators unavailable: {}", e))
            }
        };

        let price = closes[closes.len() - 1];

        if price < bands.lower && rsi < self.oversold && bands.lower > 0.0 {
            TradeSignal {
                symbol: data.symbol.clone(),
                action: TradeAction::Buy,
                strength: ((bands.lower - price) / bands.lower).clamp(0.0, 1.0),
                reason: format!(
                    "Price {:.4} below lower band {:.4}, RSI {:.2} < {:.2}",
                    price, bands.lower, rsi, self.oversold
                ),
            }
        } else if price > bands.upper && rsi > self.overbought && bands.upper > 0.0 {
            TradeSignal {
                symbol: data.symbol.clone(),
                action: TradeAction::Sell,
                strength: ((price - bands.upper) / bands.upper).clamp(0.0, 1.0),
                reason: format!(
                    "Price {:.4} above upper band {:.4}, RSI {:.2} > {:.2}",
                    price, bands.upper, rsi, self.overbought
                ),
            }
        } else {
            TradeSignal::hold(
                &data.symbol,
                format!(
                    "Neutral: price {:.4}, middle band {:.4}, RSI {:.2}",
                    price, bands.middle, rsi
                ),
            )
        }
    }

    fn parameters(&self) -> Vec<StrategyParameter> {
        vec![
            int_param("bollinger_period", "Bollinger period", self.bollinger_period, 5, 200),
            float_param("bollinger_std", "Band width in standard deviations", self.bollinger_std, 0.5, 5.0),
            int_param("rsi_period", "RSI period", self.rsi_period, 2, 50),
            float_param("rsi_overbought", "RSI overbought threshold", self.overbought, 50.0, 95.0),
            float_param("rsi_oversold", "RSI oversold threshold", self.oversold, 5.0, 50.0),
        ]
    }

    fn update_parameter(&mut self, name: &str, value: ParameterValue) -> TradingResult<()> {
        checked(&*self, name, &value)?;
        match (name, value) {
            ("bollinger_period", ParameterValue::Integer(v)) => self.bollinger_period = v as usize,
            ("bollinger_std", ParameterValue::Float(v)) => self.bollinger_std = v,
            ("rsi_period", ParameterValue::Integer(v)) => self.rsi_period = v as usize,
            ("rsi_overbought", ParameterValue::Float(v)) => self.overbought = v,
            ("rsi_oversold", ParameterValue::Float(v)) => self.oversold = v,
            _ => return Err(TradingError::Strategy(format!("Unknown parameter: {}", name))),
        }
        Ok(())
    }
}

/// Breakouts of an expanded Donchian channel with volume confirmation.
pub struct VolatilityBreakoutStrategy {
    name: String,
    description: String,
    period: usize,
    multiplier: f64,
    min_volume_ratio: f64,
}

impl VolatilityBreakoutStrategy {
    pub fn new() -> Self {
        Self {
            name: "Volatility Breakout".to_string(),
            description: "Follows closes that escape the expanded channel on heavy volume"
                .to_string(),
            period: 20,
            multiplier: 0.5,
            min_volume_ratio: 1.5,
        }
    }

    /// Channel over the `period` bars before the latest one.
    fn channel(&self, highs: &[f64], lows: &[f64]) -> (f64, f64) {
        let end = highs.len() - 1;
        let start = end - self.period;
        let highest = highs[start..end].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lowest = lows[start..end].iter().copied().fold(f64::INFINITY, f64::min);
        let expansion = (highest - lowest) * self.multiplier / 2.0;
        (highest + expansion, lowest - expansion)
    }
}

impl Default for VolatilityBreakoutStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TradingStrategy for VolatilityBreakoutStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::VolatilityBreakout
    }

    fn analyze(&self, data: &MarketData) -> TradeSignal {
        let needed = self.period + 1;
        if data.len() < needed {
            return insufficient(&data.symbol, needed, data.len());
        }

        let closes = data.close_prices();
        let volumes = data.volumes();
        let (upper, lower) = self.channel(&data.high_prices(), &data.low_prices());

        let n = closes.len();
        let (current, previous) = (closes[n - 1], closes[n - 2]);
        let volume = volumes[n - 1];
        let average_volume = volumes[n - 1 - self.period..n - 1].iter().sum::<f64>() / self.period as f64;
        let volume_confirmed = volume > average_volume * self.min_volume_ratio;

        if current > upper && previous <= upper && volume_confirmed && upper > 0.0 {
            TradeSignal {
                symbol: data.symbol.clone(),
                action: TradeAction::Buy,
                strength: ((current - upper) / upper).clamp(0.0, 1.0),
                reason: format!(
                    "Breakout above {:.4}: close {:.4}, volume {:.2} vs avg {:.2}",
                    upper, current, volume, average_volume
                ),
            }
        } else if current < lower && previous >= lower && volume_confirmed && lower > 0.0 {
            TradeSignal {
                symbol: data.symbol.clone(),
                action: TradeAction::Sell,
                strength: ((lower - current) / lower).clamp(0.0, 1.0),
                reason: format!(
                    "Breakdown below {:.4}: close {:.4}, volume {:.2} vs avg {:.2}",
                    lower, current, volume, average_volume
                ),
            }
        } else {
            TradeSignal::hold(
                &data.symbol,
                format!(
                    "No breakout: close {:.4} in [{:.4}, {:.4}], volume {:.2} vs avg {:.2}",
                    current, lower, upper, volume, average_volume
                ),
            )
        }
    }

    fn parameters(&self) -> Vec<StrategyParameter> {
        vec![
            int_param("period", "Channel period", self.period, 2, 200),
            float_param("multiplier", "Channel expansion", self.multiplier, 0.0, 5.0),
            float_param("min_volume_ratio", "Volume confirmation ratio", self.min_volume_ratio, 1.0, 10.0),
        ]
    }

    fn update_parameter(&mut self, name: &str, value: ParameterValue) -> TradingResult<()> {
        checked(&*self, name, &value)?;
        match (name, value) {
            ("period", ParameterValue::Integer(v)) => self.period = v as usize,
            ("multiplier", ParameterValue::Float(v)) => self.multiplier = v,
            ("min_volume_ratio", ParameterValue::Float(v)) => self.min_volume_ratio = v,
            _ => return Err(TradingError::Strategy(format!("Unknown parameter: {}", name))),
        }
        Ok(())
    }
}

/// One instance of every strategy, looked up by kind.
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, Box<dyn TradingStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        let mut strategies: HashMap<StrategyKind, Box<dyn TradingStrategy>> = HashMap::new();
        strategies.insert(StrategyKind::MarketMaking, Box::new(MarketMakingStrategy::new()));
        strategies.insert(StrategyKind::Momentum, Box::new(MomentumStrategy::new()));
        strategies.insert(StrategyKind::MeanReversion, Box::new(MeanReversionStrategy::new()));
        strategies.insert(
            StrategyKind::VolatilityBreakout,
            Box::new(VolatilityBreakoutStrategy::new()),
        );
        Self { strategies }
    }

    pub fn get(&self, kind: StrategyKind) -> Option<&dyn TradingStrategy> {
        self.strategies.get(&kind).map(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, kind: StrategyKind) -> Option<&mut Box<dyn TradingStrategy>> {
        self.strategies.get_mut(&kind)
    }

    /// Run the strategy of `kind`; unknown kinds hold.
    pub fn analyze(&self, kind: StrategyKind, data: &MarketData) -> TradeSignal {
        match self.get(kind) {
            Some(strategy) => strategy.analyze(data),
            None => TradeSignal::hold(&data.symbol, format!("No strategy registered for {}", kind)),
        }
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

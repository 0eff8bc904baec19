// src/domain/models.rs
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market Data Structures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// OHLCV series for one symbol, oldest bar first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub timestamp: i64,
    pub candles: Vec<Candle>,
}

impl MarketData {
    pub fn new(symbol: &str, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn close_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.close.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn high_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.high.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn low_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.low.to_f64().unwrap_or_default())
            .collect()
    }

    /// Bar mid prices, `(high + low) / 2`.
    pub fn mid_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| ((c.high + c.low) / Decimal::from(2)).to_f64().unwrap_or_default())
            .collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.volume.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn last_close(&self) -> Option<Decimal> {
        self.candles.last().map(|c| c.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    /// Two-sided quoting around the mid price.
    PlaceOrders,
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::PlaceOrders => "PLACE_ORDERS",
            TradeAction::Hold => "HOLD",
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, TradeAction::Hold)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a strategy's analysis for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub action: TradeAction,
    pub strength: f64,
    pub reason: String,
}

impl TradeSignal {
    pub fn hold(symbol: &str, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: TradeAction::Hold,
            strength: 0.5,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Order handed to the exchange gateway for a strategy signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: Decimal,
    pub price: Decimal,
    pub strategy: String,
    pub timestamp: i64,
}

/// Inbound position event from the exchange layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub entry_price: f64,
    /// Latest mark price; the entry price is used when absent.
    pub mark_price: Option<f64>,
    pub unrealized_pnl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> Candle {
        Candle {
            open_time: 0,
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn test_series_accessors() {
        let data = MarketData::new(
            "BTCUSDT",
            vec![
                candle(dec!(11), dec!(9), dec!(10), dec!(100)),
                candle(dec!(13), dec!(11), dec!(12), dec!(50)),
            ],
        );

        assert_eq!(data.close_prices(), vec![10.0, 12.0]);
        assert_eq!(data.mid_prices(), vec![10.0, 12.0]);
        assert_eq!(data.volumes(), vec![100.0, 50.0]);
        assert_eq!(data.last_close(), Some(dec!(12)));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_hold_signal_is_not_actionable() {
        let signal = TradeSignal::hold("ETHUSDT", "Insufficient market data");
        assert!(!signal.action.is_actionable());
        assert!(TradeAction::PlaceOrders.is_actionable());
        assert_eq!(TradeAction::PlaceOrders.to_string(), "PLACE_ORDERS");
    }
}

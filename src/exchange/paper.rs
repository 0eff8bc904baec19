// src/exchange/paper.rs
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::{Candle, MarketData, Order};
use crate::exchange::client::MarketGateway;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

const KLINE_LIMIT: usize = 100;
const BAR_MILLIS: i64 = 5 * 60 * 1000;

// Symbol, reference price, reference volume
const UNIVERSE: [(&str, f64, f64); 6] = [
    ("BTCUSDT", 60_000.0, 120.0),
    ("ETHUSDT", 3_000.0, 900.0),
    ("SOLUSDT", 150.0, 15_000.0),
    ("XRPUSDT", 0.6, 2_000_000.0),
    ("ADAUSDT", 0.45, 1_500_000.0),
    ("DOGEUSDT", 0.15, 8_000_000.0),
];

/// Deterministic in-process exchange that synthesizes candles and records
/// orders instead of sending them anywhere.
#[derive(Debug, Default)]
pub struct PaperExchange {
    tick: Mutex<u64>,
    orders: Mutex<Vec<Order>>,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the synthetic clock forward by one bar.
    pub fn advance(&self) {
        *self.tick.lock() += 1;
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().clone()
    }

    fn candles(&self, index: usize, price: f64, volume: f64) -> ExchangeResult<Vec<Candle>> {
        let tick = *self.tick.lock() as f64;
        let phase = index as f64 * 1.3;
        let start = chrono::Utc::now().timestamp_millis() - KLINE_LIMIT as i64 * BAR_MILLIS;

        (0..KLINE_LIMIT)
            .map(|bar| {
                let t = bar as f64 + tick;
                let drift = 1.0 + 0.0004 * t * (index as f64 - 2.5).signum();
                let wave = 1.0 + 0.02 * (t / 7.0 + phase).sin() + 0.004 * (t * 1.7 + phase).cos();
                let close = price * drift * wave;
                let open = price * drift * (1.0 + 0.02 * ((t - 1.0) / 7.0 + phase).sin());
                let high = close.max(open) * 1.002;
                let low = close.min(open) * 0.998;
                let vol = volume * (1.0 + 0.5 * (t / 5.0 + phase).sin().abs());

                Ok(Candle {
                    open_time: start + bar as i64 * BAR_MILLIS,
                    open: to_decimal(open)?,
                    high: to_decimal(high)?,
                    low: to_decimal(low)?,
                    close: to_decimal(close)?,
                    volume: to_decimal(vol)?,
                })
            })
            .collect()
    }
}

fn to_decimal(value: f64) -> ExchangeResult<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(8))
        .ok_or_else(|| ExchangeError::Transient(format!("unrepresentable price {}", value)))
}

#[async_trait]
impl MarketGateway for PaperExchange {
    /// Each universe refresh starts a new bar.
    async fn fetch_top_symbols(&self, limit: usize) -> ExchangeResult<Vec<String>> {
        self.advance();
        Ok(UNIVERSE
            .iter()
            .take(limit)
            .map(|(symbol, _, _)| symbol.to_string())
            .collect())
    }

    async fn fetch_market_data(&self, symbol: &str) -> ExchangeResult<MarketData> {
        let (index, (_, price, volume)) = UNIVERSE
            .iter()
            .enumerate()
            .find(|(_, (s, _, _))| *s == symbol)
            .ok_or_else(|| ExchangeError::InvalidSymbol(symbol.to_string()))?;

        let candles = self.candles(index, *price, *volume)?;
        Ok(MarketData::new(symbol, candles))
    }

    async fn execute_signal(&self, order: &Order) -> ExchangeResult<()> {
        if order.quantity <= Decimal::ZERO {
            return Err(ExchangeError::Order(format!(
                "invalid quantity {} for {}",
                order.quantity, order.symbol
            )));
        }

        log::info!(
            "Paper order filled: {} {} {} @ {} ({})",
            order.action,
            order.quantity,
            order.symbol,
            order.price,
            order.strategy
        );
        self.orders.lock().push(order.clone());
        Ok(())
    }
}

// src/exchange/client.rs
use crate::domain::errors::ExchangeResult;
use crate::domain::models::{MarketData, Order};
use async_trait::async_trait;

/// Exchange operations the trading cycle depends on
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Most actively traded symbols, at most `limit` of them
    async fn fetch_top_symbols(&self, limit: usize) -> ExchangeResult<Vec<String>>;

    /// Recent OHLCV series for a symbol, oldest bar first
    async fn fetch_market_data(&self, symbol: &str) -> ExchangeResult<MarketData>;

    /// Place the order backing a strategy signal
    async fn execute_signal(&self, order: &Order) -> ExchangeResult<()>;
}

// src/domain/mod.rs
pub mod errors;
pub mod models;

// Re-export common types for convenience
pub use errors::{
    AnalysisError, AnalysisResult, AppError, AppResult, CircuitBreakerError, ExchangeError,
    ExchangeResult, TradingError, TradingResult,
};
pub use models::{
    Candle, MarketData, Order, OrderSide, PositionUpdate, TradeAction, TradeSignal,
};

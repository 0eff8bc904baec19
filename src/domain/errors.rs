// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Trading error: {0}")]
    Trading(#[from] TradingError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Circuit breaker is open: {0}")]
    CircuitOpen(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Override command rejected: {0}")]
    CommandRejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CircuitBreakerError<ExchangeError>> for AppError {
    fn from(err: CircuitBreakerError<ExchangeError>) -> Self {
        match err {
            CircuitBreakerError::Open { name } => AppError::CircuitOpen(name),
            CircuitBreakerError::Operation(e) => AppError::Exchange(e),
        }
    }
}

impl From<CircuitBreakerError<TradingError>> for AppError {
    fn from(err: CircuitBreakerError<TradingError>) -> Self {
        match err {
            CircuitBreakerError::Open { name } => AppError::CircuitOpen(name),
            CircuitBreakerError::Operation(e) => AppError::Trading(e),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    /// Network or API failure; retried on the next tick.
    #[error("Transient exchange failure: {0}")]
    Transient(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Order error: {0}")]
    Order(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingError {
    #[error("Strategy error: {0}")]
    Strategy(String),

    #[error("Risk limit exceeded: {0}")]
    RiskLimitExceeded(String),

    #[error("Allocation error: {0}")]
    Allocation(String),

    #[error("Trade log error: {0}")]
    TradeLog(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Indicator calculation error: {0}")]
    IndicatorCalculation(String),

    #[error("Insufficient data for analysis: {0}")]
    InsufficientData(String),
}

/// Outcome of a call routed through a circuit breaker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CircuitBreakerError<E> {
    /// Fast-fail; the wrapped operation was not invoked.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    #[error("{0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type ExchangeResult<T> = Result<T, ExchangeError>;
pub type TradingResult<T> = Result<T, TradingError>;
pub type AnalysisResult<T> = Result<T, AnalysisError>;

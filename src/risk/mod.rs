pub mod circuit_breaker;
pub mod manager;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use manager::{PositionRisk, RiskAction, RiskManager, RiskMetrics};

pub mod allocation;
pub mod performance;

pub use allocation::{AllocationEngine, AllocationTarget};
pub use performance::{PerformanceMetrics, PerformanceTracker, TradeLogEntry};

pub mod strategies;
pub mod weights;

pub use strategies::{StrategyRegistry, TradingStrategy};
pub use weights::{calculate_weights, StrategyKind, StrategySelector, StrategyWeights};

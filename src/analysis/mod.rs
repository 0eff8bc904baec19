pub mod correlation;
pub mod indicators;
pub mod regime;

pub use correlation::{CorrelationMatrix, CorrelationTracker};
pub use indicators::{CombinedSignal, IndicatorSnapshot, VolumeWeightedSignal};
pub use regime::{
    MarketRegime, RegimeClassifier, RegimeSnapshot, TrendRegime, VolatilityRegime, VolumeRegime,
};

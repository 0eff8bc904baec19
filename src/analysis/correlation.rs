// src/analysis/correlation.rs
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

/// Closing prices kept per symbol.
pub const MAX_HISTORY: usize = 100;

pub type CorrelationMatrix = HashMap<String, HashMap<String, f64>>;

/// Rolling close history per symbol and the pairwise correlation matrix
/// derived from it.
///
/// The matrix is rebuilt from scratch on every [`calculate_correlations`]
/// call, O(n²) in the number of symbols over at most [`MAX_HISTORY`] points.
/// Fine for a handful of symbols, not for a large universe.
///
/// [`calculate_correlations`]: CorrelationTracker::calculate_correlations
#[derive(Debug, Clone, Default)]
pub struct CorrelationTracker {
    history: HashMap<String, VecDeque<f64>>,
    matrix: CorrelationMatrix,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored history of `symbol` with the latest closes.
    pub fn record_prices(&mut self, symbol: &str, closes: &[f64]) {
        let start = closes.len().saturating_sub(MAX_HISTORY);
        let history: VecDeque<f64> = closes[start..].iter().copied().collect();
        self.history.insert(symbol.to_string(), history);
    }

    /// Forget every symbol that is not part of `universe`.
    pub fn retain_symbols(&mut self, universe: &[String]) {
        let keep: HashSet<&str> = universe.iter().map(String::as_str).collect();
        self.history.retain(|symbol, _| keep.contains(symbol.as_str()));
        self.matrix.retain(|symbol, _| keep.contains(symbol.as_str()));
        for row in self.matrix.values_mut() {
            row.retain(|symbol, _| keep.contains(symbol.as_str()));
        }
    }

    pub fn history(&self, symbol: &str) -> Option<&VecDeque<f64>> {
        self.history.get(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.history.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn matrix(&self) -> &CorrelationMatrix {
        &self.matrix
    }

    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        self.matrix.get(a).and_then(|row| row.get(b)).copied()
    }

    /// Rebuild the symmetric matrix from the current histories.
    pub fn calculate_correlations(&mut self) -> &CorrelationMatrix {
        let symbols = self.symbols();
        let mut matrix: CorrelationMatrix = HashMap::with_capacity(symbols.len());

        for (i, a) in symbols.iter().enumerate() {
            matrix.entry(a.clone()).or_default().insert(a.clone(), 1.0);

            for b in &symbols[i + 1..] {
                let corr = match (self.history.get(a), self.history.get(b)) {
                    (Some(xs), Some(ys)) => pearson_suffix(xs, ys),
                    _ => 0.0,
                };
                matrix.entry(a.clone()).or_default().insert(b.clone(), corr);
                matrix.entry(b.clone()).or_default().insert(a.clone(), corr);
            }
        }

        log::debug!("Correlation matrix rebuilt for {} symbols", symbols.len());
        self.matrix = matrix;
        &self.matrix
    }

    /// Other symbols whose |correlation| with `symbol` is at least
    /// `threshold`, strongest first.
    pub fn get_highly_correlated_assets(&self, symbol: &str, threshold: f64) -> Vec<(String, f64)> {
        let Some(row) = self.matrix.get(symbol) else {
            return Vec::new();
        };

        let mut assets: Vec<(String, f64)> = row
            .iter()
            .filter(|(other, corr)| other.as_str() != symbol && corr.abs() >= threshold)
            .map(|(other, corr)| (other.clone(), *corr))
            .collect();

        assets.sort_by(|(name_a, a), (name_b, b)| {
            b.abs()
                .partial_cmp(&a.abs())
                .unwrap_or(Ordering::Equal)
                .then_with(|| name_a.cmp(name_b))
        });
        assets
    }

    /// `1 - mean(|corr|)` over all unordered pairs of `symbols`. A pair
    /// missing from the matrix counts as uncorrelated.
    pub fn get_diversification_score(&self, symbols: &[String]) -> f64 {
        if symbols.len() < 2 || self.matrix.is_empty() {
            return 1.0;
        }

        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, a) in symbols.iter().enumerate() {
            for b in &symbols[i + 1..] {
                total += self.correlation(a, b).unwrap_or(0.0).abs();
                pairs += 1;
            }
        }

        (1.0 - total / pairs as f64).clamp(0.0, 1.0)
    }
}

/// Pearson correlation over the overlapping (most recent) suffix.
fn pearson_suffix(xs: &VecDeque<f64>, ys: &VecDeque<f64>) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }

    let x: Vec<f64> = xs.iter().skip(xs.len() - n).copied().collect();
    let y: Vec<f64> = ys.iter().skip(ys.len() - n).copied().collect();
    pearson(&x, &y)
}

pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> CorrelationTracker {
        let mut tracker = CorrelationTracker::new();
        let up: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let down: Vec<f64> = (0..30).map(|i| 50.0 - i as f64 * 0.5).collect();
        let noisy: Vec<f64> = (0..20)
            .map(|i| (if i % 2 == 0 { 10.0 } else { 11.0 }) + i as f64 * 0.01)
            .collect();
        tracker.record_prices("BTCUSDT", &up);
        tracker.record_prices("ETHUSDT", &down);
        tracker.record_prices("DOGEUSDT", &noisy);
        tracker.calculate_correlations();
        tracker
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let tracker = tracker();
        let symbols = tracker.symbols();

        for a in &symbols {
            assert_eq!(tracker.correlation(a, a), Some(1.0));
            for b in &symbols {
                let ab = tracker.correlation(a, b).unwrap();
                let ba = tracker.correlation(b, a).unwrap();
                assert_eq!(ab, ba);
                assert!((-1.0..=1.0).contains(&ab));
            }
        }
        assert!((tracker.correlation("BTCUSDT", "ETHUSDT").unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_is_capped() {
        let mut tracker = CorrelationTracker::new();
        let closes: Vec<f64> = (0..150).map(|i| i as f64).collect();
        tracker.record_prices("BTCUSDT", &closes);
        let history = tracker.history("BTCUSDT").unwrap();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history.front(), Some(&50.0));
        assert_eq!(history.back(), Some(&149.0));
    }

    #[test]
    fn test_short_overlap_is_zero() {
        let mut tracker = CorrelationTracker::new();
        tracker.record_prices("A", &[1.0]);
        tracker.record_prices("B", &[1.0, 2.0, 3.0]);
        tracker.record_prices("C", &[5.0, 5.0, 5.0]);
        tracker.calculate_correlations();
        assert_eq!(tracker.correlation("A", "B"), Some(0.0));
        // Zero variance
        assert_eq!(tracker.correlation("B", "C"), Some(0.0));
    }

    #[test]
    fn test_highly_correlated_assets_sorted() {
        let tracker = tracker();
        let assets = tracker.get_highly_correlated_assets("BTCUSDT", 0.5);
        assert!(!assets.is_empty());
        assert_eq!(assets[0].0, "ETHUSDT");
        assert!(assets.iter().all(|(name, _)| name != "BTCUSDT"));
        for pair in assets.windows(2) {
            assert!(pair[0].1.abs() >= pair[1].1.abs());
        }
        assert!(tracker.get_highly_correlated_assets("UNKNOWN", 0.0).is_empty());
    }

    #[test]
    fn test_diversification_score_bounds() {
        let tracker = tracker();
        let all = tracker.symbols();
        let score = tracker.get_diversification_score(&all);
        assert!((0.0..=1.0).contains(&score));

        assert_eq!(tracker.get_diversification_score(&["BTCUSDT".to_string()]), 1.0);
        assert_eq!(tracker.get_diversification_score(&[]), 1.0);

        let perfectly_anti = tracker
            .get_diversification_score(&["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
        assert!(perfectly_anti.abs() < 1e-9);

        let empty = CorrelationTracker::new();
        assert_eq!(
            empty.get_diversification_score(&["X".to_string(), "Y".to_string()]),
            1.0
        );
    }

    #[test]
    fn test_pairs_missing_from_matrix_count_as_uncorrelated() {
        let mut tracker = CorrelationTracker::new();
        let rising: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        tracker.record_prices("A", &rising);
        tracker.record_prices("B", &rising);
        tracker.calculate_correlations();

        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        // (A,B) = 1, (A,C) and (B,C) absent
        let score = tracker.get_diversification_score(&symbols);
        assert!((score - (1.0 - 1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_retain_symbols_drops_stale_state() {
        let mut tracker = tracker();
        tracker.retain_symbols(&["BTCUSDT".to_string(), "DOGEUSDT".to_string()]);
        assert!(tracker.history("ETHUSDT").is_none());
        assert!(tracker.correlation("ETHUSDT", "BTCUSDT").is_none());
        assert!(tracker.correlation("BTCUSDT", "ETHUSDT").is_none());
        assert_eq!(tracker.symbols(), vec!["BTCUSDT", "DOGEUSDT"]);
    }
}

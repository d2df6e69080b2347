//! Per-generation population statistics.

use serde::{Deserialize, Serialize};

/// Fitness distribution of one evaluated generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneticStats {
    /// Number of candidates with a usable fitness.
    pub population: usize,
    pub maximum: f64,
    pub minimum: f64,
    pub mean: f64,
    pub stdev: f64,
}

impl GeneticStats {
    /// Aggregate finite fitness values; an empty slice yields a zeroed record.
    pub fn from_fitnesses(fitnesses: &[f64]) -> Self {
        let finite: Vec<f64> = fitnesses.iter().copied().filter(|f| f.is_finite()).collect();
        if finite.is_empty() {
            return Self {
                population: 0,
                maximum: 0.0,
                minimum: 0.0,
                mean: 0.0,
                stdev: 0.0,
            };
        }
        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let variance = finite.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n;
        let maximum = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let minimum = finite.iter().copied().fold(f64::INFINITY, f64::min);
        Self {
            population: finite.len(),
            maximum,
            minimum,
            mean,
            stdev: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_basic_distribution() {
        let stats = GeneticStats::from_fitnesses(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.population, 4);
        assert_eq!(stats.maximum, 4.0);
        assert_eq!(stats.minimum, 1.0);
        assert!((stats.mean - 2.5).abs() < 1e-12);
        assert!((stats.stdev - 1.118_033_988_749_895).abs() < 1e-9);
    }

    #[test]
    fn ignores_non_finite_values() {
        let stats = GeneticStats::from_fitnesses(&[1.0, f64::NAN, f64::INFINITY, 3.0]);
        assert_eq!(stats.population, 2);
        assert_eq!(stats.maximum, 3.0);
        assert_eq!(stats.minimum, 1.0);
    }

    #[test]
    fn empty_generation_is_zeroed() {
        let stats = GeneticStats::from_fitnesses(&[]);
        assert_eq!(stats.population, 0);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.stdev, 0.0);
    }
}

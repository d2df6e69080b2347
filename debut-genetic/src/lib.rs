//! Debut Genetic — parameter search over strategy configurations.
//!
//! This crate builds on `debut-core` to provide:
//! - Genome operations over the schema-constrained search space
//! - Population sampling, elitist selection and tournament breeding
//! - Walk-forward window planning (rolling and anchored)
//! - Island topology with periodic ring migration
//! - The generation loop with capped parallel evaluation and error-tolerant
//!   scoring
//! - Deterministic BLAKE3 seed hierarchy, reproducible across thread counts

pub mod genome;
pub mod islands;
pub mod optimizer;
pub mod population;
pub mod seeds;
pub mod stats;
pub mod walk_forward;

pub use genome::{apply_genome, crossover, mutate, sample_genome, Genome, GenomeError};
pub use islands::{migrate, partition};
pub use optimizer::{
    optimize, GeneticOptimizer, GeneticProgress, GenerationReport, OptimizerConfig,
    OptimizerError, OptimizerReport, Topology,
};
pub use population::{BreedConfig, Individual, Population, ValidateFn};
pub use seeds::SeedHierarchy;
pub use stats::GeneticStats;
pub use walk_forward::{build_windows, WalkForwardError, WalkForwardMode, WindowSpec};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<OptimizerConfig>();
        assert_sync::<OptimizerConfig>();
        assert_send::<Topology>();
        assert_sync::<Topology>();
        assert_send::<WalkForwardMode>();
        assert_sync::<WalkForwardMode>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<Individual>();
        assert_sync::<Individual>();
        assert_send::<Population>();
        assert_sync::<Population>();
        assert_send::<GeneticStats>();
        assert_sync::<GeneticStats>();
        assert_send::<GenerationReport>();
        assert_sync::<GenerationReport>();
        assert_send::<OptimizerReport>();
        assert_sync::<OptimizerReport>();
        assert_send::<GeneticProgress>();
        assert_sync::<GeneticProgress>();
    }

    #[test]
    fn seed_hierarchy_is_send_sync() {
        assert_send::<SeedHierarchy>();
        assert_sync::<SeedHierarchy>();
    }
}

//! Strategy factory contract — the seam the genetic optimizer drives.
//!
//! A strategy is described by its parameter schema, a configuration
//! validator, a score function, a stats function and an instance factory.
//! The optimizer calls `create` + `learn` once per candidate per window and
//! ranks candidates by `score`.

use crate::domain::{StrategyOptions, WorkingEnv};
use crate::runtime::{CoreError, StrategyRuntime};
use crate::schema::GeneticSchema;
use crate::transport::Transport;

pub trait StrategyMeta<T: Transport>: Send + Sync {
    /// Descriptors for every optimizable options field.
    fn schema(&self) -> GeneticSchema;

    /// Validate (and possibly repair) a candidate configuration. `None`
    /// rejects the candidate before any runtime is built.
    fn validate(&self, options: StrategyOptions) -> Option<StrategyOptions>;

    /// Scalar fitness of a finished run; higher is better.
    fn score(&self, runtime: &StrategyRuntime<T>) -> f64;

    /// Arbitrary run statistics, reported alongside the score.
    fn stats(&self, runtime: &StrategyRuntime<T>) -> serde_json::Value;

    /// Walk-forward gate: whether forward-window statistics are acceptable.
    /// The default accepts everything.
    fn validate_forward_stats(&self, _stats: &serde_json::Value) -> bool {
        true
    }

    /// Build a runtime instance for one evaluation. Implementations register
    /// their plugins here.
    fn create(
        &self,
        transport: T,
        options: StrategyOptions,
        env: WorkingEnv,
    ) -> Result<StrategyRuntime<T>, CoreError>;
}

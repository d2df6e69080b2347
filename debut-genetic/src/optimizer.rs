//! Genetic optimizer — the generation loop driving strategy runtimes as the
//! fitness function.
//!
//! Each generation evaluates every candidate by building a `StrategyRuntime`
//! over the generation's training window and awaiting `learn`. Evaluations
//! fan out on a rayon pool capped at `max_threads`; excess candidates queue
//! on the pool rather than spawning unbounded workers. A candidate whose run
//! errors is scored unfit and the generation continues — one broken
//! configuration never crashes the search.

use crate::islands::{migrate, partition};
use crate::population::{BreedConfig, Individual, Population};
use crate::seeds::SeedHierarchy;
use crate::stats::GeneticStats;
use crate::walk_forward::{build_windows, WalkForwardError, WalkForwardMode};
use debut_core::schema::{validate_schema, GeneticSchema};
use debut_core::{
    BacktestTransport, Candle, Instrument, StrategyMeta, StrategyOptions, WorkingEnv,
};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Population topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Topology {
    /// One population, no migration.
    Classic,
    /// Isolated subpopulations with periodic ring migration.
    Islands {
        islands: usize,
        /// Migrate every this many generations.
        migration_interval: usize,
        /// Individuals moved per island per migration.
        migrants: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub generations: usize,
    pub population_size: usize,
    /// Training window length in days.
    pub days: u32,
    /// Forward window length in days (walk-forward only).
    pub gap_days: u32,
    /// How many top candidates the final report keeps.
    pub best: usize,
    pub mutation_rate: f64,
    /// Span fraction a numeric mutation may move a gene by.
    pub mutation_jitter: f64,
    pub crossover_rate: f64,
    /// Top candidates carried unchanged into the next generation.
    pub elitism: usize,
    /// Fitness-weighted parent gene choice instead of uniform.
    pub weighted_crossover: bool,
    /// Concurrent evaluation ceiling.
    pub max_threads: usize,
    pub seed: u64,
    pub wfo: Option<WalkForwardMode>,
    pub topology: Topology,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            generations: 12,
            population_size: 24,
            days: 30,
            gap_days: 10,
            best: 3,
            mutation_rate: 0.1,
            mutation_jitter: 0.15,
            crossover_rate: 0.9,
            elitism: 2,
            weighted_crossover: true,
            max_threads: 4,
            seed: 42,
            wfo: None,
            topology: Topology::Classic,
        }
    }
}

impl OptimizerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.generations == 0 {
            return Err("generations must be at least 1".into());
        }
        if self.population_size < 2 {
            return Err("population_size must be at least 2".into());
        }
        if self.best == 0 || self.best > self.population_size {
            return Err(format!(
                "best must be in 1..={}, got {}",
                self.population_size, self.best
            ));
        }
        if self.elitism > self.population_size {
            return Err("elitism cannot exceed population_size".into());
        }
        if self.max_threads == 0 {
            return Err("max_threads must be at least 1".into());
        }
        for (name, rate) in [
            ("mutation_rate", self.mutation_rate),
            ("crossover_rate", self.crossover_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(format!("{name} must be in [0, 1], got {rate}"));
            }
        }
        if let Topology::Islands {
            islands,
            migration_interval,
            migrants,
        } = self.topology
        {
            if islands < 2 {
                return Err("island topology needs at least 2 islands".into());
            }
            if migration_interval == 0 {
                return Err("migration_interval must be at least 1".into());
            }
            let smallest = self.population_size / islands;
            if smallest < 2 {
                return Err(format!(
                    "population_size {} is too small for {islands} islands",
                    self.population_size
                ));
            }
            if migrants >= smallest {
                return Err(format!(
                    "migrants {migrants} must be below the island size {smallest}"
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("schema validation failed: {}", .0.join("; "))]
    Schema(Vec<String>),
    #[error("invalid optimizer config: {0}")]
    Config(String),
    #[error(transparent)]
    WalkForward(#[from] WalkForwardError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Progress update emitted after every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticProgress {
    pub generation: usize,
    pub generations: usize,
    pub evaluated: usize,
    pub errors: usize,
    pub best_fitness: Option<f64>,
    pub elapsed_secs: f64,
}

/// Outcome of one generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub generation: usize,
    pub stats: GeneticStats,
    /// Candidates evaluated this generation.
    pub evaluated: usize,
    /// Candidates discarded by the walk-forward gate.
    pub discarded_forward: usize,
    /// Evaluation errors, preserved verbatim.
    pub errors: Vec<String>,
}

/// Final optimizer output: the top candidates and per-generation reports.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizerReport {
    pub best: Vec<Individual>,
    pub generations: Vec<GenerationReport>,
}

impl OptimizerReport {
    pub fn best_fitness(&self) -> Option<f64> {
        self.best.first().and_then(|i| i.fitness)
    }
}

/// The search engine. Holds the shared read-only history buffer; every
/// candidate evaluation narrows it with an index window, never copies it.
pub struct GeneticOptimizer<'a, M> {
    meta: &'a M,
    config: OptimizerConfig,
    base_options: StrategyOptions,
    instrument: Instrument,
    history: Arc<[Candle]>,
    schema: GeneticSchema,
    seeds: SeedHierarchy,
}

impl<'a, M: StrategyMeta<BacktestTransport>> GeneticOptimizer<'a, M> {
    pub fn new(
        meta: &'a M,
        config: OptimizerConfig,
        base_options: StrategyOptions,
        instrument: Instrument,
        history: Arc<[Candle]>,
    ) -> Result<Self, OptimizerError> {
        config.validate().map_err(OptimizerError::Config)?;
        base_options
            .validate()
            .map_err(|e| OptimizerError::Config(e.to_string()))?;

        let schema = meta.schema();
        let validation = validate_schema(&schema, &base_options);
        if !validation.is_valid {
            return Err(OptimizerError::Schema(validation.errors));
        }

        let seeds = SeedHierarchy::new(config.seed);
        Ok(Self {
            meta,
            config,
            base_options,
            instrument,
            history,
            schema,
            seeds,
        })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run the full search. The progress callback fires once per generation.
    pub fn run(
        &self,
        progress: Option<&dyn Fn(&GeneticProgress)>,
    ) -> Result<OptimizerReport, OptimizerError> {
        let windows = build_windows(
            &self.history,
            self.config.wfo,
            self.config.generations,
            self.config.days,
            self.config.gap_days,
        )?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.max_threads)
            .build()
            .map_err(|e| OptimizerError::ThreadPool(e.to_string()))?;
        let started = Instant::now();

        let validate = |options: StrategyOptions| self.meta.validate(options);

        let island_count = match self.config.topology {
            Topology::Classic => 1,
            Topology::Islands { islands, .. } => islands,
        };
        let mut islands: Vec<Population> = partition(self.config.population_size, island_count)
            .into_iter()
            .enumerate()
            .map(|(island, size)| {
                let mut rng = self.seeds.rng_for("init", island as u64, 0);
                Population::sample(size, &self.schema, &self.base_options, &validate, &mut rng)
            })
            .collect();

        let mut reports = Vec::with_capacity(self.config.generations);
        let mut total_errors = 0usize;

        for generation in 0..self.config.generations {
            let window = &windows[generation];
            let mut errors = Vec::new();
            let mut discarded_forward = 0usize;

            for island in islands.iter_mut() {
                errors.extend(self.evaluate_population(&pool, island, &window.train));
            }

            if self.config.wfo.is_some() && !window.forward.is_empty() {
                for island in islands.iter_mut() {
                    let (forward_errors, discarded) =
                        self.forward_gate(&pool, island, &window.forward);
                    errors.extend(forward_errors);
                    discarded_forward += discarded;
                }
            }

            let fitnesses: Vec<f64> = islands
                .iter()
                .flat_map(|island| island.individuals.iter().filter_map(|i| i.fitness))
                .collect();
            let stats = GeneticStats::from_fitnesses(&fitnesses);
            let evaluated: usize = islands.iter().map(Population::len).sum();
            total_errors += errors.len();

            if let Some(callback) = progress {
                callback(&GeneticProgress {
                    generation,
                    generations: self.config.generations,
                    evaluated,
                    errors: total_errors,
                    best_fitness: islands.iter().filter_map(Population::best_fitness).fold(
                        None,
                        |acc, f| Some(acc.map_or(f, |a: f64| a.max(f))),
                    ),
                    elapsed_secs: started.elapsed().as_secs_f64(),
                });
            }

            reports.push(GenerationReport {
                generation,
                stats,
                evaluated,
                discarded_forward,
                errors,
            });

            if generation + 1 < self.config.generations {
                for island in islands.iter_mut() {
                    island.sort_by_fitness();
                }
                if let Topology::Islands {
                    migration_interval,
                    migrants,
                    ..
                } = self.config.topology
                {
                    if (generation + 1) % migration_interval == 0 {
                        migrate(&mut islands, migrants);
                        for island in islands.iter_mut() {
                            island.sort_by_fitness();
                        }
                    }
                }
                for (island_idx, island) in islands.iter_mut().enumerate() {
                    let cfg = BreedConfig {
                        size: island.len(),
                        elitism: self.config.elitism.min(island.len()),
                        crossover_rate: self.config.crossover_rate,
                        mutation_rate: self.config.mutation_rate,
                        mutation_jitter: self.config.mutation_jitter,
                        weighted_crossover: self.config.weighted_crossover,
                    };
                    let mut rng = self
                        .seeds
                        .rng_for("breed", island_idx as u64, generation as u64 + 1);
                    *island = island.breed(&cfg, &self.schema, &self.base_options, &validate, &mut rng);
                }
            }
        }

        let mut merged = Population {
            individuals: islands
                .into_iter()
                .flat_map(|island| island.individuals)
                .collect(),
        };
        merged.sort_by_fitness();
        let best: Vec<Individual> = merged
            .individuals
            .into_iter()
            .filter(|i| i.fitness.is_some())
            .take(self.config.best)
            .collect();

        Ok(OptimizerReport {
            best,
            generations: reports,
        })
    }

    /// In-sample evaluation of a whole (sub)population on the worker pool.
    /// Returns the evaluation errors; failed candidates stay unfit.
    fn evaluate_population(
        &self,
        pool: &ThreadPool,
        population: &mut Population,
        window: &Range<usize>,
    ) -> Vec<String> {
        let days = self.window_days(window);
        let results: Vec<Result<(f64, serde_json::Value), String>> = pool.install(|| {
            population
                .individuals
                .par_iter()
                .map(|individual| self.evaluate_one(&individual.options, window.clone(), days))
                .collect()
        });

        let mut errors = Vec::new();
        for (individual, result) in population.individuals.iter_mut().zip(results) {
            individual.forward_fitness = None;
            match result {
                Ok((fitness, stats)) => {
                    individual.fitness = fitness.is_finite().then_some(fitness);
                    individual.stats = Some(stats);
                }
                Err(message) => {
                    individual.fitness = None;
                    individual.stats = None;
                    errors.push(message);
                }
            }
        }
        errors
    }

    /// Forward-window re-evaluation. Candidates failing the strategy's
    /// forward validation predicate (or erroring) are discarded.
    fn forward_gate(
        &self,
        pool: &ThreadPool,
        population: &mut Population,
        window: &Range<usize>,
    ) -> (Vec<String>, usize) {
        let days = self.window_days(window);
        let survivors: Vec<usize> = population
            .individuals
            .iter()
            .enumerate()
            .filter(|(_, i)| i.fitness.is_some())
            .map(|(idx, _)| idx)
            .collect();

        let results: Vec<(usize, Result<(f64, serde_json::Value), String>)> = pool.install(|| {
            survivors
                .par_iter()
                .map(|&idx| {
                    let options = &population.individuals[idx].options;
                    (idx, self.evaluate_one(options, window.clone(), days))
                })
                .collect()
        });

        let mut errors = Vec::new();
        let mut discarded = 0usize;
        for (idx, result) in results {
            let individual = &mut population.individuals[idx];
            match result {
                Ok((forward_fitness, forward_stats)) => {
                    let passes = forward_fitness.is_finite()
                        && self.meta.validate_forward_stats(&forward_stats);
                    if passes {
                        individual.forward_fitness = Some(forward_fitness);
                    } else {
                        individual.fitness = None;
                        individual.forward_fitness = None;
                        discarded += 1;
                    }
                }
                Err(message) => {
                    individual.fitness = None;
                    individual.forward_fitness = None;
                    discarded += 1;
                    errors.push(message);
                }
            }
        }
        (errors, discarded)
    }

    /// One full fitness evaluation: runtime over the window, `learn`, score.
    fn evaluate_one(
        &self,
        options: &StrategyOptions,
        window: Range<usize>,
        days: u32,
    ) -> Result<(f64, serde_json::Value), String> {
        let transport =
            BacktestTransport::new(self.instrument.clone(), Arc::clone(&self.history))
                .with_window(window);
        let mut runtime = self
            .meta
            .create(transport, options.clone(), WorkingEnv::Genetic)
            .map_err(|e| e.to_string())?;
        runtime.learn(days).map_err(|e| e.to_string())?;
        let fitness = self.meta.score(&runtime);
        let stats = self.meta.stats(&runtime);
        // Teardown failures don't invalidate an already-scored run.
        let _ = runtime.dispose();
        Ok((fitness, stats))
    }

    /// Days needed for `learn` to cover the whole window.
    fn window_days(&self, window: &Range<usize>) -> u32 {
        let slice = &self.history[window.start.min(self.history.len())
            ..window.end.min(self.history.len())];
        match (slice.first(), slice.last()) {
            (Some(first), Some(last)) => ((last.time - first.time) / 86_400_000 + 1) as u32,
            _ => 0,
        }
    }
}

/// One-shot convenience wrapper around [`GeneticOptimizer`].
pub fn optimize<M: StrategyMeta<BacktestTransport>>(
    meta: &M,
    config: OptimizerConfig,
    base_options: StrategyOptions,
    instrument: Instrument,
    history: Arc<[Candle]>,
    progress: Option<&dyn Fn(&GeneticProgress)>,
) -> anyhow::Result<OptimizerReport> {
    let optimizer = GeneticOptimizer::new(meta, config, base_options, instrument, history)?;
    Ok(optimizer.run(progress)?)
}

//! Population — candidates, ranking and breeding.

use crate::genome::{apply_genome, crossover, mutate, sample_genome, Genome};
use debut_core::schema::GeneticSchema;
use debut_core::StrategyOptions;
use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;

/// Validator/repairer supplied by the strategy: `None` rejects a candidate.
pub type ValidateFn<'a> = &'a dyn Fn(StrategyOptions) -> Option<StrategyOptions>;

/// Attempts per slot before falling back to the base configuration.
const SAMPLE_ATTEMPTS: usize = 16;

/// One candidate: genome, phenotype and evaluation slots.
#[derive(Debug, Clone, Serialize)]
pub struct Individual {
    pub genome: Genome,
    pub options: StrategyOptions,
    /// In-sample fitness; `None` until evaluated, or after being discarded.
    pub fitness: Option<f64>,
    /// Forward-window fitness under walk-forward validation.
    pub forward_fitness: Option<f64>,
    pub stats: Option<serde_json::Value>,
}

impl Individual {
    pub fn new(genome: Genome, options: StrategyOptions) -> Self {
        Self {
            genome,
            options,
            fitness: None,
            forward_fitness: None,
            stats: None,
        }
    }

    /// Neutral candidate built straight from the base configuration.
    pub fn from_base(base: &StrategyOptions) -> Self {
        Self::new(Genome::new(), base.clone())
    }

    /// Copy genome and phenotype into a fresh, unevaluated individual.
    pub fn carry(&self) -> Self {
        Self::new(self.genome.clone(), self.options.clone())
    }

    fn rank_fitness(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }
}

/// Build a candidate from a genome: phenotype patch, then strategy
/// validation/repair.
fn make_individual(
    base: &StrategyOptions,
    genome: Genome,
    validate: ValidateFn<'_>,
) -> Option<Individual> {
    let options = apply_genome(base, &genome).ok()?;
    let options = validate(options)?;
    Some(Individual::new(genome, options))
}

/// Binary tournament over the evaluated parent pool.
fn tournament<'p>(parents: &[&'p Individual], rng: &mut StdRng) -> &'p Individual {
    let a = parents[rng.gen_range(0..parents.len())];
    let b = parents[rng.gen_range(0..parents.len())];
    if a.rank_fitness() >= b.rank_fitness() {
        a
    } else {
        b
    }
}

/// Breeding parameters for one next-generation step.
#[derive(Debug, Clone)]
pub struct BreedConfig {
    pub size: usize,
    pub elitism: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub mutation_jitter: f64,
    pub weighted_crossover: bool,
}

/// An ordered set of candidates (one island, or the whole classic
/// population).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Population {
    pub individuals: Vec<Individual>,
}

impl Population {
    /// Sample an initial population. Each slot retries invalid candidates up
    /// to a bounded attempt count, then falls back to the base configuration
    /// so the population always reaches its nominal size.
    pub fn sample(
        size: usize,
        schema: &GeneticSchema,
        base: &StrategyOptions,
        validate: ValidateFn<'_>,
        rng: &mut StdRng,
    ) -> Self {
        let mut individuals = Vec::with_capacity(size);
        for _ in 0..size {
            let candidate = (0..SAMPLE_ATTEMPTS)
                .find_map(|_| make_individual(base, sample_genome(schema, rng), validate));
            individuals.push(candidate.unwrap_or_else(|| Individual::from_base(base)));
        }
        Self { individuals }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Sort descending by in-sample fitness; unevaluated/discarded
    /// candidates sink to the end. NaN-safe.
    pub fn sort_by_fitness(&mut self) {
        self.individuals.sort_by(|a, b| {
            b.rank_fitness()
                .partial_cmp(&a.rank_fitness())
                .unwrap_or(Ordering::Equal)
        });
    }

    /// The current best candidate's fitness, if any candidate was scored.
    pub fn best_fitness(&self) -> Option<f64> {
        self.individuals
            .iter()
            .filter_map(|i| i.fitness)
            .fold(None, |acc, f| Some(acc.map_or(f, |a: f64| a.max(f))))
    }

    /// Produce the next generation: elites carried unchanged, the remainder
    /// bred by tournament-selected crossover plus mutation. Assumes the
    /// population is sorted descending by fitness.
    pub fn breed(
        &self,
        cfg: &BreedConfig,
        schema: &GeneticSchema,
        base: &StrategyOptions,
        validate: ValidateFn<'_>,
        rng: &mut StdRng,
    ) -> Population {
        let mut next = Vec::with_capacity(cfg.size);
        for elite in self.individuals.iter().take(cfg.elitism.min(cfg.size)) {
            next.push(elite.carry());
        }

        let parents: Vec<&Individual> = self
            .individuals
            .iter()
            .filter(|i| i.fitness.is_some())
            .collect();

        let mut attempts = 0;
        let max_attempts = cfg.size.max(1) * SAMPLE_ATTEMPTS;
        while next.len() < cfg.size && attempts < max_attempts {
            attempts += 1;
            let mut genome = if parents.len() >= 2 && rng.gen_bool(cfg.crossover_rate) {
                let first = tournament(&parents, rng);
                let second = tournament(&parents, rng);
                let weights = cfg
                    .weighted_crossover
                    .then(|| (first.rank_fitness(), second.rank_fitness()));
                crossover(schema, &first.genome, &second.genome, weights, rng)
            } else if !parents.is_empty() {
                tournament(&parents, rng).genome.clone()
            } else {
                sample_genome(schema, rng)
            };
            mutate(schema, &mut genome, cfg.mutation_rate, cfg.mutation_jitter, rng);
            if let Some(individual) = make_individual(base, genome, validate) {
                next.push(individual);
            }
        }
        // Validation kept rejecting candidates: pad with the base config.
        while next.len() < cfg.size {
            next.push(Individual::from_base(base));
        }

        Population { individuals: next }
    }
}

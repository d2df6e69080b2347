//! Integration tests for the genetic optimizer against real strategy runs.

use debut_core::schema::{GeneticSchema, SchemaDescriptor};
use debut_core::{
    BacktestTransport, Broker, Candle, CoreError, HookError, Instrument, InstrumentKind, Plugin,
    PluginContext, StrategyMeta, StrategyOptions, StrategyRuntime, Timeframe, WorkingEnv,
};
use debut_genetic::{
    optimize, GeneticOptimizer, OptimizerConfig, Topology, WalkForwardMode,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────

fn spot_instrument() -> Instrument {
    Instrument::new("BTCUSDT", InstrumentKind::Spot, 1.0, 4, 0.0001, 1.0)
}

fn base_options(amount: f64) -> StrategyOptions {
    StrategyOptions::new(Broker::Binance, "BTCUSDT", "USDT", Timeframe::Day1, amount)
}

/// Daily candles with a caller-supplied price curve.
fn daily_candles(n: usize, price: impl Fn(usize) -> f64) -> Arc<[Candle]> {
    (0..n)
        .map(|i| Candle::tick(i as i64 * 86_400_000, price(i), 1.0))
        .collect()
}

fn amount_schema(min: f64, max: f64) -> GeneticSchema {
    let mut schema = GeneticSchema::new();
    schema.insert(
        "amount".into(),
        SchemaDescriptor::Number {
            min,
            max,
            int: true,
            odd: false,
        },
    );
    schema
}

// ── Trend meta: fitness from the replayed price curve ────────────────

/// Records the first and last tick close of a run.
struct Recorder {
    first: Option<f64>,
    last: Option<f64>,
}

impl Plugin for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_tick(&mut self, _ctx: &PluginContext<'_>, tick: &Candle) -> Result<(), HookError> {
        self.first.get_or_insert(tick.close);
        self.last = Some(tick.close);
        Ok(())
    }

    fn snapshot(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({ "first": self.first, "last": self.last }))
    }

    fn hydrate(&mut self, state: &serde_json::Value) {
        self.first = state["first"].as_f64();
        self.last = state["last"].as_f64();
    }
}

/// Scores a run as ten times the total return of the replayed window.
struct TrendMeta {
    forward_threshold: f64,
}

impl StrategyMeta<BacktestTransport> for TrendMeta {
    fn schema(&self) -> GeneticSchema {
        amount_schema(50.0, 150.0)
    }

    fn validate(&self, options: StrategyOptions) -> Option<StrategyOptions> {
        options.validate().ok()?;
        Some(options)
    }

    fn score(&self, runtime: &StrategyRuntime<BacktestTransport>) -> f64 {
        let snapshot = runtime.plugins_snapshot();
        let state = &snapshot["recorder"];
        match (state["first"].as_f64(), state["last"].as_f64()) {
            (Some(first), Some(last)) if first > 0.0 => (last / first - 1.0) * 10.0,
            _ => f64::NAN,
        }
    }

    fn stats(&self, runtime: &StrategyRuntime<BacktestTransport>) -> serde_json::Value {
        serde_json::json!({ "score": self.score(runtime) })
    }

    fn validate_forward_stats(&self, stats: &serde_json::Value) -> bool {
        stats["score"].as_f64().unwrap_or(f64::NEG_INFINITY) >= self.forward_threshold
    }

    fn create(
        &self,
        transport: BacktestTransport,
        options: StrategyOptions,
        env: WorkingEnv,
    ) -> Result<StrategyRuntime<BacktestTransport>, CoreError> {
        let mut runtime = StrategyRuntime::new(transport, options, env)?;
        runtime.register_plugins(vec![Box::new(Recorder {
            first: None,
            last: None,
        })])?;
        Ok(runtime)
    }
}

/// 30 training days rising 12%, then a forward segment with configurable
/// rise, one extra day of slack at the end.
fn walk_forward_history(forward_rise: f64) -> Arc<[Candle]> {
    daily_candles(41, move |i| {
        if i < 30 {
            100.0 * (1.0 + 0.12 * i as f64 / 29.0)
        } else {
            100.0 * (1.0 + forward_rise * (i - 30) as f64 / 9.0)
        }
    })
}

fn walk_forward_config() -> OptimizerConfig {
    OptimizerConfig {
        generations: 1,
        population_size: 4,
        days: 30,
        gap_days: 10,
        best: 2,
        elitism: 1,
        max_threads: 2,
        wfo: Some(WalkForwardMode::Rolling),
        ..OptimizerConfig::default()
    }
}

#[test]
fn walk_forward_survivor_passes_gate() {
    // Training scores 1.2, forward scores 0.9, threshold 0.5: survives.
    let meta = TrendMeta {
        forward_threshold: 0.5,
    };
    let optimizer = GeneticOptimizer::new(
        &meta,
        walk_forward_config(),
        base_options(100.0),
        spot_instrument(),
        walk_forward_history(0.09),
    )
    .unwrap();
    let report = optimizer.run(None).unwrap();

    assert_eq!(report.best.len(), 2);
    for individual in &report.best {
        let fitness = individual.fitness.unwrap();
        let forward = individual.forward_fitness.unwrap();
        assert!((fitness - 1.2).abs() < 1e-9, "train score was {fitness}");
        assert!((forward - 0.9).abs() < 1e-9, "forward score was {forward}");
    }
    assert_eq!(report.generations.len(), 1);
    assert_eq!(report.generations[0].discarded_forward, 0);
}

#[test]
fn walk_forward_overfit_candidate_is_discarded() {
    // Training still scores 1.2, but forward only 0.1 < threshold 0.5.
    let meta = TrendMeta {
        forward_threshold: 0.5,
    };
    let optimizer = GeneticOptimizer::new(
        &meta,
        walk_forward_config(),
        base_options(100.0),
        spot_instrument(),
        walk_forward_history(0.01),
    )
    .unwrap();
    let report = optimizer.run(None).unwrap();

    // Every candidate failed the forward gate: no best for this run, the
    // discards are observable in the generation report.
    assert!(report.best.is_empty());
    assert_eq!(report.generations[0].discarded_forward, 4);
    assert_eq!(report.generations[0].stats.population, 0);
}

// ── Param meta: fitness as a pure function of the genome ─────────────

/// Deterministic fitness peaking at amount = 640.
struct ParamMeta;

impl StrategyMeta<BacktestTransport> for ParamMeta {
    fn schema(&self) -> GeneticSchema {
        amount_schema(100.0, 1000.0)
    }

    fn validate(&self, options: StrategyOptions) -> Option<StrategyOptions> {
        options.validate().ok()?;
        Some(options)
    }

    fn score(&self, runtime: &StrategyRuntime<BacktestTransport>) -> f64 {
        let amount = runtime.opts().amount;
        -((amount - 640.0) * (amount - 640.0)) / 1000.0
    }

    fn stats(&self, runtime: &StrategyRuntime<BacktestTransport>) -> serde_json::Value {
        serde_json::json!({ "amount": runtime.opts().amount })
    }

    fn create(
        &self,
        transport: BacktestTransport,
        options: StrategyOptions,
        env: WorkingEnv,
    ) -> Result<StrategyRuntime<BacktestTransport>, CoreError> {
        StrategyRuntime::new(transport, options, env)
    }
}

#[test]
fn selection_reports_exactly_best_candidates() {
    // Population 20, generations 5, best 3.
    let config = OptimizerConfig {
        generations: 5,
        population_size: 20,
        best: 3,
        max_threads: 2,
        wfo: None,
        ..OptimizerConfig::default()
    };
    let optimizer = GeneticOptimizer::new(
        &ParamMeta,
        config,
        base_options(500.0),
        spot_instrument(),
        daily_candles(40, |_| 100.0),
    )
    .unwrap();
    let report = optimizer.run(None).unwrap();

    assert_eq!(report.best.len(), 3);
    assert_eq!(report.generations.len(), 5);
    for generation in &report.generations {
        assert_eq!(generation.evaluated, 20);
        assert!(generation.errors.is_empty());
    }

    // Best candidates are sorted descending, the top one matches the final
    // generation's maximum, and every reported candidate dominates every
    // discarded one.
    let final_stats = &report.generations[4].stats;
    let fitnesses: Vec<f64> = report.best.iter().map(|i| i.fitness.unwrap()).collect();
    assert!(fitnesses.windows(2).all(|w| w[0] >= w[1]));
    assert!((fitnesses[0] - final_stats.maximum).abs() < 1e-9);
    assert!(*fitnesses.last().unwrap() >= final_stats.minimum);
}

#[test]
fn search_converges_toward_the_optimum() {
    let config = OptimizerConfig {
        generations: 10,
        population_size: 30,
        best: 1,
        max_threads: 2,
        wfo: None,
        ..OptimizerConfig::default()
    };
    let optimizer = GeneticOptimizer::new(
        &ParamMeta,
        config,
        base_options(500.0),
        spot_instrument(),
        daily_candles(40, |_| 100.0),
    )
    .unwrap();
    let report = optimizer.run(None).unwrap();

    let best = &report.best[0];
    // The optimum sits at 640; ten generations over a 900-wide range should
    // land close.
    assert!(
        (best.options.amount - 640.0).abs() <= 60.0,
        "best amount was {}",
        best.options.amount
    );
    // Elitism makes the best fitness monotone across generations.
    let first = &report.generations.first().unwrap().stats;
    let last = &report.generations.last().unwrap().stats;
    assert!(last.maximum >= first.maximum);
}

#[test]
fn island_topology_runs_and_reports() {
    let config = OptimizerConfig {
        generations: 4,
        population_size: 12,
        best: 2,
        max_threads: 2,
        wfo: None,
        topology: Topology::Islands {
            islands: 3,
            migration_interval: 1,
            migrants: 1,
        },
        ..OptimizerConfig::default()
    };
    let optimizer = GeneticOptimizer::new(
        &ParamMeta,
        config,
        base_options(500.0),
        spot_instrument(),
        daily_candles(40, |_| 100.0),
    )
    .unwrap();
    let report = optimizer.run(None).unwrap();

    assert_eq!(report.best.len(), 2);
    for generation in &report.generations {
        assert_eq!(generation.evaluated, 12);
    }
}

#[test]
fn identical_seeds_reproduce_across_thread_counts() {
    let run = |max_threads: usize| {
        let config = OptimizerConfig {
            generations: 4,
            population_size: 12,
            best: 3,
            max_threads,
            wfo: None,
            ..OptimizerConfig::default()
        };
        let optimizer = GeneticOptimizer::new(
            &ParamMeta,
            config,
            base_options(500.0),
            spot_instrument(),
            daily_candles(40, |_| 100.0),
        )
        .unwrap();
        optimizer.run(None).unwrap()
    };

    let single = run(1);
    let parallel = run(4);
    assert_eq!(single.best.len(), parallel.best.len());
    for (a, b) in single.best.iter().zip(parallel.best.iter()) {
        assert_eq!(a.options, b.options);
        assert_eq!(a.fitness, b.fitness);
    }
}

// ── Error tolerance ──────────────────────────────────────────────────

/// Fails to build a runtime for every odd amount.
struct FlakyMeta;

impl StrategyMeta<BacktestTransport> for FlakyMeta {
    fn schema(&self) -> GeneticSchema {
        amount_schema(100.0, 1000.0)
    }

    fn validate(&self, options: StrategyOptions) -> Option<StrategyOptions> {
        Some(options)
    }

    fn score(&self, runtime: &StrategyRuntime<BacktestTransport>) -> f64 {
        runtime.opts().amount
    }

    fn stats(&self, _runtime: &StrategyRuntime<BacktestTransport>) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn create(
        &self,
        transport: BacktestTransport,
        options: StrategyOptions,
        env: WorkingEnv,
    ) -> Result<StrategyRuntime<BacktestTransport>, CoreError> {
        if options.amount as i64 % 2 == 1 {
            return Err(CoreError::NoMarketData);
        }
        StrategyRuntime::new(transport, options, env)
    }
}

#[test]
fn failing_candidates_do_not_stop_the_generation() {
    let config = OptimizerConfig {
        generations: 2,
        population_size: 20,
        best: 3,
        max_threads: 2,
        wfo: None,
        ..OptimizerConfig::default()
    };
    let optimizer = GeneticOptimizer::new(
        &FlakyMeta,
        config,
        base_options(500.0),
        spot_instrument(),
        daily_candles(40, |_| 100.0),
    )
    .unwrap();
    let report = optimizer.run(None).unwrap();

    // Roughly half the sampled amounts are odd; their errors are preserved
    // and the surviving candidates still produce a ranking.
    let total_errors: usize = report.generations.iter().map(|g| g.errors.len()).sum();
    assert!(total_errors > 0);
    assert!(!report.best.is_empty());
    for individual in &report.best {
        assert_eq!(individual.options.amount as i64 % 2, 0);
    }
}

// ── Progress + convenience wrapper ───────────────────────────────────

#[test]
fn progress_fires_once_per_generation() {
    let calls = AtomicUsize::new(0);
    let config = OptimizerConfig {
        generations: 3,
        population_size: 8,
        best: 1,
        max_threads: 1,
        wfo: None,
        ..OptimizerConfig::default()
    };
    let callback = |progress: &debut_genetic::GeneticProgress| {
        calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(progress.generations, 3);
        assert_eq!(progress.evaluated, 8);
        assert!(progress.best_fitness.is_some());
    };
    let report = optimize(
        &ParamMeta,
        config,
        base_options(500.0),
        spot_instrument(),
        daily_candles(40, |_| 100.0),
        Some(&callback),
    )
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(report.best_fitness().is_some());
}

#[test]
fn unknown_schema_field_is_rejected_before_any_run() {
    struct BadSchemaMeta;
    impl StrategyMeta<BacktestTransport> for BadSchemaMeta {
        fn schema(&self) -> GeneticSchema {
            let mut schema = GeneticSchema::new();
            schema.insert("no_such_field".into(), SchemaDescriptor::Bool);
            schema
        }
        fn validate(&self, options: StrategyOptions) -> Option<StrategyOptions> {
            Some(options)
        }
        fn score(&self, _runtime: &StrategyRuntime<BacktestTransport>) -> f64 {
            0.0
        }
        fn stats(&self, _runtime: &StrategyRuntime<BacktestTransport>) -> serde_json::Value {
            serde_json::Value::Null
        }
        fn create(
            &self,
            transport: BacktestTransport,
            options: StrategyOptions,
            env: WorkingEnv,
        ) -> Result<StrategyRuntime<BacktestTransport>, CoreError> {
            StrategyRuntime::new(transport, options, env)
        }
    }

    let result = GeneticOptimizer::new(
        &BadSchemaMeta,
        OptimizerConfig::default(),
        base_options(500.0),
        spot_instrument(),
        daily_candles(40, |_| 100.0),
    );
    assert!(matches!(
        result,
        Err(debut_genetic::OptimizerError::Schema(errors)) if errors.iter().any(|e| e.contains("no_such_field"))
    ));
}

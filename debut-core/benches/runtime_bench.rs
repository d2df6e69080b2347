//! Criterion benchmarks for the runtime hot paths.
//!
//! Benchmarks:
//! 1. Tick pipeline (gated dispatch + candle roll + ordered dispatch)
//! 2. Schema sampling/repair (the optimizer's inner loop)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use debut_core::{
    BacktestTransport, Broker, Candle, Gate, HookError, Instrument, InstrumentKind, Plugin,
    PluginContext, SchemaDescriptor, StrategyOptions, StrategyRuntime, Timeframe, WorkingEnv,
};

fn make_candles(n: usize) -> Arc<[Candle]> {
    (0..n)
        .map(|i| {
            let price = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            Candle::tick(i as i64 * 60_000, price, 10.0)
        })
        .collect()
}

/// Minimal stateful plugin touching every per-tick hook.
struct BenchPlugin {
    ticks: u64,
    candles: u64,
}

impl Plugin for BenchPlugin {
    fn name(&self) -> &str {
        "bench"
    }

    fn before_tick(&mut self, _ctx: &PluginContext<'_>, _tick: &Candle) -> Gate {
        Gate::Proceed
    }

    fn on_tick(&mut self, _ctx: &PluginContext<'_>, _tick: &Candle) -> Result<(), HookError> {
        self.ticks += 1;
        Ok(())
    }

    fn on_candle(&mut self, _ctx: &PluginContext<'_>, _candle: &Candle) -> Result<(), HookError> {
        self.candles += 1;
        Ok(())
    }
}

fn bench_tick_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_pipeline");
    for n in [1_000usize, 10_000] {
        let candles = make_candles(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let instrument =
                    Instrument::new("BTCUSDT", InstrumentKind::Spot, 1.0, 4, 0.0001, 1.0);
                let transport = BacktestTransport::new(instrument, Arc::clone(&candles));
                let opts = StrategyOptions::new(
                    Broker::Binance,
                    "BTCUSDT",
                    "USDT",
                    Timeframe::Min5,
                    100.0,
                );
                let mut runtime =
                    StrategyRuntime::new(transport, opts, WorkingEnv::Tester).unwrap();
                runtime
                    .register_plugins(vec![Box::new(BenchPlugin {
                        ticks: 0,
                        candles: 0,
                    })])
                    .unwrap();
                runtime.start().unwrap();
                runtime.run().unwrap();
                black_box(runtime.current_candle().copied())
            })
        });
    }
    group.finish();
}

fn bench_schema_sampling(c: &mut Criterion) {
    let descriptors = [
        SchemaDescriptor::Number {
            min: 1.0,
            max: 200.0,
            int: true,
            odd: false,
        },
        SchemaDescriptor::Number {
            min: 3.0,
            max: 51.0,
            int: true,
            odd: true,
        },
        SchemaDescriptor::Number {
            min: 0.0,
            max: 1.0,
            int: false,
            odd: false,
        },
        SchemaDescriptor::Bool,
    ];
    c.bench_function("schema_sample_constrain", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| {
            for descriptor in &descriptors {
                let value = descriptor.sample(&mut rng);
                black_box(descriptor.constrain(value));
            }
        })
    });
}

criterion_group!(benches, bench_tick_pipeline, bench_schema_sampling);
criterion_main!(benches);

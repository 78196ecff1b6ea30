//! Store Performance Benchmarks
//!
//! - Reducer execution in isolation
//! - Store throughput (send → reduce → effect start)
//! - Effect interpretation overhead per variant
//! - Cancellation churn under a virtual clock
//! - Contended sends from several threads
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::unwrap_used)] // Benchmarks can unwrap during setup

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use reflux_core::{AnyScheduler, Effect, ImmediateScheduler, Reducer};
use reflux_runtime::Store;
use reflux_testing::TestScheduler;
use std::time::Duration;

#[derive(Clone, Debug)]
struct BenchState {
    counter: i64,
    data: Vec<u8>, // For testing state size impact
}

impl Default for BenchState {
    fn default() -> Self {
        Self {
            counter: 0,
            data: vec![0; 1024],
        }
    }
}

#[derive(Clone, Debug)]
enum BenchAction {
    Increment,
    SetValue(i64),
    Echo,
    Fan,
    Chain,
    Immediate,
    Debounced,
    NoOp,
}

struct BenchEnv {
    immediate: AnyScheduler,
    clock: AnyScheduler,
}

struct BenchReducer;

impl Reducer for BenchReducer {
    type State = BenchState;
    type Action = BenchAction;
    type Environment = BenchEnv;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effect<Self::Action> {
        match action {
            BenchAction::Increment => {
                state.counter += 1;
                Effect::none()
            },
            BenchAction::SetValue(v) => {
                state.counter = v;
                Effect::none()
            },
            BenchAction::Echo => Effect::send(BenchAction::NoOp),
            BenchAction::Fan => Effect::merge(vec![
                Effect::send(BenchAction::NoOp),
                Effect::send(BenchAction::NoOp),
                Effect::send(BenchAction::NoOp),
            ]),
            BenchAction::Chain => Effect::concatenate(vec![
                Effect::send(BenchAction::NoOp),
                Effect::send(BenchAction::NoOp),
            ]),
            BenchAction::Immediate => Effect::task(env.immediate.clone(), |ctx| {
                ctx.send(BenchAction::NoOp);
            }),
            BenchAction::Debounced => {
                Effect::delay(env.clock.clone(), Duration::from_millis(300), BenchAction::NoOp)
                    .cancellable("debounce")
            },
            BenchAction::NoOp => {
                black_box(state.data.len());
                Effect::none()
            },
        }
    }
}

fn env(clock: &TestScheduler) -> BenchEnv {
    BenchEnv {
        immediate: ImmediateScheduler::shared(),
        clock: clock.shared(),
    }
}

/// Benchmark reducer execution in isolation (no Store overhead)
fn benchmark_reducer_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    let reducer = BenchReducer;
    let env = env(&TestScheduler::new());

    group.bench_function("increment", |b| {
        let mut state = BenchState::default();
        b.iter(|| {
            let _effect = reducer.reduce(&mut state, black_box(BenchAction::Increment), &env);
        });
    });

    group.bench_function("set_value", |b| {
        let mut state = BenchState::default();
        b.iter(|| {
            let _effect = reducer.reduce(&mut state, black_box(BenchAction::SetValue(42)), &env);
        });
    });

    group.finish();
}

/// Benchmark Store throughput (actions/sec)
fn benchmark_store_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_throughput");
    group.throughput(Throughput::Elements(1));

    group.bench_function("send_action", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, env(&TestScheduler::new()));
        b.iter(|| store.send(black_box(BenchAction::Increment)).unwrap());
    });

    group.bench_function("send_and_read_state", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, env(&TestScheduler::new()));
        b.iter(|| {
            store.send(black_box(BenchAction::Increment)).unwrap();
            black_box(store.state(|s| s.counter));
        });
    });

    group.finish();
}

/// Benchmark effect interpretation overhead
fn benchmark_effect_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect_overhead");
    group.throughput(Throughput::Elements(1));

    let cases = [
        ("effect_none", BenchAction::NoOp),
        ("effect_send", BenchAction::Echo),
        ("effect_parallel", BenchAction::Fan),
        ("effect_sequential", BenchAction::Chain),
        ("effect_immediate_task", BenchAction::Immediate),
    ];

    for (name, action) in cases {
        group.bench_function(name, |b| {
            let store = Store::new(BenchState::default(), BenchReducer, env(&TestScheduler::new()));
            b.iter(|| store.send(black_box(action.clone())).unwrap());
        });
    }

    group.finish();
}

/// Benchmark last-writer-wins cancellation under a virtual clock
fn benchmark_cancellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancellation");
    group.throughput(Throughput::Elements(10));

    group.bench_function("debounce_10_then_fire", |b| {
        let clock = TestScheduler::new();
        let store = Store::new(BenchState::default(), BenchReducer, env(&clock));
        b.iter(|| {
            for _ in 0..10 {
                store.send(BenchAction::Debounced).unwrap();
            }
            clock.advance(Duration::from_millis(300));
        });
    });

    group.finish();
}

/// Benchmark contended sends
fn benchmark_concurrent_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.throughput(Throughput::Elements(400));

    group.bench_function("4_threads_100_sends", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, env(&TestScheduler::new()));
        b.iter(|| {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    let store = store.clone();
                    scope.spawn(move || {
                        for _ in 0..100 {
                            store.send(BenchAction::Increment).unwrap();
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reducer_execution,
    benchmark_store_throughput,
    benchmark_effect_overhead,
    benchmark_cancellation,
    benchmark_concurrent_access,
);
criterion_main!(benches);

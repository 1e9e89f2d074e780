//! Benchmarks for the track/notify path
//!
//! Run with: cargo bench

use std::cell::Cell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reflex_core::{computed, create_effect, reactive, EffectOptions, Object, Value};

// =============================================================================
// WRAPPER BENCHMARKS
// =============================================================================

fn bench_untracked_get(c: &mut Criterion) {
    let state = reactive(&Object::record([("count", 0)]));
    c.bench_function("untracked_get", |b| b.iter(|| black_box(state.get("count"))));
}

fn bench_set_with_subscribers(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_with_subscribers");
    for subscribers in [1usize, 10, 100] {
        let state = reactive(&Object::record([("count", 0)]));
        let runs = Rc::new(Cell::new(0u64));
        let effects: Vec<_> = (0..subscribers)
            .map(|_| {
                let reader = state.clone();
                let runs = runs.clone();
                create_effect(
                    move || {
                        reader.get("count");
                        runs.set(runs.get() + 1);
                    },
                    EffectOptions::default(),
                )
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                let mut n = 0;
                b.iter(|| {
                    n += 1;
                    state.set("count", n).ok();
                })
            },
        );
        drop(effects);
    }
    group.finish();
}

fn bench_sequence_push(c: &mut Criterion) {
    c.bench_function("sequence_push", |b| {
        b.iter(|| {
            let list = reactive(&Object::sequence(Vec::<Value>::new()));
            for i in 0..100 {
                list.push(i).ok();
            }
            black_box(list.raw().len())
        })
    });
}

// =============================================================================
// COMPUTED BENCHMARKS
// =============================================================================

fn bench_computed_invalidate_and_read(c: &mut Criterion) {
    let state = reactive(&Object::record([("count", 0)]));
    let source = state.clone();
    let doubled = computed(move || source.get("count").as_f64().unwrap_or(0.0) * 2.0);

    c.bench_function("computed_invalidate_and_read", |b| {
        let mut n = 0;
        b.iter(|| {
            n += 1;
            state.set("count", n).ok();
            black_box(doubled.get())
        })
    });
}

criterion_group!(
    benches,
    bench_untracked_get,
    bench_set_with_subscribers,
    bench_sequence_push,
    bench_computed_invalidate_and_read,
);
criterion_main!(benches);

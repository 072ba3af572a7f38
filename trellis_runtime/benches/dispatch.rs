//! Construct dispatch benchmarks: the no-throw fast path, a caught throw,
//! and deep propagation.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use trellis_runtime::{attempt, attempt_nested, define_class, throw, EXCEPTION};

define_class!(BenchFault: EXCEPTION);

fn no_throw(value: u64) -> u64 {
    let mut out = 0;
    attempt! {
        try { out = value.wrapping_mul(31); }
        catch (BenchFault, _e) { out = 0; }
        finally {}
    }
    out
}

fn caught_throw(value: u64) -> u64 {
    let mut out = 0;
    attempt! {
        try { throw!(BenchFault); }
        catch (BenchFault, _e) { out = value; }
        finally {}
    }
    out
}

fn nested_propagation(value: u64) -> u64 {
    let mut out = 0;
    attempt! {
        try {
            attempt_nested! {
                try {
                    attempt_nested! {
                        try { throw!(BenchFault); }
                        finally {}
                    }
                }
                finally {}
            }
        }
        catch (BenchFault, _e) { out = value; }
        finally {}
    }
    out
}

fn bench_dispatch(c: &mut Criterion) {
    c.bench_function("construct/no_throw", |b| {
        b.iter(|| no_throw(black_box(7)))
    });
    c.bench_function("construct/caught_throw", |b| {
        b.iter(|| caught_throw(black_box(7)))
    });
    c.bench_function("construct/nested_propagation", |b| {
        b.iter(|| nested_propagation(black_box(7)))
    });
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use entangle::{Atom, AtomOptions, Entanglement, Registry, Runtime, Store};

fn store_write_benchmark(c: &mut Criterion) {
    let store = Store::new();
    let atom = Atom::new(0i64);

    c.bench_function("store_write", |b| {
        let mut i = 0;
        b.iter(|| {
            store.set(&atom, black_box(i)).unwrap();
            i += 1;
        });
    });
}

fn registry_write_benchmark(c: &mut Criterion) {
    let registry = Registry::new();
    let atom = registry.atom(AtomOptions::new("bench", 0i64)).unwrap();

    c.bench_function("registry_write", |b| {
        let mut i = 0;
        b.iter(|| {
            registry.set(&atom, black_box(i)).unwrap();
            i += 1;
        });
    });
}

fn establish_benchmark(c: &mut Criterion) {
    c.bench_function("establish_pair", |b| {
        let runtime = Runtime::new();
        b.iter(|| {
            let atom = Atom::new(black_box(1i64));
            Entanglement::new(&atom, "bench").establish(&runtime).unwrap()
        });
    });
}

fn propagation_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let atom = Atom::new(0i64);
    let pair = Entanglement::new(&atom, "bench").establish(&runtime).unwrap();

    c.bench_function("propagate_registry_to_store", |b| {
        let mut i = 1;
        b.iter(|| {
            runtime.registry().set(pair.atom(), black_box(i)).unwrap();
            i += 1;
        });
    });

    c.bench_function("propagate_store_to_registry", |b| {
        let mut i = -1;
        b.iter(|| {
            runtime.store().set(&atom, black_box(i)).unwrap();
            i -= 1;
        });
    });

    c.bench_function("echo_suppressed_write", |b| {
        let value = runtime.registry().get(pair.atom()).unwrap();
        b.iter(|| {
            runtime.registry().set(pair.atom(), black_box(value)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    store_write_benchmark,
    registry_write_benchmark,
    establish_benchmark,
    propagation_benchmark
);
criterion_main!(benches);

//! Benchmarks for the storage engine: set/get throughput and eviction cost
//! under sustained over-capacity insertion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use secure_tiered_cache::config::EvictionPolicy;
use secure_tiered_cache::storage::StorageEngine;
use std::time::{Duration, SystemTime};

fn future() -> SystemTime {
    SystemTime::now() + Duration::from_secs(3600)
}

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_set");

    for capacity in &[100usize, 10_000] {
        let engine = StorageEngine::<String>::new(*capacity, 10 * 1024 * 1024, EvictionPolicy::Lru, 0.5, false);
        let mut i = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(capacity), capacity, |b, _| {
            b.iter(|| {
                i += 1;
                engine
                    .set("s", &format!("k{i}"), "value".to_string(), future(), 5)
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_get_hit(c: &mut Criterion) {
    let engine = StorageEngine::<String>::new(10_000, 10 * 1024 * 1024, EvictionPolicy::Lru, 0.5, false);
    for i in 0..1000 {
        engine
            .set("s", &format!("k{i}"), "value".to_string(), future(), 5)
            .unwrap();
    }

    c.bench_function("storage_get_hit", |b| {
        b.iter(|| black_box(engine.get("s", "k500")));
    });
}

fn bench_eviction_under_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_eviction");

    for policy in &[EvictionPolicy::Lru, EvictionPolicy::Lfu] {
        let engine = StorageEngine::<String>::new(100, 10 * 1024 * 1024, *policy, 0.5, false);
        for i in 0..100 {
            engine
                .set("s", &format!("k{i}"), "value".to_string(), future(), 5)
                .unwrap();
        }
        let mut i = 100u64;
        group.bench_with_input(BenchmarkId::new("policy", format!("{policy:?}")), policy, |b, _| {
            b.iter(|| {
                i += 1;
                engine
                    .set("s", &format!("k{i}"), "value".to_string(), future(), 5)
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_set, bench_get_hit, bench_eviction_under_pressure);
criterion_main!(benches);

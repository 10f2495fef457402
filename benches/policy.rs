//! Benchmarks for the classification and policy hot path.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use be_productive::clock::SystemClock;
use be_productive::dns::{AccessPolicy, Classification, DomainClassifier, domain, policy};
use be_productive::store::{MemoryStorage, Stores};

fn generate_domains(size: usize) -> Vec<String> {
    (0..size).map(|i| format!("distracting{i}.com")).collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_classify(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("classify");

    for size in &[10, 1000, 100_000] {
        let stores = rt.block_on(async {
            let stores = Stores::load(MemoryStorage::new(), MemoryStorage::new()).await;
            stores.classifications.record_all(generate_domains(*size)).await;
            stores
        });
        let classifier = DomainClassifier::new(stores.classifications.clone());

        group.bench_with_input(BenchmarkId::new("exact_hit", size), &classifier, |b, classifier| {
            b.iter(|| rt.block_on(classifier.classify(black_box("distracting0.com"))));
        });

        // Worst case: every parent suffix is looked up and misses.
        group.bench_with_input(BenchmarkId::new("miss", size), &classifier, |b, classifier| {
            b.iter(|| rt.block_on(classifier.classify(black_box("api.v2.docs.example.org"))));
        });
    }

    group.finish();
}

fn bench_should_block(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("should_block");

    let stores = rt.block_on(async {
        let stores = Stores::load(MemoryStorage::new(), MemoryStorage::new()).await;
        for i in 0..100 {
            stores.policy.allow(&format!("allowed{i}.org")).await;
        }
        stores
    });
    let evaluator = AccessPolicy::new(stores.policy.clone(), SystemClock);

    group.bench_function("exempt", |b| {
        b.iter(|| {
            rt.block_on(evaluator.should_block(
                black_box("api.github.com"),
                Classification::Distracting,
            ))
        });
    });

    group.bench_function("allow_listed", |b| {
        b.iter(|| {
            rt.block_on(evaluator.should_block(
                black_box("allowed99.org"),
                Classification::Distracting,
            ))
        });
    });

    group.bench_function("blocked", |b| {
        b.iter(|| {
            rt.block_on(evaluator.should_block(
                black_box("www.youtube.com"),
                Classification::Distracting,
            ))
        });
    });

    group.finish();
}

fn bench_helpers(c: &mut Criterion) {
    c.bench_function("normalize", |b| {
        b.iter(|| domain::normalize(black_box("WWW.YouTube.COM.")));
    });

    c.bench_function("is_exempt_miss", |b| {
        b.iter(|| policy::is_exempt(black_box("www.youtube.com")));
    });
}

criterion_group!(benches, bench_classify, bench_should_block, bench_helpers);
criterion_main!(benches);

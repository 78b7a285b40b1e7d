use std::{hint::black_box, sync::Arc};

use autolog::{AttributeTable, DecisionCache, LoggingConfig, MethodIdentity, MethodRule};
use criterion::{criterion_group, criterion_main, Criterion};

fn cache() -> DecisionCache {
    let config = LoggingConfig::new()
        .with_rule(MethodRule::new("Users.*"))
        .with_rule(MethodRule::new("Orders.Get?"))
        .with_rule(MethodRule::new("*.Place"));

    DecisionCache::new(Arc::new(config), Arc::new(AttributeTable::new()))
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let identity = MethodIdentity::new("Orders", "Place");

    let hit = cache();
    hit.resolve(&identity);

    c.bench_function("decision hit", |b| {
        b.iter(|| black_box(hit.resolve(&identity)))
    });

    let miss = cache();

    c.bench_function("decision compute", |b| {
        b.iter(|| black_box(miss.compute(&identity)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

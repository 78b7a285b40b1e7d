use std::hint::black_box;

use autolog::{Dialect, LoggingConfig, Params, TemplateTranslator};
use criterion::{criterion_group, criterion_main, Criterion};

pub fn criterion_benchmark(c: &mut Criterion) {
    let structured = TemplateTranslator::new(Dialect::Structured);
    let rust = TemplateTranslator::new(Dialect::Rust);

    c.bench_function("translate default template structured", |b| {
        b.iter(|| black_box(structured.translate_template(Some(LoggingConfig::DEFAULT_TEMPLATE))))
    });

    c.bench_function("translate default template rust", |b| {
        b.iter(|| black_box(rust.translate_template(Some(LoggingConfig::DEFAULT_TEMPLATE))))
    });

    let params = Params::new()
        .with("TypeName", "Orders")
        .with("MethodName", "Place")
        .with("Duration", 1.5)
        .with("InputParameters", Params::new().with("quantity", 3))
        .with("OutputValue", 42)
        .with("Unused", true);
    let template = structured.translate_template(Some(LoggingConfig::DEFAULT_TEMPLATE));

    c.bench_function("translate parameters", |b| {
        b.iter(|| black_box(structured.translate_parameters(&params, &template)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

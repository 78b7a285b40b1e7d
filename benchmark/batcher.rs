use std::{hint::black_box, sync::Arc, thread, time::Duration};

use autolog::{BackgroundChannel, Empty, LogChannel, LogEntry, LoggingConfig, Processor, Targets};
use criterion::{criterion_group, criterion_main, Criterion};

pub fn criterion_benchmark(c: &mut Criterion) {
    let (sender, receiver) = autolog_batcher::bounded::<Vec<u64>>(1024);

    thread::spawn(move || {
        receiver
            .blocking_exec(|batch| {
                black_box(batch);

                Ok(())
            })
            .unwrap();
    });

    c.bench_function("batch u64 thread 1 msg 10_000", |b| {
        b.iter(|| {
            for i in 0..10_000 {
                let _ = sender.try_send(i);
            }
        })
    });

    let processor = Processor::new(
        Arc::new(LoggingConfig::new()),
        autolog::FormatterFactory::builtin(),
        Targets::new().with_fallback(Empty),
    );

    let channel = BackgroundChannel::spawn(10_000, processor).unwrap();

    c.bench_function("enqueue entry", |b| {
        b.iter(|| {
            black_box(channel.try_enqueue(LogEntry::builder("Svc", "Do").build()));
        })
    });

    channel.close(Duration::from_secs(5));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

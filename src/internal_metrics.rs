use std::sync::atomic::{AtomicUsize, Ordering};

use autolog_batcher::Metric;

#[derive(Default)]
pub(crate) struct InternalMetrics {
    pub(crate) entry_processed: Counter,
    pub(crate) entry_skipped: Counter,
    pub(crate) entry_failed: Counter,
    pub(crate) format_fallback: Counter,
    pub(crate) format_failed: Counter,
}

#[derive(Default)]
pub(crate) struct Counter(AtomicUsize);

impl Counter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sample(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl InternalMetrics {
    pub fn sample(&self) -> impl Iterator<Item = Metric> + 'static {
        let InternalMetrics {
            entry_processed,
            entry_skipped,
            entry_failed,
            format_fallback,
            format_failed,
        } = self;

        [
            Metric::new("entry_processed", entry_processed.sample()),
            Metric::new("entry_skipped", entry_skipped.sample()),
            Metric::new("entry_failed", entry_failed.sample()),
            Metric::new("format_fallback", format_fallback.sample()),
            Metric::new("format_failed", format_failed.sample()),
        ]
        .into_iter()
    }
}

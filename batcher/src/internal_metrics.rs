use std::sync::atomic::{AtomicUsize, Ordering};

/**
A sampled value of one of the channel's internal counters.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    /**
    The name of the counter, like `queue_overflow`.
    */
    pub name: &'static str,
    /**
    The value of the counter when it was sampled.
    */
    pub value: usize,
}

impl Metric {
    /**
    Create a metric sample.
    */
    pub const fn new(name: &'static str, value: usize) -> Self {
        Metric { name, value }
    }
}

#[derive(Default)]
pub(crate) struct InternalMetrics {
    pub(crate) queue_overflow: Counter,
    pub(crate) queue_closed: Counter,
    pub(crate) queue_dropped: Counter,
    pub(crate) queue_batch_processed: Counter,
    pub(crate) queue_batch_failed: Counter,
    pub(crate) queue_batch_panicked: Counter,
    pub(crate) queue_batch_retry: Counter,
}

#[derive(Default)]
pub(crate) struct Counter(AtomicUsize);

impl Counter {
    pub fn increment(&self) {
        self.increment_by(1);
    }

    pub fn increment_by(&self, by: usize) {
        self.0.fetch_add(by, Ordering::Relaxed);
    }

    pub fn sample(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl InternalMetrics {
    pub fn sample(&self) -> impl Iterator<Item = Metric> + 'static {
        let InternalMetrics {
            queue_overflow,
            queue_closed,
            queue_dropped,
            queue_batch_processed,
            queue_batch_failed,
            queue_batch_panicked,
            queue_batch_retry,
        } = self;

        [
            Metric::new("queue_overflow", queue_overflow.sample()),
            Metric::new("queue_closed", queue_closed.sample()),
            Metric::new("queue_dropped", queue_dropped.sample()),
            Metric::new("queue_batch_processed", queue_batch_processed.sample()),
            Metric::new("queue_batch_failed", queue_batch_failed.sample()),
            Metric::new("queue_batch_panicked", queue_batch_panicked.sample()),
            Metric::new("queue_batch_retry", queue_batch_retry.sample()),
        ]
        .into_iter()
    }
}

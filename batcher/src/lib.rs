/*!
Bounded, non-blocking batch processing for `autolog`.

A channel is created with [`bounded`], which returns a [`Sender`] for producers and a [`Receiver`] for a single background worker. Producers call [`Sender::try_send`], which never waits on the worker: if the channel is full, or it's no longer open, the item is handed back to the caller. The worker drains everything buffered since its last pass as a single batch.

# Lifecycle

A channel moves through three phases:

- [`Phase::Open`]: items are accepted and the worker processes batches.
- [`Phase::Draining`]: items are rejected, but anything already buffered will still be processed.
- [`Phase::Closed`]: items are rejected and anything still buffered is discarded. This phase is terminal.

Moving to a phase the channel has already passed is a no-op.
*/

use crate::internal_metrics::InternalMetrics;
use std::{
    any::Any,
    cmp, fmt,
    future::{self, Future},
    mem,
    panic::{self, AssertUnwindSafe, UnwindSafe},
    pin::{pin, Pin},
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    task,
    task::{Context, Poll},
    thread,
    time::Duration,
};

mod internal_metrics;

pub use internal_metrics::Metric;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/**
A buffer that items are pushed into and handed to the worker as a batch.
*/
pub trait Channel {
    /**
    The type of items in the batch.
    */
    type Item;

    /**
    Create a new, empty batch.
    */
    fn new() -> Self;

    /**
    Create a new, empty batch with room for at least `capacity` items.
    */
    fn with_capacity(capacity: usize) -> Self
    where
        Self: Sized,
    {
        let _ = capacity;

        Self::new()
    }

    /**
    Push an item onto the end of the batch.
    */
    fn push(&mut self, item: Self::Item);

    /**
    The number of items in the batch still to be processed.
    */
    fn remaining(&self) -> usize;

    /**
    Whether there are any items left to process.
    */
    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /**
    Discard all items in the batch.
    */
    fn clear(&mut self);
}

impl<T> Channel for Vec<T> {
    type Item = T;

    fn new() -> Self {
        Vec::new()
    }

    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    fn push(&mut self, item: Self::Item) {
        Vec::push(self, item);
    }

    fn remaining(&self) -> usize {
        self.len()
    }

    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }

    fn clear(&mut self) {
        Vec::clear(self)
    }
}

/**
The phase a channel is in.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /**
    Items are accepted and processed.
    */
    Open,
    /**
    Items are rejected but buffered items are still processed.
    */
    Draining,
    /**
    Items are rejected and buffered items are discarded.
    */
    Closed,
}

/**
Create a channel that buffers at most `max_capacity` items between batches.
*/
pub fn bounded<T: Channel>(max_capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        metrics: Default::default(),
        state: Mutex::new(State {
            next_batch: Batch::new(),
            phase: Phase::Open,
            is_in_batch: false,
        }),
    });

    (
        Sender {
            max_capacity,
            shared: shared.clone(),
        },
        Receiver {
            idle_delay: Delay::new(Duration::from_millis(1), Duration::from_millis(500)),
            retry: Retry::new(10),
            retry_delay: Delay::new(Duration::from_millis(50), Duration::from_secs(1)),
            capacity: Capacity::new(),
            shared,
        },
    )
}

/**
The producer side of a channel.

Dropping the sender closes the channel.
*/
pub struct Sender<T> {
    max_capacity: usize,
    shared: Arc<Shared<T>>,
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.shared.lock().phase = Phase::Closed;
    }
}

/**
An item that couldn't be sent, along with the reason.
*/
pub enum TrySendError<T> {
    /**
    The channel already buffers its maximum number of items.
    */
    Full(T),
    /**
    The channel is draining or closed.
    */
    Closed(T),
}

impl<T> TrySendError<T> {
    /**
    Get back the item that couldn't be sent.
    */
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(item) | TrySendError::Closed(item) => item,
        }
    }

    /**
    Whether the item was rejected because the channel was full.
    */
    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("Full(..)"),
            TrySendError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("the channel is full"),
            TrySendError::Closed(_) => f.write_str("the channel is not accepting items"),
        }
    }
}

impl<T: Channel> Sender<T> {
    /**
    Try push an item onto the next batch.

    This method never waits on the worker. The only synchronization is a short critical section to push the item.
    */
    pub fn try_send(&self, msg: T::Item) -> Result<(), TrySendError<T::Item>> {
        let mut state = self.shared.lock();

        if state.phase != Phase::Open {
            self.shared.metrics.queue_closed.increment();

            return Err(TrySendError::Closed(msg));
        }

        // If the channel is full then reject the item; this prevents OOMing
        // when the worker can't keep up or has stopped
        if state.next_batch.channel.remaining() >= self.max_capacity {
            self.shared.metrics.queue_overflow.increment();

            return Err(TrySendError::Full(msg));
        }

        state.next_batch.channel.push(msg);

        Ok(())
    }

    /**
    The current phase of the channel.
    */
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /**
    Stop accepting new items, but keep processing buffered ones.

    Returns `true` if this call moved the channel out of [`Phase::Open`].
    */
    pub fn begin_drain(&self) -> bool {
        let mut state = self.shared.lock();

        if state.phase == Phase::Open {
            state.phase = Phase::Draining;
            true
        } else {
            false
        }
    }

    /**
    Close the channel, discarding any items the worker hasn't picked up yet.

    A batch the worker is already processing is allowed to complete. Returns the number of discarded items. Closing an already closed channel discards nothing.
    */
    pub fn close(&self) -> usize {
        let mut state = self.shared.lock();

        state.phase = Phase::Closed;

        let dropped = state.next_batch.channel.remaining();
        if dropped > 0 {
            state.next_batch.channel.clear();
            self.shared.metrics.queue_dropped.increment_by(dropped);
        }

        dropped
    }

    /**
    Run `watcher` once all items sent before this call have been processed.

    If there's nothing to wait for then `watcher` is called immediately.
    */
    pub fn on_next_flush(&self, watcher: impl FnOnce() + Send + 'static) {
        let watcher = Box::new(watcher);

        let mut state = self.shared.lock();

        // If:
        // - We're not in a batch and
        //   - the next batch is empty (there's no data) or
        //   - the channel is closed
        // Then:
        // - Call the watcher without scheduling it; there's nothing to wait for
        if !state.is_in_batch
            && (state.next_batch.channel.is_empty() || state.phase == Phase::Closed)
        {
            // Drop the lock before signalling the watcher
            drop(state);

            watcher();
        }
        // If there's active data to flush then schedule the watcher
        else {
            state.next_batch.watchers.push(watcher);
        }
    }

    /**
    Sample the current values of the channel's internal metrics.
    */
    pub fn sample_metrics(&self) -> impl Iterator<Item = Metric> + 'static {
        self.shared.sample_metrics()
    }
}

/**
The worker side of a channel.

Dropping the receiver closes the channel.
*/
pub struct Receiver<T> {
    idle_delay: Delay,
    retry: Retry,
    retry_delay: Delay,
    capacity: Capacity,
    shared: Arc<Shared<T>>,
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.shared.lock().phase = Phase::Closed;
    }
}

/**
An error processing a batch.

The error may carry items to retry.
*/
pub struct BatchError<T> {
    retryable: T,
}

impl<T: Channel> BatchError<T> {
    /**
    A failure where the `retryable` items should be tried again.
    */
    pub fn retry(_: impl std::error::Error + Send + Sync + 'static, retryable: T) -> Self {
        BatchError { retryable }
    }

    /**
    A failure where nothing should be retried.
    */
    pub fn no_retry(_: impl std::error::Error + Send + Sync + 'static) -> Self {
        BatchError {
            retryable: T::new(),
        }
    }

    /**
    Get the items to retry.
    */
    pub fn into_retryable(self) -> T {
        self.retryable
    }

    /**
    Map the retryable items into a different batch type.
    */
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BatchError<U> {
        BatchError {
            retryable: f(self.retryable),
        }
    }
}

impl<T: Channel> Receiver<T> {
    /**
    Run the worker on the current thread until the channel is closed.
    */
    pub fn blocking_exec(
        self,
        mut on_batch: impl FnMut(T) -> Result<(), BatchError<T>>,
    ) -> Result<(), Error> {
        static WAKER: OnceLock<Arc<NeverWake>> = OnceLock::new();

        // A waker that does nothing; the tasks it runs are fully
        // synchronous so there's never any notifications to issue
        struct NeverWake;

        impl task::Wake for NeverWake {
            fn wake(self: Arc<Self>) {}
        }

        // The future is polled to completion here, so we can pin
        // it directly on the stack
        let mut fut = pin!(self.exec(
            |delay| future::ready(thread::sleep(delay)),
            move |batch| future::ready(on_batch(batch)),
        ));

        // Get a context for our synchronous task
        let waker = WAKER.get_or_init(|| Arc::new(NeverWake)).clone().into();
        let mut cx = task::Context::from_waker(&waker);

        // Drive the task to completion; it should complete in one go,
        // but may eagerly return as soon as it hits an await point, so
        // just to be sure we continuously poll it
        loop {
            match fut.as_mut().poll(&mut cx) {
                task::Poll::Ready(r) => return r,
                task::Poll::Pending => continue,
            }
        }
    }

    /**
    Run the worker until the channel is closed.

    The `wait` function is used to back off while the channel is idle. The `on_batch` function is called with each batch; panics in it are caught and the batch is discarded.
    */
    pub async fn exec<
        FBatch: Future<Output = Result<(), BatchError<T>>>,
        FWait: Future<Output = ()>,
    >(
        mut self,
        mut wait: impl FnMut(Duration) -> FWait,
        mut on_batch: impl FnMut(T) -> FBatch,
    ) -> Result<(), Error> {
        // This variable holds the "next" batch
        // Under the lock all we do is push onto a pre-allocated vec
        // and replace it with another pre-allocated vec
        let mut next_batch = Batch::new();

        loop {
            // Run inside the lock
            let (mut current_batch, phase) = {
                let mut state = self.shared.lock();

                // NOTE: We don't check the phase here because a draining
                // channel still needs its last batches emitted

                // If there are items then mark that we're in a batch and replace it with an empty one
                // The sender will start filling this new batch
                if state.next_batch.channel.remaining() > 0 {
                    state.is_in_batch = true;

                    (
                        mem::replace(&mut state.next_batch, mem::take(&mut next_batch)),
                        state.phase,
                    )
                }
                // If there are no items then mark that we're outside of a batch and take its watchers
                else {
                    state.is_in_batch = false;

                    let watchers = mem::take(&mut state.next_batch.watchers);

                    (
                        Batch {
                            channel: T::new(),
                            watchers,
                        },
                        state.phase,
                    )
                }
            };

            // Run outside of the lock
            if current_batch.channel.remaining() > 0 {
                self.retry.reset();
                self.retry_delay.reset();
                self.idle_delay.reset();

                // Re-allocate our next buffer outside of the lock
                next_batch = Batch {
                    channel: T::with_capacity(
                        self.capacity.next(current_batch.channel.remaining()),
                    ),
                    watchers: Watchers::new(),
                };

                // Process the batch, taking care not to panic
                loop {
                    match panic::catch_unwind(AssertUnwindSafe(|| on_batch(current_batch.channel)))
                    {
                        Ok(on_batch) => match CatchUnwind(AssertUnwindSafe(on_batch)).await {
                            Ok(Ok(())) => {
                                self.shared.metrics.queue_batch_processed.increment();
                            }
                            Ok(Err(BatchError { retryable })) => {
                                self.shared.metrics.queue_batch_failed.increment();

                                if retryable.remaining() > 0
                                    && phase != Phase::Closed
                                    && self.retry.next()
                                {
                                    // Delay a bit before trying again; this gives the destination
                                    // a chance to get itself together
                                    wait(self.retry_delay.next()).await;

                                    current_batch = Batch {
                                        channel: retryable,
                                        watchers: current_batch.watchers,
                                    };

                                    self.shared.metrics.queue_batch_retry.increment();
                                    continue;
                                }
                            }
                            Err(_) => {
                                self.shared.metrics.queue_batch_panicked.increment();
                            }
                        },
                        Err(_) => {
                            self.shared.metrics.queue_batch_panicked.increment();
                        }
                    }

                    break;
                }

                // After the batch has been processed, notify any watchers
                current_batch.watchers.notify();
            }
            // If the batch was empty then notify any watchers (there was nothing to flush)
            // and wait before checking again
            else {
                current_batch.watchers.notify();

                // If the channel is closed then exit the loop and return; this will
                // drop the receiver
                if phase == Phase::Closed {
                    return Ok(());
                }

                // If we didn't see any items, then sleep for a bit
                wait(self.idle_delay.next()).await;
            }
        }
    }

    /**
    Sample the current values of the channel's internal metrics.
    */
    pub fn sample_metrics(&self) -> impl Iterator<Item = Metric> + 'static {
        self.shared.sample_metrics()
    }
}

struct CatchUnwind<F>(F);

impl<F: Future + UnwindSafe> Future for CatchUnwind<F> {
    type Output = Result<F::Output, Box<dyn Any + Send>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // SAFETY: `CatchUnwind` uses structural pinning
        let f = unsafe { Pin::map_unchecked_mut(self, |x| &mut x.0) };

        panic::catch_unwind(AssertUnwindSafe(|| f.poll(cx)))?.map(Ok)
    }
}

struct Delay {
    current: Duration,
    step: Duration,
    max: Duration,
}

impl Delay {
    fn new(step: Duration, max: Duration) -> Delay {
        Delay {
            current: Duration::ZERO,
            step,
            max,
        }
    }

    fn reset(&mut self) {
        self.current = Duration::ZERO
    }

    fn next(&mut self) -> Duration {
        self.current = cmp::min(self.current * 2 + self.step, self.max);
        self.current
    }
}

const CAPACITY_WINDOW: usize = 16;

struct Capacity([usize; CAPACITY_WINDOW], usize);

impl Capacity {
    fn new() -> Self {
        Capacity([1; CAPACITY_WINDOW], 0)
    }

    fn next(&mut self, last_len: usize) -> usize {
        self.0[self.1 % CAPACITY_WINDOW] = last_len;
        self.1 = self.1.wrapping_add(1);

        self.0.iter().copied().max().unwrap_or(1)
    }
}

struct Retry {
    current: u32,
    max: u32,
}

impl Retry {
    fn new(max: u32) -> Self {
        Retry { current: 0, max }
    }

    fn reset(&mut self) {
        self.current = 0;
    }

    fn next(&mut self) -> bool {
        self.current += 1;
        self.current <= self.max
    }
}

struct Shared<T> {
    metrics: InternalMetrics,
    state: Mutex<State<T>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<State<T>> {
        // Panics in user code never happen under the lock,
        // so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl<T: Channel> Shared<T> {
    fn sample_metrics(&self) -> impl Iterator<Item = Metric> + 'static {
        let queue_length = { self.lock().next_batch.channel.remaining() };

        self.metrics
            .sample()
            .chain(Some(Metric::new("queue_length", queue_length)))
    }
}

struct State<T> {
    next_batch: Batch<T>,
    phase: Phase,
    is_in_batch: bool,
}

struct Batch<T> {
    channel: T,
    watchers: Watchers,
}

impl<T: Channel> Batch<T> {
    fn new() -> Self {
        Batch {
            channel: T::new(),
            watchers: Watchers::new(),
        }
    }
}

impl<T: Channel> Default for Batch<T> {
    fn default() -> Self {
        Batch::new()
    }
}

struct Watchers(Vec<Watcher>);

type Watcher = Box<dyn FnOnce() + Send>;

impl Default for Watchers {
    fn default() -> Self {
        Watchers::new()
    }
}

impl Watchers {
    fn new() -> Self {
        Watchers(Vec::new())
    }

    fn push(&mut self, watcher: Watcher) {
        self.0.push(watcher);
    }

    fn notify(self) {
        for watcher in self.0 {
            let _ = panic::catch_unwind(AssertUnwindSafe(watcher));
        }
    }
}

pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;

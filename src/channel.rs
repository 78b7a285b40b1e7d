/*!
The [`LogChannel`] type.

A channel sits between intercepted calls and the [`crate::processor::Processor`]. Producers enqueue entries without waiting; a single background worker hands them to the processor in batches.

# Lifecycle

Channels start [`ChannelState::Open`]. Closing a channel moves it to [`ChannelState::Draining`], where new entries are rejected but buffered entries are still processed, until either the buffer is empty or the close deadline passes. Then it moves to [`ChannelState::Closed`]. Entries still buffered at that point are dropped, and the number dropped is reported as a diagnostic.
*/

use core::{fmt, time::Duration};
use std::{
    io,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

use autolog_batcher::{Metric, Phase, Sender};

use crate::{
    empty::Empty,
    entry::LogEntry,
    level::Level,
    processor::Processor,
    runtime::{self, diagnostic},
    sink::{DynSink, Sink},
};

/**
The state of a [`LogChannel`].
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChannelState {
    /**
    Entries are accepted.
    */
    Open,
    /**
    Entries are rejected, but buffered entries are still processed.
    */
    Draining,
    /**
    Entries are rejected and nothing more will be processed.
    */
    Closed,
}

impl From<Phase> for ChannelState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Open => ChannelState::Open,
            Phase::Draining => ChannelState::Draining,
            Phase::Closed => ChannelState::Closed,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelState::Open => "open",
            ChannelState::Draining => "draining",
            ChannelState::Closed => "closed",
        })
    }
}

/**
A queue of [`LogEntry`]s waiting to be processed.
*/
pub trait LogChannel {
    /**
    Try enqueue an entry without waiting.

    Returns `false` if the entry was rejected because the channel is full or isn't open. The entry is discarded in that case.
    */
    fn try_enqueue(&self, entry: LogEntry) -> bool;

    /**
    The current state of the channel.
    */
    fn state(&self) -> ChannelState;

    /**
    Wait for every entry enqueued before this call to be processed.

    Returns whether the flush completed within the timeout.
    */
    fn blocking_flush(&self, timeout: Duration) -> bool;

    /**
    Stop accepting entries, then wait up to `timeout` for buffered entries to be processed.

    Closing is idempotent; closing an already closed channel returns immediately.
    */
    fn close(&self, timeout: Duration);

    /**
    Sample the channel's internal metrics.
    */
    fn sample_metrics(&self) -> Vec<Metric> {
        Vec::new()
    }
}

impl<'a, T: LogChannel + ?Sized> LogChannel for &'a T {
    fn try_enqueue(&self, entry: LogEntry) -> bool {
        (**self).try_enqueue(entry)
    }

    fn state(&self) -> ChannelState {
        (**self).state()
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }

    fn close(&self, timeout: Duration) {
        (**self).close(timeout)
    }

    fn sample_metrics(&self) -> Vec<Metric> {
        (**self).sample_metrics()
    }
}

impl<T: LogChannel + ?Sized> LogChannel for Box<T> {
    fn try_enqueue(&self, entry: LogEntry) -> bool {
        (**self).try_enqueue(entry)
    }

    fn state(&self) -> ChannelState {
        (**self).state()
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }

    fn close(&self, timeout: Duration) {
        (**self).close(timeout)
    }

    fn sample_metrics(&self) -> Vec<Metric> {
        (**self).sample_metrics()
    }
}

impl<T: LogChannel + ?Sized> LogChannel for Arc<T> {
    fn try_enqueue(&self, entry: LogEntry) -> bool {
        (**self).try_enqueue(entry)
    }

    fn state(&self) -> ChannelState {
        (**self).state()
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }

    fn close(&self, timeout: Duration) {
        (**self).close(timeout)
    }

    fn sample_metrics(&self) -> Vec<Metric> {
        (**self).sample_metrics()
    }
}

impl LogChannel for Empty {
    fn try_enqueue(&self, _: LogEntry) -> bool {
        false
    }

    fn state(&self) -> ChannelState {
        ChannelState::Closed
    }

    fn blocking_flush(&self, _: Duration) -> bool {
        true
    }

    fn close(&self, _: Duration) {}
}

/**
The consumer that a [`LogChannel`] hands entries to.
*/
pub trait Handoff {
    /**
    Process an entry.

    Returns whether the entry was accepted.
    */
    fn handoff(&self, entry: LogEntry) -> bool;

    /**
    Wait for anything the consumer buffers to be written.
    */
    fn blocking_flush(&self, timeout: Duration) -> bool {
        let _ = timeout;

        true
    }
}

impl<'a, T: Handoff + ?Sized> Handoff for &'a T {
    fn handoff(&self, entry: LogEntry) -> bool {
        (**self).handoff(entry)
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }
}

impl<T: Handoff + ?Sized> Handoff for Arc<T> {
    fn handoff(&self, entry: LogEntry) -> bool {
        (**self).handoff(entry)
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }
}

impl Handoff for Processor {
    fn handoff(&self, entry: LogEntry) -> bool {
        self.process_entry(&entry);

        true
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        Processor::blocking_flush(self, timeout)
    }
}

/**
Create a [`Handoff`] from a function.
*/
pub fn from_fn<F: Fn(LogEntry)>(f: F) -> FromFn<F> {
    FromFn(f)
}

/**
The result of [`from_fn`].
*/
pub struct FromFn<F>(F);

impl<F: Fn(LogEntry)> Handoff for FromFn<F> {
    fn handoff(&self, entry: LogEntry) -> bool {
        (self.0)(entry);

        true
    }
}

/**
A [`LogChannel`] that processes entries on a background worker.

The channel buffers at most its capacity of entries between batches. When the buffer is full new entries are rejected instead of waiting for room.
*/
pub struct BackgroundChannel {
    sender: Sender<Vec<LogEntry>>,
    diagnostics: DynSink,
}

impl BackgroundChannel {
    /**
    Create a channel and spawn its worker.

    With the `tokio` feature the worker runs on the current `tokio` runtime if there is one. Otherwise it runs on a dedicated thread.
    */
    pub fn spawn(
        capacity: usize,
        handoff: impl Handoff + Send + Sync + 'static,
    ) -> io::Result<Self> {
        let (sender, receiver) = autolog_batcher::bounded::<Vec<LogEntry>>(capacity);

        #[cfg(not(feature = "tokio"))]
        {
            std::thread::Builder::new()
                .name("autolog-worker".into())
                .spawn(move || {
                    let _ = receiver.blocking_exec(|batch: Vec<LogEntry>| {
                        for entry in batch {
                            let _ = handoff.handoff(entry);
                        }

                        Ok(())
                    });
                })?;
        }

        #[cfg(feature = "tokio")]
        {
            let handoff = Arc::new(handoff);

            autolog_batcher::tokio::spawn(receiver, move |batch: Vec<LogEntry>| {
                let handoff = handoff.clone();

                async move {
                    for entry in batch {
                        let _ = handoff.handoff(entry);
                    }

                    Ok(())
                }
            })?;
        }

        Ok(BackgroundChannel {
            sender,
            diagnostics: Arc::new(runtime::Internal),
        })
    }

    /**
    Write diagnostics to the given sink instead of the internal runtime sink.
    */
    pub fn with_diagnostics(mut self, sink: impl Sink + Send + Sync + 'static) -> Self {
        self.diagnostics = Arc::new(sink);
        self
    }

    fn flush(&self, timeout: Duration) -> bool {
        #[cfg(not(feature = "tokio"))]
        {
            autolog_batcher::sync::blocking_flush(&self.sender, timeout)
        }
        #[cfg(feature = "tokio")]
        {
            autolog_batcher::tokio::blocking_flush(&self.sender, timeout)
        }
    }
}

impl LogChannel for BackgroundChannel {
    fn try_enqueue(&self, entry: LogEntry) -> bool {
        self.sender.try_send(entry).is_ok()
    }

    fn state(&self) -> ChannelState {
        self.sender.phase().into()
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        if self.state() == ChannelState::Closed {
            return true;
        }

        self.flush(timeout)
    }

    fn close(&self, timeout: Duration) {
        if self.state() == ChannelState::Closed {
            return;
        }

        self.sender.begin_drain();

        if !self.flush(timeout) {
            diagnostic(
                &*self.diagnostics,
                Level::Warn,
                format_args!(
                    "the log channel didn't drain within {:?}",
                    timeout
                ),
            );
        }

        let dropped = self.sender.close();

        if dropped > 0 {
            diagnostic(
                &*self.diagnostics,
                Level::Warn,
                format_args!("dropped {} log entries when closing the channel", dropped),
            );
        }
    }

    fn sample_metrics(&self) -> Vec<Metric> {
        self.sender.sample_metrics().collect()
    }
}

/**
A [`LogChannel`] that processes entries on the calling thread.

This channel is useful in tests and short-lived programs where entries should be written before the intercepted call returns.
*/
pub struct DirectChannel<H> {
    handoff: H,
    state: AtomicU8,
}

const OPEN: u8 = 0;
const DRAINING: u8 = 1;
const CLOSED: u8 = 2;

impl<H: Handoff> DirectChannel<H> {
    /**
    Create a channel that hands entries straight to a consumer.
    */
    pub fn new(handoff: H) -> Self {
        DirectChannel {
            handoff,
            state: AtomicU8::new(OPEN),
        }
    }
}

impl<H: Handoff> LogChannel for DirectChannel<H> {
    fn try_enqueue(&self, entry: LogEntry) -> bool {
        if self.state.load(Ordering::Acquire) != OPEN {
            return false;
        }

        self.handoff.handoff(entry)
    }

    fn state(&self) -> ChannelState {
        match self.state.load(Ordering::Acquire) {
            OPEN => ChannelState::Open,
            DRAINING => ChannelState::Draining,
            _ => ChannelState::Closed,
        }
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        self.handoff.blocking_flush(timeout)
    }

    fn close(&self, timeout: Duration) {
        if self
            .state
            .compare_exchange(OPEN, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.handoff.blocking_flush(timeout);

        self.state.store(CLOSED, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc, Mutex,
        },
        time::Instant,
    };

    fn entry(method: &str) -> LogEntry {
        LogEntry::builder("Svc", method).build()
    }

    #[test]
    fn background_processes_entries() {
        let processed = Arc::new(Mutex::new(Vec::new()));

        let channel = BackgroundChannel::spawn(
            16,
            from_fn({
                let processed = processed.clone();

                move |entry: LogEntry| {
                    processed
                        .lock()
                        .unwrap()
                        .push(entry.method_name().to_owned())
                }
            }),
        )
        .unwrap();

        assert!(channel.try_enqueue(entry("A")));
        assert!(channel.try_enqueue(entry("B")));

        assert!(channel.blocking_flush(Duration::from_secs(5)));

        assert_eq!(vec!["A", "B"], *processed.lock().unwrap());
    }

    #[test]
    fn background_rejects_when_full() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let channel = BackgroundChannel::spawn(
            2,
            from_fn(move |_: LogEntry| {
                let _ = started_tx.send(());
                let _ = release_rx.lock().unwrap().recv();
            }),
        )
        .unwrap();

        // Block the worker on the first entry
        assert!(channel.try_enqueue(entry("A")));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(channel.try_enqueue(entry("B")));
        assert!(channel.try_enqueue(entry("C")));

        let start = Instant::now();
        assert!(!channel.try_enqueue(entry("D")));
        assert!(start.elapsed() < Duration::from_secs(1));

        drop(release_tx);

        assert!(channel
            .sample_metrics()
            .iter()
            .any(|metric| metric.name == "queue_overflow" && metric.value == 1));
    }

    #[test]
    fn background_rejects_after_close() {
        let count = Arc::new(AtomicUsize::new(0));

        let channel = BackgroundChannel::spawn(
            16,
            from_fn({
                let count = count.clone();

                move |_: LogEntry| {
                    count.fetch_add(1, Ordering::Relaxed);
                }
            }),
        )
        .unwrap();

        assert!(channel.try_enqueue(entry("A")));

        channel.close(Duration::from_secs(5));

        assert_eq!(ChannelState::Closed, channel.state());
        assert_eq!(1, count.load(Ordering::Relaxed));

        let start = Instant::now();
        assert!(!channel.try_enqueue(entry("B")));
        assert!(start.elapsed() < Duration::from_secs(1));

        // Closing again is a no-op
        channel.close(Duration::from_secs(5));
        assert_eq!(1, count.load(Ordering::Relaxed));
    }

    #[test]
    fn background_reports_dropped_entries() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let diagnostics = Arc::new(Mutex::new(Vec::new()));

        let channel = BackgroundChannel::spawn(
            16,
            from_fn(move |_: LogEntry| {
                let _ = started_tx.send(());
                let _ = release_rx.lock().unwrap().recv();
            }),
        )
        .unwrap()
        .with_diagnostics(crate::sink::from_fn({
            let diagnostics = diagnostics.clone();

            move |message: &str, _, _: &str| diagnostics.lock().unwrap().push(message.to_owned())
        }));

        assert!(channel.try_enqueue(entry("A")));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(channel.try_enqueue(entry("B")));

        channel.close(Duration::from_millis(50));
        drop(release_tx);

        assert_eq!(ChannelState::Closed, channel.state());

        let diagnostics = diagnostics.lock().unwrap();
        assert!(diagnostics
            .iter()
            .any(|message| message == "dropped 1 log entries when closing the channel"));
    }

    #[test]
    fn direct_processes_inline() {
        let count = AtomicUsize::new(0);

        let channel = DirectChannel::new(from_fn(|_: LogEntry| {
            count.fetch_add(1, Ordering::Relaxed);
        }));

        assert_eq!(ChannelState::Open, channel.state());
        assert!(channel.try_enqueue(entry("A")));
        assert_eq!(1, count.load(Ordering::Relaxed));

        channel.close(Duration::from_secs(1));

        assert_eq!(ChannelState::Closed, channel.state());
        assert!(!channel.try_enqueue(entry("B")));
        assert_eq!(1, count.load(Ordering::Relaxed));
    }
}

/*!
Run channels in a `tokio` runtime.
*/

use std::{
    cmp,
    future::Future,
    time::{Duration, Instant},
};

use crate::{BatchError, Channel, Receiver, Sender};

/**
Spawn a worker to run the [`Receiver`] on a `tokio` runtime.

If the current thread is a `tokio` thread, then the worker will be spawned onto its runtime. If the current thread is not a `tokio` thread, then a single-threaded `tokio` runtime will be set up in a dedicated thread to run it.
*/
pub fn spawn<
    T: Channel + Send + 'static,
    F: Future<Output = Result<(), BatchError<T>>> + Send + 'static,
>(
    receiver: Receiver<T>,
    on_batch: impl FnMut(T) -> F + Send + 'static,
) -> std::io::Result<()>
where
    T::Item: Send + 'static,
{
    let receive = async move {
        receiver
            .exec(|delay| tokio::time::sleep(delay), on_batch)
            .await
    };

    match tokio::runtime::Handle::try_current() {
        // If we're on a `tokio` thread then spawn on it
        Ok(handle) => {
            handle.spawn(receive);
        }
        // If we're not on a `tokio` thread then spawn a
        // background thread and run the work there
        Err(_) => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;

            std::thread::Builder::new()
                .name("autolog-batcher".into())
                .spawn(move || {
                    let _ = rt.block_on(receive);
                })?;
        }
    }

    Ok(())
}

/**
Wait for a channel potentially running on a `tokio` thread to process all items active at the point this call was made.

If the current thread is a `tokio` thread then this call will be executed using [`tokio::task::block_in_place`] to avoid starving other work.
*/
pub fn blocking_flush<T: Channel>(sender: &Sender<T>, timeout: Duration) -> bool {
    let flush = || {
        let (notifier, mut notified) = tokio::sync::oneshot::channel();

        sender.on_next_flush(move || {
            let _ = notifier.send(());
        });

        // If there's nothing to flush then return immediately
        if notified.try_recv().is_ok() {
            return true;
        }

        let now = Instant::now();
        let mut wait = Duration::from_micros(1);
        let max_wait_step = cmp::max(timeout / 3, Duration::from_micros(1));

        while now.elapsed() < timeout {
            match notified.try_recv() {
                Ok(()) => return true,
                // Unexpected hangup; this should mean the channel was closed
                Err(tokio::sync::oneshot::error::TryRecvError::Closed) => return true,
                Err(tokio::sync::oneshot::error::TryRecvError::Empty) => (),
            }

            // Apply some exponential backoff to avoid spinning
            // Chances are if data isn't flushed immediately that
            // it'll be waiting on some IO and could be a while
            std::thread::sleep(wait);
            wait += cmp::min(wait * 2, max_wait_step);
        }

        false
    };

    match tokio::runtime::Handle::try_current() {
        Ok(_) => tokio::task::block_in_place(flush),
        Err(_) => flush(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test(flavor = "multi_thread")]
    async fn spawn_processes_batches() {
        let (sender, receiver) = crate::bounded::<Vec<usize>>(1024);

        let processed = Arc::new(AtomicUsize::new(0));

        spawn(receiver, {
            let processed = processed.clone();

            move |batch: Vec<usize>| {
                processed.fetch_add(batch.len(), Ordering::Relaxed);
                async { Ok(()) }
            }
        })
        .unwrap();

        for i in 0..10 {
            sender.try_send(i).unwrap();
        }

        assert!(blocking_flush(&sender, Duration::from_secs(5)));
        assert_eq!(10, processed.load(Ordering::Relaxed));
    }
}

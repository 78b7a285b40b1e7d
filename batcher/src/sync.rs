/*!
Wait on channels from synchronous code.
*/

use std::{
    sync::{Arc, Condvar, Mutex},
    time::{Duration, Instant},
};

use crate::{Channel, Sender};

#[derive(Clone)]
struct Trigger(Arc<(Mutex<bool>, Condvar)>);

impl Trigger {
    fn new() -> Self {
        Trigger(Arc::new((Mutex::new(false), Condvar::new())))
    }

    fn trigger(self) {
        *(self.0).0.lock().unwrap_or_else(|err| err.into_inner()) = true;
        (self.0).1.notify_all();
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        let mut flushed = (self.0).0.lock().unwrap_or_else(|err| err.into_inner());
        while !*flushed {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };

            match (self.0).1.wait_timeout(flushed, remaining) {
                Ok((next_flushed, r)) if !r.timed_out() => {
                    flushed = next_flushed;
                    continue;
                }
                Ok((next_flushed, _)) => return *next_flushed,
                Err(_) => return false,
            }
        }

        true
    }
}

/**
Wait for the worker to process all items sent before this call.

Returns `false` if `timeout` elapsed first.
*/
pub fn blocking_flush<T: Channel>(sender: &Sender<T>, timeout: Duration) -> bool {
    let on_flush = Trigger::new();

    sender.on_next_flush({
        let on_flush = on_flush.clone();

        move || {
            on_flush.trigger();
        }
    });

    on_flush.wait_timeout(timeout)
}

/*!
The internal diagnostics runtime.

`autolog` reports on its own operation, like formatter fallbacks and entries that failed to process, through a separate [`Sink`] that's silent unless it's initialized with [`init_internal`]. Diagnostics are written under the [`INTERNAL_CATEGORY`] category so they can be told apart from application output.
*/

use core::fmt;
use std::sync::OnceLock;

use crate::{empty::Empty, level::Level, sink::Sink, well_known::INTERNAL_CATEGORY};

static INTERNAL: InternalSlot = InternalSlot::new();

/**
Get the internal diagnostics sink.

If [`init_internal`] hasn't been called this sink discards everything.
*/
pub fn internal() -> &'static (dyn Sink + Send + Sync) {
    INTERNAL.get()
}

/**
Get the slot the internal diagnostics sink lives in.
*/
pub fn internal_slot() -> &'static InternalSlot {
    &INTERNAL
}

/**
Initialize the internal diagnostics sink.

The sink can only be initialized once. If it's already been initialized this method returns `false` and the given sink is dropped.
*/
pub fn init_internal(sink: impl Sink + Send + Sync + 'static) -> bool {
    INTERNAL.init(sink)
}

/**
A slot that can be initialized with a [`Sink`] once.
*/
pub struct InternalSlot(OnceLock<Box<dyn Sink + Send + Sync>>);

impl InternalSlot {
    /**
    Create an uninitialized slot.
    */
    pub const fn new() -> Self {
        InternalSlot(OnceLock::new())
    }

    /**
    Initialize the slot.

    Returns `false` if the slot was already initialized.
    */
    pub fn init(&self, sink: impl Sink + Send + Sync + 'static) -> bool {
        self.0.set(Box::new(sink)).is_ok()
    }

    /**
    Whether the slot has been initialized.
    */
    pub fn is_initialized(&self) -> bool {
        self.0.get().is_some()
    }

    /**
    Get the sink in the slot, or an empty sink if it's uninitialized.
    */
    pub fn get(&self) -> &(dyn Sink + Send + Sync) {
        match self.0.get() {
            Some(sink) => &**sink,
            None => &Empty,
        }
    }
}

impl Default for InternalSlot {
    fn default() -> Self {
        Self::new()
    }
}

/**
A [`Sink`] that forwards to the internal diagnostics sink.

This is the default destination for diagnostics from the processor and channels.
*/
#[derive(Debug, Default, Clone, Copy)]
pub struct Internal;

impl Sink for Internal {
    fn write(&self, message: &str, level: Level, category: &str) {
        internal().write(message, level, category)
    }

    fn is_enabled(&self, level: Level) -> bool {
        internal().is_enabled(level)
    }

    fn blocking_flush(&self, timeout: core::time::Duration) -> bool {
        internal().blocking_flush(timeout)
    }
}

/**
Write a diagnostic to a sink under the internal category.

The message is only formatted if the sink is enabled for the level.
*/
pub(crate) fn diagnostic(sink: &(impl Sink + ?Sized), level: Level, msg: fmt::Arguments) {
    if sink.is_enabled(level) {
        sink.write(&msg.to_string(), level, INTERNAL_CATEGORY);
    }
}

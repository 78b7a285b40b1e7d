/*!
The [`Sink`] type.

A sink is a destination for formatted log messages, like the console or a third-party logging library. Sinks are resolved per target name through a [`SinkProvider`], which is usually a [`Targets`] map.

Sinks only need to support writing a message at a level under a category. Sinks that understand templates can also accept a template along with its parameters, in their own [`Dialect`].
*/

use core::time::Duration;
use std::{collections::HashMap, sync::Arc};

use crate::{
    empty::Empty, level::Level, template::Template, translate::Dialect, value::Params,
};

/**
A destination for formatted log messages.
*/
pub trait Sink {
    /**
    Write a message.
    */
    fn write(&self, message: &str, level: Level, category: &str);

    /**
    Whether messages at the given level would be written.
    */
    fn is_enabled(&self, level: Level) -> bool {
        let _ = level;

        true
    }

    /**
    The template dialect this sink understands.
    */
    fn dialect(&self) -> Dialect {
        Dialect::Structured
    }

    /**
    Write a template along with the parameters for its holes.

    The template is already in this sink's [`Sink::dialect`], and the parameters are in the order their holes appear. The default implementation renders the template and calls [`Sink::write`].
    */
    fn write_template(&self, template: &str, params: &Params, level: Level, category: &str) {
        match Template::parse(template) {
            Ok(tpl) => self.write(&tpl.render().with_props(params).to_string(), level, category),
            Err(_) => self.write(template, level, category),
        }
    }

    /**
    Wait for any buffered messages to be written.

    Returns whether the flush completed within the timeout.
    */
    fn blocking_flush(&self, timeout: Duration) -> bool {
        let _ = timeout;

        true
    }

    /**
    Write to both this sink and another.
    */
    fn and_to<U>(self, other: U) -> And<Self, U>
    where
        Self: Sized,
    {
        And {
            lhs: self,
            rhs: other,
        }
    }

    /**
    Only write messages at or above the given level.
    */
    fn with_min_level(self, min_level: Level) -> MinLevel<Self>
    where
        Self: Sized,
    {
        MinLevel {
            sink: self,
            min_level,
        }
    }
}

impl<'a, T: Sink + ?Sized> Sink for &'a T {
    fn write(&self, message: &str, level: Level, category: &str) {
        (**self).write(message, level, category)
    }

    fn is_enabled(&self, level: Level) -> bool {
        (**self).is_enabled(level)
    }

    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn write_template(&self, template: &str, params: &Params, level: Level, category: &str) {
        (**self).write_template(template, params, level, category)
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }
}

impl<T: Sink + ?Sized> Sink for Box<T> {
    fn write(&self, message: &str, level: Level, category: &str) {
        (**self).write(message, level, category)
    }

    fn is_enabled(&self, level: Level) -> bool {
        (**self).is_enabled(level)
    }

    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn write_template(&self, template: &str, params: &Params, level: Level, category: &str) {
        (**self).write_template(template, params, level, category)
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }
}

impl<T: Sink + ?Sized> Sink for Arc<T> {
    fn write(&self, message: &str, level: Level, category: &str) {
        (**self).write(message, level, category)
    }

    fn is_enabled(&self, level: Level) -> bool {
        (**self).is_enabled(level)
    }

    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn write_template(&self, template: &str, params: &Params, level: Level, category: &str) {
        (**self).write_template(template, params, level, category)
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }
}

impl<T: Sink> Sink for Option<T> {
    fn write(&self, message: &str, level: Level, category: &str) {
        match self {
            Some(sink) => sink.write(message, level, category),
            None => Empty.write(message, level, category),
        }
    }

    fn is_enabled(&self, level: Level) -> bool {
        match self {
            Some(sink) => sink.is_enabled(level),
            None => Empty.is_enabled(level),
        }
    }

    fn dialect(&self) -> Dialect {
        match self {
            Some(sink) => sink.dialect(),
            None => Empty.dialect(),
        }
    }

    fn write_template(&self, template: &str, params: &Params, level: Level, category: &str) {
        match self {
            Some(sink) => sink.write_template(template, params, level, category),
            None => Empty.write_template(template, params, level, category),
        }
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        match self {
            Some(sink) => sink.blocking_flush(timeout),
            None => Empty.blocking_flush(timeout),
        }
    }
}

impl Sink for Empty {
    fn write(&self, _: &str, _: Level, _: &str) {}

    fn is_enabled(&self, _: Level) -> bool {
        false
    }

    fn write_template(&self, _: &str, _: &Params, _: Level, _: &str) {}
}

/**
A [`Sink`] from a function.

See [`from_fn`].
*/
pub struct FromFn<F>(F);

impl<F: Fn(&str, Level, &str)> Sink for FromFn<F> {
    fn write(&self, message: &str, level: Level, category: &str) {
        (self.0)(message, level, category)
    }
}

/**
Create a [`Sink`] from a function that accepts a message, its level, and its category.
*/
pub fn from_fn<F: Fn(&str, Level, &str)>(f: F) -> FromFn<F> {
    FromFn(f)
}

/**
A [`Sink`] that writes to two others.

See [`Sink::and_to`].
*/
pub struct And<T, U> {
    lhs: T,
    rhs: U,
}

impl<T: Sink, U: Sink> Sink for And<T, U> {
    fn write(&self, message: &str, level: Level, category: &str) {
        if self.lhs.is_enabled(level) {
            self.lhs.write(message, level, category);
        }

        if self.rhs.is_enabled(level) {
            self.rhs.write(message, level, category);
        }
    }

    fn is_enabled(&self, level: Level) -> bool {
        self.lhs.is_enabled(level) || self.rhs.is_enabled(level)
    }

    fn dialect(&self) -> Dialect {
        // Sinks with different dialects share templates without markers
        if self.lhs.dialect() == self.rhs.dialect() {
            self.lhs.dialect()
        } else {
            Dialect::Plain
        }
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        let timeout = timeout / 2;

        let lhs = self.lhs.blocking_flush(timeout);
        let rhs = self.rhs.blocking_flush(timeout);

        lhs && rhs
    }
}

/**
A [`Sink`] that only writes messages at or above a minimum level.

See [`Sink::with_min_level`].
*/
pub struct MinLevel<T> {
    sink: T,
    min_level: Level,
}

impl<T: Sink> Sink for MinLevel<T> {
    fn write(&self, message: &str, level: Level, category: &str) {
        if self.is_enabled(level) {
            self.sink.write(message, level, category)
        }
    }

    fn is_enabled(&self, level: Level) -> bool {
        level >= self.min_level && self.sink.is_enabled(level)
    }

    fn dialect(&self) -> Dialect {
        self.sink.dialect()
    }

    fn write_template(&self, template: &str, params: &Params, level: Level, category: &str) {
        if self.is_enabled(level) {
            self.sink.write_template(template, params, level, category)
        }
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        self.sink.blocking_flush(timeout)
    }
}

/**
A shared, type-erased [`Sink`].
*/
pub type DynSink = Arc<dyn Sink + Send + Sync>;

/**
Resolves the [`Sink`] for a target name.
*/
pub trait SinkProvider {
    /**
    Get the sink for a target.
    */
    fn sink(&self, target: &str) -> Option<DynSink>;

    /**
    Wait for every sink to write its buffered messages.
    */
    fn blocking_flush(&self, timeout: Duration) -> bool;
}

impl<'a, T: SinkProvider + ?Sized> SinkProvider for &'a T {
    fn sink(&self, target: &str) -> Option<DynSink> {
        (**self).sink(target)
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }
}

impl<T: SinkProvider + ?Sized> SinkProvider for Arc<T> {
    fn sink(&self, target: &str) -> Option<DynSink> {
        (**self).sink(target)
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        (**self).blocking_flush(timeout)
    }
}

/**
A map of target names to [`Sink`]s, with a fallback for unnamed targets.
*/
#[derive(Clone, Default)]
pub struct Targets {
    targets: HashMap<String, DynSink>,
    fallback: Option<DynSink>,
}

impl Targets {
    /**
    Create an empty map with no fallback.
    */
    pub fn new() -> Self {
        Self::default()
    }

    /**
    Set the sink used for targets that aren't in the map.
    */
    pub fn with_fallback(mut self, sink: impl Sink + Send + Sync + 'static) -> Self {
        self.fallback = Some(Arc::new(sink));
        self
    }

    /**
    Set the sink used for a target.
    */
    pub fn with_target(
        mut self,
        target: impl Into<String>,
        sink: impl Sink + Send + Sync + 'static,
    ) -> Self {
        self.targets.insert(target.into(), Arc::new(sink));
        self
    }

    /**
    Whether the map has no sinks at all.
    */
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.fallback.is_none()
    }
}

impl SinkProvider for Targets {
    fn sink(&self, target: &str) -> Option<DynSink> {
        self.targets
            .get(target)
            .or(self.fallback.as_ref())
            .cloned()
    }

    fn blocking_flush(&self, timeout: Duration) -> bool {
        let sinks = self.targets.len() + usize::from(self.fallback.is_some());

        if sinks == 0 {
            return true;
        }

        let timeout = timeout / sinks as u32;

        let mut flushed = true;
        for sink in self.targets.values().chain(self.fallback.iter()) {
            flushed &= sink.blocking_flush(timeout);
        }

        flushed
    }
}

/*!
The [`LogEntry`] type.
*/

use core::time::Duration;

use time::OffsetDateTime;

use crate::{
    config::FormatterType,
    id::EntryId,
    level::Level,
    value::{Params, Value},
};

/**
A single intercepted call, ready to be formatted and written.

Entries are immutable once built. They're moved into a [`crate::LogChannel`] when they're enqueued.
*/
#[derive(Debug, Clone)]
pub struct LogEntry {
    id: EntryId,
    timestamp: OffsetDateTime,
    type_name: String,
    method_name: String,
    level: Level,
    exception_level: Level,
    input_parameters: Params,
    output_value: Option<Value>,
    exception_message: Option<String>,
    duration: Duration,
    target: Option<String>,
    template_name: Option<String>,
    formatter_type: Option<FormatterType>,
}

impl LogEntry {
    /**
    Start building an entry for a call to `type_name.method_name`.

    The entry gets a fresh id and the current time as its timestamp.
    */
    pub fn builder(type_name: impl Into<String>, method_name: impl Into<String>) -> LogEntryBuilder {
        LogEntryBuilder {
            entry: LogEntry {
                id: EntryId::new_v4(),
                timestamp: OffsetDateTime::now_utc(),
                type_name: type_name.into(),
                method_name: method_name.into(),
                level: Level::Info,
                exception_level: Level::Error,
                input_parameters: Params::new(),
                output_value: None,
                exception_message: None,
                duration: Duration::ZERO,
                target: None,
                template_name: None,
                formatter_type: None,
            },
        }
    }

    /**
    The unique id of the entry.
    */
    pub fn id(&self) -> EntryId {
        self.id
    }

    /**
    The time the call completed.
    */
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /**
    The name of the type declaring the called method.
    */
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /**
    The name of the called method.
    */
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /**
    The level to log a successful call at.
    */
    pub fn level(&self) -> Level {
        self.level
    }

    /**
    The level to log a failed call at.
    */
    pub fn exception_level(&self) -> Level {
        self.exception_level
    }

    /**
    The level this entry is logged at.

    This is the exception level if the call failed, and the level otherwise.
    */
    pub fn effective_level(&self) -> Level {
        if self.is_failure() {
            self.exception_level
        } else {
            self.level
        }
    }

    /**
    The captured arguments of the call.
    */
    pub fn input_parameters(&self) -> &Params {
        &self.input_parameters
    }

    /**
    The captured return value of the call.
    */
    pub fn output_value(&self) -> Option<&Value> {
        self.output_value.as_ref()
    }

    /**
    The error the call failed with.
    */
    pub fn exception_message(&self) -> Option<&str> {
        self.exception_message.as_deref()
    }

    /**
    Whether the call failed.
    */
    pub fn is_failure(&self) -> bool {
        self.exception_message.is_some()
    }

    /**
    How long the call took.
    */
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /**
    The target the entry is routed to, if it names one.
    */
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /**
    The name of the template to render, if the entry names one.
    */
    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    /**
    The formatter to use, if the entry names one.
    */
    pub fn formatter_type(&self) -> Option<FormatterType> {
        self.formatter_type
    }
}

/**
A builder for a [`LogEntry`].
*/
#[derive(Debug, Clone)]
pub struct LogEntryBuilder {
    entry: LogEntry,
}

impl LogEntryBuilder {
    /**
    Set the level to log a successful call at.
    */
    pub fn level(mut self, level: Level) -> Self {
        self.entry.level = level;
        self
    }

    /**
    Set the level to log a failed call at.
    */
    pub fn exception_level(mut self, level: Level) -> Self {
        self.entry.exception_level = level;
        self
    }

    /**
    Set the captured arguments.
    */
    pub fn input_parameters(mut self, input_parameters: Params) -> Self {
        self.entry.input_parameters = input_parameters;
        self
    }

    /**
    Set the captured return value.
    */
    pub fn output_value(mut self, output_value: impl Into<Value>) -> Self {
        self.entry.output_value = Some(output_value.into());
        self
    }

    /**
    Mark the call as failed with the given error.
    */
    pub fn exception_message(mut self, exception_message: impl Into<String>) -> Self {
        self.entry.exception_message = Some(exception_message.into());
        self
    }

    /**
    Set how long the call took.
    */
    pub fn duration(mut self, duration: Duration) -> Self {
        self.entry.duration = duration;
        self
    }

    /**
    Set the target to route the entry to.
    */
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.entry.target = Some(target.into());
        self
    }

    /**
    Set the name of the template to render.
    */
    pub fn template_name(mut self, template_name: impl Into<String>) -> Self {
        self.entry.template_name = Some(template_name.into());
        self
    }

    /**
    Set the formatter to use.
    */
    pub fn formatter_type(mut self, formatter_type: FormatterType) -> Self {
        self.entry.formatter_type = Some(formatter_type);
        self
    }

    /**
    Override the timestamp of the entry.
    */
    pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.entry.timestamp = timestamp;
        self
    }

    /**
    Finish building the entry.
    */
    pub fn build(self) -> LogEntry {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_level() {
        let ok = LogEntry::builder("Svc", "Do")
            .level(Level::Debug)
            .exception_level(Level::Warn)
            .build();

        assert!(!ok.is_failure());
        assert_eq!(Level::Debug, ok.effective_level());

        let failed = LogEntry::builder("Svc", "Do")
            .level(Level::Debug)
            .exception_level(Level::Warn)
            .exception_message("timed out")
            .build();

        assert!(failed.is_failure());
        assert_eq!(Level::Warn, failed.effective_level());
    }

    #[test]
    fn entries_get_unique_ids() {
        let a = LogEntry::builder("Svc", "Do").build();
        let b = LogEntry::builder("Svc", "Do").build();

        assert_ne!(a.id(), b.id());
    }
}

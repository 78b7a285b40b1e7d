/*!
Turning log entries into messages.

A [`Formatter`] turns a [`LogEntry`] into a [`FormattedMessage`]. Formatters never panic or return errors for well-formed entries; a formatter that can't produce a message returns a failed [`FormattedMessage`] instead.

Formatters are selected by their [`FormatterType`] through a [`FormatterFactory`], which can fall back to a default formatter when the requested one isn't registered.
*/

use std::collections::HashMap;

use time::format_description::well_known::Rfc3339;

use crate::{
    config::{FormatterType, LoggingConfig},
    entry::LogEntry,
    error::ConfigError,
    template::Props,
    value::{Params, Value},
    well_known::*,
};

mod json;
mod structured;
mod template;

pub use self::{json::JsonFormatter, structured::StructuredFormatter, template::TemplateFormatter};

/**
A strategy for turning a [`LogEntry`] into a message.
*/
pub trait Formatter {
    /**
    The type this formatter is registered under.
    */
    fn formatter_type(&self) -> FormatterType;

    /**
    Format the entry in the given context.
    */
    fn format(&self, ctx: &FormattingContext) -> FormattedMessage;
}

impl<'a, F: Formatter + ?Sized> Formatter for &'a F {
    fn formatter_type(&self) -> FormatterType {
        (**self).formatter_type()
    }

    fn format(&self, ctx: &FormattingContext) -> FormattedMessage {
        (**self).format(ctx)
    }
}

impl<F: Formatter + ?Sized> Formatter for Box<F> {
    fn formatter_type(&self) -> FormatterType {
        (**self).formatter_type()
    }

    fn format(&self, ctx: &FormattingContext) -> FormattedMessage {
        (**self).format(ctx)
    }
}

/**
The inputs to a single formatting attempt.
*/
#[derive(Debug, Clone, Copy)]
pub struct FormattingContext<'a> {
    entry: &'a LogEntry,
    config: &'a LoggingConfig,
    formatter_type: FormatterType,
    enable_fallback: bool,
    template_name: Option<&'a str>,
    render_message: bool,
}

impl<'a> FormattingContext<'a> {
    /**
    Create a context for an entry.

    The formatter type is the entry's if it names one, and the configured default otherwise.
    */
    pub fn new(entry: &'a LogEntry, config: &'a LoggingConfig) -> Self {
        FormattingContext {
            entry,
            config,
            formatter_type: entry
                .formatter_type()
                .unwrap_or(config.default_formatter_type()),
            enable_fallback: config.enable_fallback(),
            template_name: None,
            render_message: true,
        }
    }

    /**
    Request a specific formatter type.
    */
    pub fn with_formatter_type(mut self, formatter_type: FormatterType) -> Self {
        self.formatter_type = formatter_type;
        self
    }

    /**
    Set whether a missing formatter falls back to the default one.
    */
    pub fn with_enable_fallback(mut self, enable_fallback: bool) -> Self {
        self.enable_fallback = enable_fallback;
        self
    }

    /**
    Override the name of the template to render.
    */
    pub fn with_template_name(mut self, template_name: &'a str) -> Self {
        self.template_name = Some(template_name);
        self
    }

    /**
    Set whether templated formatters need to render their message.

    When this is `false` the template is written by the sink itself, so a formatter that returns a template may leave the message empty.
    */
    pub fn with_render_message(mut self, render_message: bool) -> Self {
        self.render_message = render_message;
        self
    }

    /**
    Whether templated formatters need to render their message.
    */
    pub fn render_message(&self) -> bool {
        self.render_message
    }

    /**
    The entry being formatted.
    */
    pub fn entry(&self) -> &'a LogEntry {
        self.entry
    }

    /**
    The active configuration.
    */
    pub fn config(&self) -> &'a LoggingConfig {
        self.config
    }

    /**
    The requested formatter type.
    */
    pub fn formatter_type(&self) -> FormatterType {
        self.formatter_type
    }

    /**
    Whether a missing formatter falls back to the default one.
    */
    pub fn enable_fallback(&self) -> bool {
        self.enable_fallback
    }

    /**
    The name of the template to render.

    This is the override if there is one, and the entry's template name otherwise.
    */
    pub fn template_name(&self) -> Option<&'a str> {
        self.template_name.or(self.entry.template_name())
    }

    /**
    Find the template to render.

    A named template must be configured. Without a name, the default template is used for successful calls and the exception template for failed ones.
    */
    pub fn resolve_template(&self) -> Result<&'a str, String> {
        match self.template_name() {
            Some(name) => self
                .config
                .template(name)
                .ok_or_else(|| format!("the template `{}` is not defined", name)),
            None if self.entry.is_failure() => Ok(self.config.exception_template()),
            None => Ok(self.config.default_template()),
        }
    }
}

/**
The result of formatting a [`LogEntry`].
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedMessage {
    message: String,
    template: Option<String>,
    is_success: bool,
    is_fallback: bool,
    error_message: Option<String>,
}

impl FormattedMessage {
    /**
    A successfully formatted message.

    The template is the neutral template the message was rendered from, if there was one.
    */
    pub fn success(message: impl Into<String>, template: Option<String>) -> Self {
        FormattedMessage {
            message: message.into(),
            template,
            is_success: true,
            is_fallback: false,
            error_message: None,
        }
    }

    /**
    A message that couldn't be formatted.
    */
    pub fn failure(error_message: impl Into<String>) -> Self {
        FormattedMessage {
            message: String::new(),
            template: None,
            is_success: false,
            is_fallback: false,
            error_message: Some(error_message.into()),
        }
    }

    /**
    Record that the message was produced by a fallback formatter.

    A failed message stays failed; only successful messages are marked as fallbacks.
    */
    pub fn with_fallback(mut self, reason: impl Into<String>) -> Self {
        if self.is_success {
            self.is_fallback = true;
            self.error_message = Some(reason.into());
        }

        self
    }

    /**
    The formatted message.
    */
    pub fn message(&self) -> &str {
        &self.message
    }

    /**
    The neutral template the message was rendered from.
    */
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /**
    Whether formatting succeeded.
    */
    pub fn is_success(&self) -> bool {
        self.is_success
    }

    /**
    Whether the message came from a fallback formatter.
    */
    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    /**
    Why formatting failed, or why a fallback was used.
    */
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/**
The registered [`Formatter`]s, keyed by their type.

The set of formatters is fixed when the factory is created.
*/
pub struct FormatterFactory {
    formatters: HashMap<FormatterType, Box<dyn Formatter + Send + Sync>>,
    default: FormatterType,
}

impl FormatterFactory {
    /**
    Create a factory from a set of formatters.

    The set must not be empty, and no two formatters may share a type. The default formatter is the [`FormatterType::Structured`] one if it's registered, and the first registered formatter otherwise.
    */
    pub fn new(
        formatters: impl IntoIterator<Item = Box<dyn Formatter + Send + Sync>>,
    ) -> Result<Self, ConfigError> {
        let mut registered = HashMap::new();
        let mut first = None;

        for formatter in formatters {
            let ty = formatter.formatter_type();

            if registered.contains_key(&ty) {
                return Err(ConfigError::DuplicateFormatter(ty));
            }

            first.get_or_insert(ty);
            registered.insert(ty, formatter);
        }

        let Some(first) = first else {
            return Err(ConfigError::NoFormatters);
        };

        let default = if registered.contains_key(&FormatterType::Structured) {
            FormatterType::Structured
        } else {
            first
        };

        Ok(FormatterFactory {
            formatters: registered,
            default,
        })
    }

    /**
    Create a factory with the built-in structured, JSON, and template formatters.
    */
    pub fn builtin() -> Self {
        let mut formatters: HashMap<FormatterType, Box<dyn Formatter + Send + Sync>> =
            HashMap::new();

        formatters.insert(FormatterType::Structured, Box::new(StructuredFormatter::new()));
        formatters.insert(FormatterType::Json, Box::new(JsonFormatter::new()));
        formatters.insert(FormatterType::Template, Box::new(TemplateFormatter::new()));

        FormatterFactory {
            formatters,
            default: FormatterType::Structured,
        }
    }

    /**
    Get the formatter for a context.

    If the requested formatter is registered it's returned along with `false`. Otherwise, if fallback is enabled, the default formatter is returned along with `true`. If fallback is disabled an error is returned.
    */
    pub fn get_formatter(
        &self,
        ctx: &FormattingContext,
    ) -> Result<(&(dyn Formatter + Send + Sync), bool), ConfigError> {
        if let Some(formatter) = self.formatters.get(&ctx.formatter_type()) {
            return Ok((&**formatter, false));
        }

        if ctx.enable_fallback() {
            if let Some(formatter) = self.formatters.get(&self.default) {
                return Ok((&**formatter, true));
            }
        }

        Err(ConfigError::FormatterNotFound {
            requested: ctx.formatter_type(),
            enable_fallback: ctx.enable_fallback(),
        })
    }

    /**
    Whether a formatter is registered for the given type.
    */
    pub fn contains(&self, formatter_type: FormatterType) -> bool {
        self.formatters.contains_key(&formatter_type)
    }

    /**
    The type of the formatter used as a fallback.
    */
    pub fn default_formatter_type(&self) -> FormatterType {
        self.default
    }
}

/**
The fields of a [`LogEntry`] as [`Props`] for rendering templates.

The well-known fields are always present, with absent optional fields as null. Each input parameter is also available under its own name.
*/
#[derive(Debug, Clone, Copy)]
pub struct EntryProps<'a>(&'a LogEntry);

impl<'a> EntryProps<'a> {
    /**
    Expose the fields of an entry.
    */
    pub fn new(entry: &'a LogEntry) -> Self {
        EntryProps(entry)
    }

    /**
    Collect the well-known fields and input parameters into a set of parameters.
    */
    pub fn to_params(&self) -> Params {
        let mut params = Params::with_capacity(WELL_KNOWN.len() + self.0.input_parameters().len());

        for key in WELL_KNOWN {
            if let Some(value) = self.well_known(key) {
                params.insert(key, value);
            }
        }

        for (name, value) in self.0.input_parameters().iter() {
            if !params.contains(name) {
                params.insert(name, value.clone());
            }
        }

        params
    }

    fn well_known(&self, label: &str) -> Option<Value> {
        let entry = self.0;

        Some(match label {
            KEY_ID => Value::display(entry.id()),
            KEY_TIMESTAMP => timestamp(entry),
            KEY_TYPE_NAME => Value::from(entry.type_name()),
            KEY_METHOD_NAME => Value::from(entry.method_name()),
            KEY_LEVEL => Value::from(entry.effective_level().as_str()),
            KEY_INPUT_PARAMETERS => Value::Map(entry.input_parameters().clone()),
            KEY_OUTPUT_VALUE => entry.output_value().cloned().unwrap_or_default(),
            KEY_EXCEPTION_MESSAGE => Value::from(entry.exception_message()),
            KEY_DURATION => Value::F64(duration_ms(entry)),
            KEY_TARGET => Value::from(entry.target()),
            _ => return None,
        })
    }
}

impl<'a> Props for EntryProps<'a> {
    fn get(&self, label: &str) -> Option<Value> {
        self.well_known(label)
            .or_else(|| self.0.input_parameters().get(label).cloned())
    }
}

const WELL_KNOWN: [&str; 10] = [
    KEY_ID,
    KEY_TIMESTAMP,
    KEY_TYPE_NAME,
    KEY_METHOD_NAME,
    KEY_LEVEL,
    KEY_INPUT_PARAMETERS,
    KEY_OUTPUT_VALUE,
    KEY_EXCEPTION_MESSAGE,
    KEY_DURATION,
    KEY_TARGET,
];

pub(crate) fn duration_ms(entry: &LogEntry) -> f64 {
    entry.duration().as_nanos() as f64 / 1_000_000.0
}

pub(crate) fn format_timestamp(entry: &LogEntry) -> Option<String> {
    entry.timestamp().format(&Rfc3339).ok()
}

fn timestamp(entry: &LogEntry) -> Value {
    format_timestamp(entry).map(Value::Str).unwrap_or_default()
}

/*!
The [`Setup`] type.

`Setup` wires the pipeline together: a [`DecisionCache`] for intercepted methods, a [`LogChannel`] to queue entries on, and a [`Processor`] that formats them and writes them to sinks.
*/

use core::time::Duration;
use std::{sync::Arc, time::Instant};

use autolog_batcher::Metric;

use crate::{
    channel::{BackgroundChannel, DirectChannel, LogChannel},
    config::{AttributeTable, LogAttribute, LoggingConfig, MethodRule},
    decision::DecisionCache,
    error::{ConfigError, SetupError},
    format::{Formatter, FormatterFactory, JsonFormatter, StructuredFormatter, TemplateFormatter},
    intercept::Interceptor,
    processor::Processor,
    sink::{DynSink, Sink, SinkProvider, Targets},
};

/**
The number of entries a background channel buffers by default.
*/
pub const DEFAULT_CAPACITY: usize = 10_000;

/**
A builder for the logging pipeline.
*/
pub struct Setup {
    config: LoggingConfig,
    attributes: AttributeTable,
    targets: Targets,
    sinks: Option<Arc<dyn SinkProvider + Send + Sync>>,
    formatters: Vec<Box<dyn Formatter + Send + Sync>>,
    capacity: usize,
    direct: bool,
    diagnostics: Option<DynSink>,
}

impl Default for Setup {
    fn default() -> Self {
        Self::new()
    }
}

impl Setup {
    /**
    Create a builder with the default configuration, the built-in formatters, and no sinks.
    */
    pub fn new() -> Self {
        Setup {
            config: LoggingConfig::new(),
            attributes: AttributeTable::new(),
            targets: Targets::new(),
            sinks: None,
            formatters: vec![
                Box::new(StructuredFormatter::new()),
                Box::new(JsonFormatter::new()),
                Box::new(TemplateFormatter::new()),
            ],
            capacity: DEFAULT_CAPACITY,
            direct: false,
            diagnostics: None,
        }
    }

    /**
    Use the given configuration.
    */
    pub fn config(mut self, config: LoggingConfig) -> Self {
        self.config = config;
        self
    }

    /**
    Use the given attributes declared on types and methods.
    */
    pub fn attributes(mut self, attributes: AttributeTable) -> Self {
        self.attributes = attributes;
        self
    }

    /**
    Write entries for any target without its own sink to the given sink.
    */
    pub fn sink(mut self, sink: impl Sink + Send + Sync + 'static) -> Self {
        self.targets = self.targets.with_fallback(sink);
        self
    }

    /**
    Write entries for the given target to the given sink.
    */
    pub fn target(
        mut self,
        target: impl Into<String>,
        sink: impl Sink + Send + Sync + 'static,
    ) -> Self {
        self.targets = self.targets.with_target(target, sink);
        self
    }

    /**
    Resolve sinks through the given provider.

    This replaces any sinks set through [`Setup::sink`] or [`Setup::target`].
    */
    pub fn sinks(mut self, sinks: impl SinkProvider + Send + Sync + 'static) -> Self {
        self.sinks = Some(Arc::new(sinks));
        self
    }

    /**
    Register a formatter, replacing any already registered for its type.
    */
    pub fn formatter(mut self, formatter: impl Formatter + Send + Sync + 'static) -> Self {
        let ty = formatter.formatter_type();

        self.formatters.retain(|registered| registered.formatter_type() != ty);
        self.formatters.push(Box::new(formatter));

        self
    }

    /**
    Register exactly the given formatters, replacing the built-in ones.
    */
    pub fn formatters(
        mut self,
        formatters: impl IntoIterator<Item = Box<dyn Formatter + Send + Sync>>,
    ) -> Self {
        self.formatters = formatters.into_iter().collect();
        self
    }

    /**
    Buffer at most `capacity` entries between batches.
    */
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /**
    Process entries on the calling thread instead of a background worker.
    */
    pub fn direct(mut self) -> Self {
        self.direct = true;
        self
    }

    /**
    Write diagnostics to the given sink instead of the internal runtime sink.
    */
    pub fn diagnostics(mut self, sink: impl Sink + Send + Sync + 'static) -> Self {
        self.diagnostics = Some(Arc::new(sink));
        self
    }

    /**
    Validate the configuration and start the pipeline.
    */
    #[must_use = "call `close(std::time::Duration::from_secs(5))` at the end of `main` to ensure entries are written."]
    pub fn spawn(self) -> Result<Init, SetupError> {
        self.config.validate(&self.attributes)?;

        let formatters = FormatterFactory::new(self.formatters)?;

        if !self.config.enable_fallback() {
            let requested = self
                .config
                .rules()
                .iter()
                .map(MethodRule::attribute)
                .chain(self.attributes.attributes())
                .filter_map(LogAttribute::formatter_type)
                .chain(Some(self.config.default_formatter_type()));

            for formatter_type in requested {
                if !formatters.contains(formatter_type) {
                    return Err(ConfigError::FormatterNotFound {
                        requested: formatter_type,
                        enable_fallback: false,
                    }
                    .into());
                }
            }
        }

        let config = Arc::new(self.config);
        let attributes = Arc::new(self.attributes);

        let sinks: Arc<dyn SinkProvider + Send + Sync> = match self.sinks {
            Some(sinks) => sinks,
            None => Arc::new(self.targets),
        };

        let mut processor = Processor::new(config.clone(), formatters, sinks);
        if let Some(diagnostics) = self.diagnostics.clone() {
            processor = processor.with_diagnostics(diagnostics);
        }

        let processor = Arc::new(processor);

        let channel: Arc<dyn LogChannel + Send + Sync> = if self.direct {
            Arc::new(DirectChannel::new(processor.clone()))
        } else {
            let mut channel = BackgroundChannel::spawn(self.capacity, processor.clone())?;
            if let Some(diagnostics) = self.diagnostics {
                channel = channel.with_diagnostics(diagnostics);
            }

            Arc::new(channel)
        };

        let decisions = Arc::new(DecisionCache::new(config, attributes));

        Ok(Init {
            interceptor: Interceptor::new(decisions, channel.clone()),
            channel,
            processor,
        })
    }
}

/**
The result of calling [`Setup::spawn`].

Call [`Init::close`] before the program exits so buffered entries are written.
*/
pub struct Init {
    interceptor: Interceptor,
    channel: Arc<dyn LogChannel + Send + Sync>,
    processor: Arc<Processor>,
}

impl Init {
    /**
    The interceptor to record calls with.
    */
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /**
    The channel entries are queued on.
    */
    pub fn channel(&self) -> &(dyn LogChannel + Send + Sync) {
        &*self.channel
    }

    /**
    The processor entries are handed to.
    */
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /**
    Wait for every entry recorded before this call to be written.

    Returns whether the flush completed within the timeout.
    */
    pub fn blocking_flush(&self, timeout: Duration) -> bool {
        let start = Instant::now();

        self.channel.blocking_flush(timeout)
            && self
                .processor
                .blocking_flush(timeout.saturating_sub(start.elapsed()))
    }

    /**
    Stop accepting entries and wait up to `timeout` for buffered ones to be written.
    */
    pub fn close(&self, timeout: Duration) {
        let start = Instant::now();

        self.channel.close(timeout);
        self.processor
            .blocking_flush(timeout.saturating_sub(start.elapsed()));
    }

    /**
    Sample the current values of the pipeline's internal metrics.
    */
    pub fn sample_metrics(&self) -> Vec<Metric> {
        let mut metrics = self.channel.sample_metrics();
        metrics.extend(self.processor.sample_metrics());

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{config::FormatterType, empty::Empty};

    #[test]
    fn spawn_rejects_invalid_rules() {
        let err = Setup::new()
            .config(LoggingConfig::new().with_rule(MethodRule::new("Svc.{Do}")))
            .direct()
            .spawn()
            .err()
            .unwrap();

        assert!(matches!(
            err,
            SetupError::Config(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn spawn_rejects_empty_formatters() {
        let err = Setup::new()
            .formatters(Vec::<Box<dyn Formatter + Send + Sync>>::new())
            .direct().spawn().err().unwrap();

        assert!(matches!(err, SetupError::Config(ConfigError::NoFormatters)));
    }

    #[test]
    fn spawn_rejects_unresolvable_default_formatter() {
        let err = Setup::new()
            .config(
                LoggingConfig::new()
                    .with_default_formatter_type(FormatterType::Json)
                    .with_enable_fallback(false),
            )
            .formatters([Box::new(StructuredFormatter::new()) as Box<dyn Formatter + Send + Sync>])
            .direct()
            .spawn()
            .err()
            .unwrap();

        assert!(matches!(
            err,
            SetupError::Config(ConfigError::FormatterNotFound {
                requested: FormatterType::Json,
                enable_fallback: false,
            })
        ));
    }

    #[test]
    fn spawn_rejects_unregistered_rule_formatter() {
        let only_structured =
            || [Box::new(StructuredFormatter::new()) as Box<dyn Formatter + Send + Sync>];

        let err = Setup::new()
            .config(
                LoggingConfig::new()
                    .with_enable_fallback(false)
                    .with_rule(MethodRule::with_attribute(
                        "Svc.*",
                        LogAttribute::new().with_formatter_type(FormatterType::Json),
                    )),
            )
            .formatters(only_structured())
            .direct()
            .spawn()
            .err()
            .unwrap();

        assert!(matches!(
            err,
            SetupError::Config(ConfigError::FormatterNotFound {
                requested: FormatterType::Json,
                enable_fallback: false,
            })
        ));

        let err = Setup::new()
            .config(LoggingConfig::new().with_enable_fallback(false))
            .attributes(AttributeTable::new().with_method(
                "Svc",
                "Do",
                LogAttribute::new().with_formatter_type(FormatterType::Template),
            ))
            .formatters(only_structured())
            .direct()
            .spawn()
            .err()
            .unwrap();

        assert!(matches!(
            err,
            SetupError::Config(ConfigError::FormatterNotFound {
                requested: FormatterType::Template,
                enable_fallback: false,
            })
        ));

        // With fallback enabled the same rule resolves to the default formatter
        let init = Setup::new()
            .config(LoggingConfig::new().with_rule(MethodRule::with_attribute(
                "Svc.*",
                LogAttribute::new().with_formatter_type(FormatterType::Json),
            )))
            .formatters(only_structured())
            .direct()
            .spawn()
            .unwrap();

        init.close(Duration::from_secs(1));
    }

    #[test]
    fn formatter_replaces_builtin() {
        let setup = Setup::new().formatter(JsonFormatter::new());

        assert_eq!(3, setup.formatters.len());
    }

    #[test]
    fn spawn_direct() {
        let init = Setup::new().sink(Empty).direct().spawn().unwrap();

        init.close(Duration::from_secs(1));

        assert_eq!(
            crate::channel::ChannelState::Closed,
            init.channel().state()
        );
    }
}

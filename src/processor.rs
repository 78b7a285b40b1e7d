/*!
The [`Processor`] type.

The processor is the consumer side of the pipeline. For each entry it resolves the sink for the entry's target, checks the sink wants the entry's level, formats the entry, and writes the result. Templated messages are translated into the sink's dialect before they're written.

Nothing that goes wrong while processing an entry escapes [`Processor::process_entry`]. Configuration errors, failed formatting, and panics are reported to the diagnostics sink and the processor moves on to the next entry.
*/

use core::time::Duration;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use autolog_batcher::Metric;
use dashmap::DashMap;

use crate::{
    config::LoggingConfig,
    entry::LogEntry,
    error::ConfigError,
    format::{EntryProps, FormatterFactory, FormattingContext},
    internal_metrics::InternalMetrics,
    level::Level,
    runtime::{self, diagnostic},
    sink::{DynSink, Sink, SinkProvider},
    translate::{Dialect, TemplateTranslator},
};

/**
Formats [`LogEntry`]s and writes them to their sinks.
*/
pub struct Processor {
    config: Arc<LoggingConfig>,
    formatters: FormatterFactory,
    sinks: Arc<dyn SinkProvider + Send + Sync>,
    resolved: DashMap<String, Option<DynSink>>,
    translators: Translators,
    diagnostics: DynSink,
    metrics: InternalMetrics,
}

struct Translators {
    structured: TemplateTranslator,
    rust: TemplateTranslator,
    plain: TemplateTranslator,
}

impl Translators {
    fn new() -> Self {
        Translators {
            structured: TemplateTranslator::new(Dialect::Structured),
            rust: TemplateTranslator::new(Dialect::Rust),
            plain: TemplateTranslator::new(Dialect::Plain),
        }
    }

    fn get(&self, dialect: Dialect) -> &TemplateTranslator {
        match dialect {
            Dialect::Structured => &self.structured,
            Dialect::Rust => &self.rust,
            Dialect::Plain => &self.plain,
        }
    }
}

enum Processed {
    Written,
    Skipped,
}

impl Processor {
    /**
    Create a processor.

    Diagnostics are written to the internal runtime sink; see [`crate::runtime`].
    */
    pub fn new(
        config: Arc<LoggingConfig>,
        formatters: FormatterFactory,
        sinks: impl SinkProvider + Send + Sync + 'static,
    ) -> Self {
        Processor {
            config,
            formatters,
            sinks: Arc::new(sinks),
            resolved: DashMap::new(),
            translators: Translators::new(),
            diagnostics: Arc::new(runtime::Internal),
            metrics: InternalMetrics::default(),
        }
    }

    /**
    Write diagnostics to the given sink instead of the internal runtime sink.
    */
    pub fn with_diagnostics(mut self, sink: impl Sink + Send + Sync + 'static) -> Self {
        self.diagnostics = Arc::new(sink);
        self
    }

    /**
    Process an entry.

    This method never panics.
    */
    pub fn process_entry(&self, entry: &LogEntry) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.try_process_entry(entry))) {
            Ok(Ok(Processed::Written)) => self.metrics.entry_processed.increment(),
            Ok(Ok(Processed::Skipped)) => self.metrics.entry_skipped.increment(),
            Ok(Err(err)) => {
                self.metrics.entry_failed.increment();

                diagnostic(
                    &*self.diagnostics,
                    Level::Error,
                    format_args!(
                        "failed to process entry {} for {}.{}: {}",
                        entry.id(),
                        entry.type_name(),
                        entry.method_name(),
                        err
                    ),
                );
            }
            Err(panic) => {
                self.metrics.entry_failed.increment();

                diagnostic(
                    &*self.diagnostics,
                    Level::Error,
                    format_args!(
                        "panicked while processing entry {} for {}.{}: {}",
                        entry.id(),
                        entry.type_name(),
                        entry.method_name(),
                        panic_message(&*panic)
                    ),
                );
            }
        }
    }

    fn try_process_entry(&self, entry: &LogEntry) -> Result<Processed, ConfigError> {
        let mut ctx = FormattingContext::new(entry, &self.config);
        if let Some(template_name) = entry.template_name() {
            ctx = ctx.with_template_name(template_name);
        }

        let target = entry.target().unwrap_or(self.config.default_target());

        let Some(sink) = self.resolve_sink(target) else {
            return Ok(Processed::Skipped);
        };

        let level = entry.effective_level();
        if !sink.is_enabled(level) {
            return Ok(Processed::Skipped);
        }

        // The sink renders forwarded templates itself
        let ctx = ctx.with_render_message(false);

        let (formatter, is_fallback) = self.formatters.get_formatter(&ctx)?;

        let mut formatted = formatter.format(&ctx);

        if is_fallback {
            self.metrics.format_fallback.increment();

            formatted = formatted.with_fallback(format!(
                "no formatter is registered for `{}`",
                ctx.formatter_type()
            ));

            diagnostic(
                &*self.diagnostics,
                Level::Debug,
                format_args!(
                    "formatted entry {} for {}.{} with `{}` because no formatter is registered for `{}`",
                    entry.id(),
                    entry.type_name(),
                    entry.method_name(),
                    formatter.formatter_type(),
                    ctx.formatter_type()
                ),
            );
        }

        if !formatted.is_success() {
            self.metrics.format_failed.increment();

            let message = format!(
                "{}.{} (formatting failed: {})",
                entry.type_name(),
                entry.method_name(),
                formatted.error_message().unwrap_or("unknown error")
            );

            sink.write(&message, level, target);

            return Ok(Processed::Written);
        }

        match formatted.template().filter(|template| !template.is_empty()) {
            Some(template) => {
                let translator = self.translators.get(sink.dialect());

                let template = translator.translate_template(Some(template));
                let params =
                    translator.translate_parameters(&EntryProps::new(entry).to_params(), &template);

                sink.write_template(&template, &params, level, target);
            }
            None => sink.write(formatted.message(), level, target),
        }

        Ok(Processed::Written)
    }

    fn resolve_sink(&self, target: &str) -> Option<DynSink> {
        if let Some(sink) = self.resolved.get(target) {
            return sink.value().clone();
        }

        let sink = self.sinks.sink(target);

        self.resolved
            .entry(target.to_owned())
            .or_insert(sink)
            .value()
            .clone()
    }

    /**
    Wait for every sink to write its buffered messages.
    */
    pub fn blocking_flush(&self, timeout: Duration) -> bool {
        self.sinks.blocking_flush(timeout)
    }

    /**
    The active configuration.
    */
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /**
    Sample the current values of the processor's internal metrics.
    */
    pub fn sample_metrics(&self) -> impl Iterator<Item = Metric> + 'static {
        self.metrics.sample()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use crate::{
        config::FormatterType,
        format::{FormattedMessage, Formatter, JsonFormatter, StructuredFormatter},
        sink::{self, Targets},
        value::Params,
        well_known::INTERNAL_CATEGORY,
    };

    type Written = Arc<Mutex<Vec<(String, Level, String)>>>;

    fn capture() -> (Written, impl Sink + Send + Sync + 'static) {
        let written: Written = Default::default();

        let sink = sink::from_fn({
            let written = written.clone();

            move |message: &str, level, category: &str| {
                written
                    .lock()
                    .unwrap()
                    .push((message.to_owned(), level, category.to_owned()));
            }
        });

        (written, sink)
    }

    fn messages(written: &Written) -> Vec<String> {
        written
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _, _)| message.clone())
            .collect()
    }

    fn metric(processor: &Processor, name: &str) -> usize {
        processor
            .sample_metrics()
            .find(|metric| metric.name == name)
            .map(|metric| metric.value)
            .unwrap_or_default()
    }

    struct Panicking;

    impl Formatter for Panicking {
        fn formatter_type(&self) -> FormatterType {
            FormatterType::Json
        }

        fn format(&self, _: &FormattingContext) -> FormattedMessage {
            panic!("the formatter exploded")
        }
    }

    fn processor(config: LoggingConfig, targets: Targets) -> Processor {
        Processor::new(Arc::new(config), FormatterFactory::builtin(), targets)
    }

    #[test]
    fn process_writes_to_default_target() {
        let (written, sink) = capture();

        let processor = processor(
            LoggingConfig::new().with_default_template("{MethodName} {InputParameters}"),
            Targets::new().with_fallback(sink),
        );

        processor.process_entry(
            &LogEntry::builder("Svc", "Do")
                .input_parameters(Params::new().with("x", 1))
                .build(),
        );

        assert_eq!(
            vec![(
                "Do {x: 1}".to_owned(),
                Level::Info,
                crate::well_known::DEFAULT_TARGET.to_owned()
            )],
            *written.lock().unwrap()
        );
        assert_eq!(1, metric(&processor, "entry_processed"));
    }

    #[test]
    fn process_routes_by_target() {
        let (orders, orders_sink) = capture();
        let (fallback, fallback_sink) = capture();

        let processor = processor(
            LoggingConfig::new().with_default_template("{MethodName}"),
            Targets::new()
                .with_target("orders", orders_sink)
                .with_fallback(fallback_sink),
        );

        processor.process_entry(&LogEntry::builder("Orders", "Place").target("orders").build());
        processor.process_entry(&LogEntry::builder("Users", "Get").build());

        assert_eq!(vec!["Place"], messages(&orders));
        assert_eq!(vec!["Get"], messages(&fallback));
    }

    #[test]
    fn process_skips_disabled_levels() {
        let (written, sink) = capture();

        let processor = processor(
            LoggingConfig::new(),
            Targets::new().with_fallback(sink.with_min_level(Level::Warn)),
        );

        processor.process_entry(&LogEntry::builder("Svc", "Do").build());
        processor.process_entry(
            &LogEntry::builder("Svc", "Do")
                .exception_message("failed")
                .build(),
        );

        let written = written.lock().unwrap();

        assert_eq!(1, written.len());
        assert_eq!(Level::Error, written[0].1);
        assert_eq!(1, metric(&processor, "entry_skipped"));
    }

    #[test]
    fn process_skips_missing_sinks() {
        let processor = processor(LoggingConfig::new(), Targets::new());

        processor.process_entry(&LogEntry::builder("Svc", "Do").build());

        assert_eq!(1, metric(&processor, "entry_skipped"));
    }

    #[test]
    fn process_translates_for_the_sink_dialect() {
        struct RustSink(Written);

        impl Sink for RustSink {
            fn write(&self, message: &str, level: Level, category: &str) {
                self.0
                    .lock()
                    .unwrap()
                    .push((message.to_owned(), level, category.to_owned()));
            }

            fn dialect(&self) -> Dialect {
                Dialect::Rust
            }

            fn write_template(&self, template: &str, params: &Params, level: Level, category: &str) {
                self.write(
                    &format!("{} {:?}", template, params.names().collect::<Vec<_>>()),
                    level,
                    category,
                )
            }
        }

        let written: Written = Default::default();

        let processor = processor(
            LoggingConfig::new().with_default_template("{MethodName} took {Duration} with {@InputParameters}"),
            Targets::new().with_fallback(RustSink(written.clone())),
        );

        processor.process_entry(&LogEntry::builder("Svc", "Do").build());

        assert_eq!(
            vec!["{MethodName} took {Duration:.2} with {InputParameters:?} [\"MethodName\", \"Duration\", \"InputParameters\"]"],
            messages(&written)
        );
    }

    #[test]
    fn process_writes_json_without_template() {
        let (written, sink) = capture();

        let processor = processor(
            LoggingConfig::new().with_default_formatter_type(FormatterType::Json),
            Targets::new().with_fallback(sink),
        );

        processor.process_entry(&LogEntry::builder("Svc", "Do").build());

        let messages = messages(&written);

        assert_eq!(1, messages.len());
        assert!(messages[0].starts_with("{\"Id\":"));
    }

    #[test]
    fn process_reports_fallback() {
        let (written, sink) = capture();
        let (diagnostics, diagnostics_sink) = capture();

        let processor = Processor::new(
            Arc::new(LoggingConfig::new().with_default_template("{MethodName}")),
            FormatterFactory::new(vec![
                Box::new(StructuredFormatter::new()) as Box<dyn Formatter + Send + Sync>
            ])
            .unwrap(),
            Targets::new().with_fallback(sink),
        )
        .with_diagnostics(diagnostics_sink);

        processor.process_entry(
            &LogEntry::builder("Svc", "Do")
                .formatter_type(FormatterType::Json)
                .build(),
        );

        assert_eq!(vec!["Do"], messages(&written));
        assert_eq!(1, metric(&processor, "format_fallback"));

        let diagnostics = diagnostics.lock().unwrap();
        assert_eq!(1, diagnostics.len());
        assert_eq!(Level::Debug, diagnostics[0].1);
        assert_eq!(INTERNAL_CATEGORY, diagnostics[0].2);
    }

    #[test]
    fn process_writes_fallback_line_on_failed_format() {
        let (written, sink) = capture();

        let processor = processor(
            LoggingConfig::new().with_default_formatter_type(FormatterType::Template),
            Targets::new().with_fallback(sink),
        );

        processor.process_entry(
            &LogEntry::builder("Svc", "Do")
                .template_name("missing")
                .build(),
        );

        let messages = messages(&written);

        assert_eq!(1, messages.len());
        assert!(messages[0].starts_with("Svc.Do (formatting failed: "));
        assert_eq!(1, metric(&processor, "format_failed"));
    }

    #[test]
    fn process_leaves_forwarded_templates_to_the_sink() {
        struct Recording(Arc<Mutex<Vec<bool>>>);

        impl Formatter for Recording {
            fn formatter_type(&self) -> FormatterType {
                FormatterType::Structured
            }

            fn format(&self, ctx: &FormattingContext) -> FormattedMessage {
                self.0.lock().unwrap().push(ctx.render_message());

                FormattedMessage::success("", Some("{MethodName}".to_owned()))
            }
        }

        let (written, sink) = capture();
        let rendered = Arc::new(Mutex::new(Vec::new()));

        let processor = Processor::new(
            Arc::new(LoggingConfig::new()),
            FormatterFactory::new(vec![
                Box::new(Recording(rendered.clone())) as Box<dyn Formatter + Send + Sync>
            ])
            .unwrap(),
            Targets::new().with_fallback(sink),
        );

        processor.process_entry(&LogEntry::builder("Svc", "Do").build());

        assert_eq!(vec![false], *rendered.lock().unwrap());
        assert_eq!(vec!["Do"], messages(&written));
    }

    #[test]
    fn process_isolates_panics() {
        let (written, sink) = capture();
        let (diagnostics, diagnostics_sink) = capture();

        let processor = Processor::new(
            Arc::new(LoggingConfig::new().with_default_template("{MethodName}")),
            FormatterFactory::new(vec![
                Box::new(StructuredFormatter::new()) as Box<dyn Formatter + Send + Sync>,
                Box::new(Panicking),
            ])
            .unwrap(),
            Targets::new().with_fallback(sink),
        )
        .with_diagnostics(diagnostics_sink);

        processor.process_entry(
            &LogEntry::builder("Svc", "Explode")
                .formatter_type(FormatterType::Json)
                .build(),
        );
        processor.process_entry(&LogEntry::builder("Svc", "Next").build());

        assert_eq!(vec!["Next"], messages(&written));
        assert_eq!(1, metric(&processor, "entry_failed"));
        assert_eq!(1, metric(&processor, "entry_processed"));

        let diagnostics = messages(&diagnostics);
        assert_eq!(1, diagnostics.len());
        assert!(diagnostics[0].contains("the formatter exploded"));
    }

    #[test]
    fn process_reports_config_errors() {
        let (written, sink) = capture();
        let (diagnostics, diagnostics_sink) = capture();

        let processor = Processor::new(
            Arc::new(LoggingConfig::new().with_enable_fallback(false)),
            FormatterFactory::new(vec![
                Box::new(JsonFormatter::new()) as Box<dyn Formatter + Send + Sync>
            ])
            .unwrap(),
            Targets::new().with_fallback(sink),
        )
        .with_diagnostics(diagnostics_sink);

        processor.process_entry(&LogEntry::builder("Svc", "Do").build());

        assert!(written.lock().unwrap().is_empty());
        assert_eq!(1, metric(&processor, "entry_failed"));

        let diagnostics = diagnostics.lock().unwrap();
        assert_eq!(Level::Error, diagnostics[0].1);
        assert!(diagnostics[0].0.contains("Structured"));
    }
}

use crate::{
    config::FormatterType,
    format::{EntryProps, FormattedMessage, Formatter, FormattingContext},
    template::Template,
};

/**
A [`Formatter`] that renders the entry's template.

Holes are filled from the entry's well-known fields and input parameters. Holes that can't be filled are written as their label in backticks. The neutral template is returned alongside the message so sinks can write it in their own dialect.
*/
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredFormatter {}

impl StructuredFormatter {
    /**
    Create a structured formatter.
    */
    pub const fn new() -> Self {
        StructuredFormatter {}
    }
}

impl Formatter for StructuredFormatter {
    fn formatter_type(&self) -> FormatterType {
        FormatterType::Structured
    }

    fn format(&self, ctx: &FormattingContext) -> FormattedMessage {
        let source = match ctx.resolve_template() {
            Ok(source) => source,
            Err(err) => return FormattedMessage::failure(err),
        };

        let template = match Template::parse(source) {
            Ok(template) => template,
            Err(err) => {
                return FormattedMessage::failure(format!(
                    "failed to parse template `{}`: {}",
                    source, err
                ))
            }
        };

        if !ctx.render_message() {
            return FormattedMessage::success(String::new(), Some(source.to_owned()));
        }

        let message = template
            .render()
            .with_props(EntryProps::new(ctx.entry()))
            .to_string();

        FormattedMessage::success(message, Some(source.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::{config::LoggingConfig, entry::LogEntry, value::Params};

    #[test]
    fn format_input_parameters() {
        let entry = LogEntry::builder("Svc", "Do")
            .input_parameters(Params::new().with("x", 1))
            .build();

        let config = LoggingConfig::new().with_default_template("{InputParameters}");

        let formatted = StructuredFormatter::new().format(&FormattingContext::new(&entry, &config));

        assert!(formatted.is_success());
        assert!(!formatted.is_fallback());
        assert_eq!("{x: 1}", formatted.message());
        assert_eq!(Some("{InputParameters}"), formatted.template());
    }

    #[test]
    fn format_default_templates() {
        let config = LoggingConfig::new();

        let ok = LogEntry::builder("Svc", "Do")
            .input_parameters(Params::new().with("id", 42))
            .output_value("found")
            .duration(Duration::from_millis(3))
            .build();

        let formatted = StructuredFormatter::new().format(&FormattingContext::new(&ok, &config));

        assert_eq!(
            "Svc.Do completed in 3ms with {id: 42} returning found",
            formatted.message()
        );

        let failed = LogEntry::builder("Svc", "Do")
            .exception_message("not found")
            .duration(Duration::from_millis(3))
            .build();

        let formatted = StructuredFormatter::new().format(&FormattingContext::new(&failed, &config));

        assert_eq!("Svc.Do failed in 3ms with {}: not found", formatted.message());
    }

    #[test]
    fn format_unknown_hole() {
        let entry = LogEntry::builder("Svc", "Do").build();
        let config = LoggingConfig::new().with_default_template("{MethodName} {Unknown}");

        let formatted = StructuredFormatter::new().format(&FormattingContext::new(&entry, &config));

        assert!(formatted.is_success());
        assert_eq!("Do `Unknown`", formatted.message());
    }

    #[test]
    fn format_oversized_precision() {
        let entry = LogEntry::builder("Svc", "Do")
            .duration(Duration::from_micros(1500))
            .build();
        let config = LoggingConfig::new().with_default_template("took {Duration:.70000}");

        let formatted = StructuredFormatter::new().format(&FormattingContext::new(&entry, &config));

        assert!(formatted.is_success());
        assert_eq!("took 1.5", formatted.message());
    }

    #[test]
    fn format_template_only() {
        let entry = LogEntry::builder("Svc", "Do").build();
        let config = LoggingConfig::new().with_default_template("{MethodName}");

        let formatted = StructuredFormatter::new()
            .format(&FormattingContext::new(&entry, &config).with_render_message(false));

        assert!(formatted.is_success());
        assert_eq!("", formatted.message());
        assert_eq!(Some("{MethodName}"), formatted.template());

        let config = LoggingConfig::new().with_default_template("{MethodName");

        let formatted = StructuredFormatter::new()
            .format(&FormattingContext::new(&entry, &config).with_render_message(false));

        assert!(!formatted.is_success());
    }

    #[test]
    fn format_invalid_template() {
        let entry = LogEntry::builder("Svc", "Do").build();
        let config = LoggingConfig::new().with_default_template("{MethodName");

        let formatted = StructuredFormatter::new().format(&FormattingContext::new(&entry, &config));

        assert!(!formatted.is_success());
        assert!(formatted.error_message().is_some());
    }
}

use core::fmt;

use crate::{
    config::FormatterType,
    format::{EntryProps, FormattedMessage, Formatter, FormattingContext},
    template::{self, Template},
};

/**
A [`Formatter`] that renders a named template strictly.

The template must be named, either by the formatting context or by the entry, and must be configured. Every hole must be filled by a well-known field or an input parameter. If any of these don't hold the message fails.
*/
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateFormatter {}

impl TemplateFormatter {
    /**
    Create a template formatter.
    */
    pub const fn new() -> Self {
        TemplateFormatter {}
    }
}

impl Formatter for TemplateFormatter {
    fn formatter_type(&self) -> FormatterType {
        FormatterType::Template
    }

    fn format(&self, ctx: &FormattingContext) -> FormattedMessage {
        let Some(name) = ctx.template_name() else {
            return FormattedMessage::failure("no template name was given");
        };

        let Some(source) = ctx.config().template(name) else {
            return FormattedMessage::failure(format!("the template `{}` is not defined", name));
        };

        let template = match Template::parse(source) {
            Ok(template) => template,
            Err(err) => {
                return FormattedMessage::failure(format!(
                    "failed to parse template `{}`: {}",
                    name, err
                ))
            }
        };

        let mut writer = Strict {
            message: String::new(),
            missing: None,
        };

        let written = template
            .render()
            .with_props(EntryProps::new(ctx.entry()))
            .write(&mut writer);

        match (written, writer.missing) {
            (_, Some(label)) => FormattedMessage::failure(format!(
                "the template `{}` references `{}`, which the entry doesn't carry",
                name, label
            )),
            (Err(_), None) => {
                FormattedMessage::failure(format!("failed to render template `{}`", name))
            }
            (Ok(()), None) => FormattedMessage::success(writer.message, Some(source.to_owned())),
        }
    }
}

struct Strict {
    message: String,
    missing: Option<String>,
}

impl fmt::Write for Strict {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.message.push_str(s);
        Ok(())
    }
}

impl template::Write for Strict {
    fn write_hole_label(&mut self, label: &str) -> fmt::Result {
        self.missing = Some(label.to_owned());

        Err(fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{config::LoggingConfig, entry::LogEntry, value::Params};

    fn config() -> LoggingConfig {
        LoggingConfig::new()
            .with_template("order", "Order {orderId} placed by {TypeName}.{MethodName}")
            .with_template("broken", "Order {orderId} for {customer}")
    }

    #[test]
    fn format_named_template() {
        let config = config();

        let entry = LogEntry::builder("Orders", "Place")
            .input_parameters(Params::new().with("orderId", 7))
            .template_name("order")
            .build();

        let formatted = TemplateFormatter::new().format(&FormattingContext::new(&entry, &config));

        assert!(formatted.is_success());
        assert_eq!("Order 7 placed by Orders.Place", formatted.message());
        assert_eq!(
            Some("Order {orderId} placed by {TypeName}.{MethodName}"),
            formatted.template()
        );
    }

    #[test]
    fn format_override_wins() {
        let config = config();

        let entry = LogEntry::builder("Orders", "Place")
            .input_parameters(Params::new().with("orderId", 7).with("customer", "bob"))
            .template_name("order")
            .build();

        let formatted = TemplateFormatter::new()
            .format(&FormattingContext::new(&entry, &config).with_template_name("broken"));

        assert_eq!("Order 7 for bob", formatted.message());
    }

    #[test]
    fn format_failures() {
        let config = config();

        for entry in [
            LogEntry::builder("Orders", "Place").build(),
            LogEntry::builder("Orders", "Place")
                .template_name("missing")
                .build(),
            LogEntry::builder("Orders", "Place")
                .input_parameters(Params::new().with("orderId", 7))
                .template_name("broken")
                .build(),
        ] {
            let formatted =
                TemplateFormatter::new().format(&FormattingContext::new(&entry, &config));

            assert!(!formatted.is_success());
            assert!(!formatted.is_fallback());
            assert!(formatted.error_message().is_some());
        }
    }
}

use crate::{
    config::FormatterType,
    entry::LogEntry,
    format::{duration_ms, format_timestamp, FormattedMessage, Formatter, FormattingContext},
    well_known::*,
};

/**
A [`Formatter`] that serializes the entry as a single compact JSON object.

Absent optional fields are omitted. JSON messages have no template.
*/
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter {}

impl JsonFormatter {
    /**
    Create a JSON formatter.
    */
    pub const fn new() -> Self {
        JsonFormatter {}
    }
}

impl Formatter for JsonFormatter {
    fn formatter_type(&self) -> FormatterType {
        FormatterType::Json
    }

    fn format(&self, ctx: &FormattingContext) -> FormattedMessage {
        match sval_json::stream_to_string(EntryValue(ctx.entry())) {
            Ok(message) => FormattedMessage::success(message, None),
            Err(err) => FormattedMessage::failure(format!("failed to serialize entry: {}", err)),
        }
    }
}

struct EntryValue<'a>(&'a LogEntry);

impl<'a> sval::Value for EntryValue<'a> {
    fn stream<'sval, S: sval::Stream<'sval> + ?Sized>(&'sval self, stream: &mut S) -> sval::Result {
        let entry = self.0;

        stream.record_begin(None, None, None, None)?;

        stream.record_value_begin(None, &sval::Label::new(KEY_ID))?;
        stream.value_computed(&entry.id())?;
        stream.record_value_end(None, &sval::Label::new(KEY_ID))?;

        if let Some(ts) = format_timestamp(entry) {
            stream.record_value_begin(None, &sval::Label::new(KEY_TIMESTAMP))?;
            stream.value_computed(&*ts)?;
            stream.record_value_end(None, &sval::Label::new(KEY_TIMESTAMP))?;
        }

        stream.record_value_begin(None, &sval::Label::new(KEY_TYPE_NAME))?;
        stream.value(entry.type_name())?;
        stream.record_value_end(None, &sval::Label::new(KEY_TYPE_NAME))?;

        stream.record_value_begin(None, &sval::Label::new(KEY_METHOD_NAME))?;
        stream.value(entry.method_name())?;
        stream.record_value_end(None, &sval::Label::new(KEY_METHOD_NAME))?;

        stream.record_value_begin(None, &sval::Label::new(KEY_LEVEL))?;
        stream.value_computed(&entry.effective_level())?;
        stream.record_value_end(None, &sval::Label::new(KEY_LEVEL))?;

        stream.record_value_begin(None, &sval::Label::new(KEY_DURATION))?;
        stream.f64(duration_ms(entry))?;
        stream.record_value_end(None, &sval::Label::new(KEY_DURATION))?;

        if let Some(target) = entry.target() {
            stream.record_value_begin(None, &sval::Label::new(KEY_TARGET))?;
            stream.value(target)?;
            stream.record_value_end(None, &sval::Label::new(KEY_TARGET))?;
        }

        stream.record_value_begin(None, &sval::Label::new(KEY_INPUT_PARAMETERS))?;
        stream.value(entry.input_parameters())?;
        stream.record_value_end(None, &sval::Label::new(KEY_INPUT_PARAMETERS))?;

        if let Some(output) = entry.output_value() {
            stream.record_value_begin(None, &sval::Label::new(KEY_OUTPUT_VALUE))?;
            stream.value(output)?;
            stream.record_value_end(None, &sval::Label::new(KEY_OUTPUT_VALUE))?;
        }

        if let Some(err) = entry.exception_message() {
            stream.record_value_begin(None, &sval::Label::new(KEY_EXCEPTION_MESSAGE))?;
            stream.value(err)?;
            stream.record_value_end(None, &sval::Label::new(KEY_EXCEPTION_MESSAGE))?;
        }

        stream.record_end(None, None, None)
    }
}

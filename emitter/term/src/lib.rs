/*!
Write `autolog` messages to the console.

This library implements a text-based format that's intended for direct end-user consumption, such as in interactive applications.

# Getting started

Add `autolog` and `autolog_term` to your `Cargo.toml`:

```toml
[dependencies.autolog]
version = "0.1.0"

[dependencies.autolog_term]
version = "0.1.0"
```

Configure `autolog` to write to `autolog_term`:

```
fn main() {
    let init = autolog::setup()
        .sink(autolog_term::stdout())
        .spawn()
        .unwrap();

    // Your app code goes here

    init.close(std::time::Duration::from_secs(30));
}
```

`autolog_term` understands templates in either the [`autolog::Dialect::Structured`] or [`autolog::Dialect::Rust`] dialect. Values in structure-captured or debug-formatted holes are written with syntax highlighting.
*/

#![deny(missing_docs)]

use core::{fmt, time::Duration};
use std::{cell::RefCell, io::Write};

use autolog::{
    template::{self, Capture, Hole},
    Dialect, Level, Params, Sink, Template, Value,
};
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/**
Get a sink that writes to `stdout`.

Colors will be used if the terminal supports them.
*/
pub fn stdout() -> Stdout {
    Stdout::new()
}

/**
A sink that writes to `stdout`.

Use [`stdout`] to construct a sink and pass the result to [`autolog::Setup::sink`] to configure `autolog` to use it.
*/
pub struct Stdout {
    writer: BufferWriter,
    dialect: Dialect,
}

impl Default for Stdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Stdout {
    /**
    Get a sink that writes to `stdout`.

    Colors will be used if the terminal supports them.
    */
    pub fn new() -> Self {
        Stdout {
            writer: BufferWriter::stdout(ColorChoice::Auto),
            dialect: Dialect::Structured,
        }
    }

    /**
    Whether to write using colors.

    By default, colors will be used if the terminal supports them. You can explicitly enable or disable colors using this function. If `colored` is true then colors will always be used. If `colored` is false then colors will never be used.
    */
    pub fn colored(mut self, colored: bool) -> Self {
        if colored {
            self.writer = BufferWriter::stdout(ColorChoice::Always);
        } else {
            self.writer = BufferWriter::stdout(ColorChoice::Never);
        }

        self
    }

    /**
    The template dialect to accept.

    Only [`Dialect::Structured`] and [`Dialect::Rust`] are supported; [`Dialect::Plain`] is treated as [`Dialect::Structured`].
    */
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = match dialect {
            Dialect::Rust => Dialect::Rust,
            Dialect::Structured | Dialect::Plain => Dialect::Structured,
        };

        self
    }
}

impl Sink for Stdout {
    fn write(&self, message: &str, level: Level, category: &str) {
        with_shared_buf(&self.writer, |writer, buf| {
            print_line(writer, buf, level, category, |buf| write_plain(buf, message))
        });
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn write_template(&self, template: &str, params: &Params, level: Level, category: &str) {
        let Ok(template) = Template::parse(template) else {
            return self.write(template, level, category);
        };

        with_shared_buf(&self.writer, |writer, buf| {
            print_line(writer, buf, level, category, |buf| {
                let _ = template.render().with_props(params).write(Writer { buf });
            })
        });
    }

    fn blocking_flush(&self, _: Duration) -> bool {
        true
    }
}

fn print_line(
    out: &BufferWriter,
    buf: &mut Buffer,
    level: Level,
    category: &str,
    message: impl FnOnce(&mut Buffer),
) {
    write_timestamp(buf);
    write_plain(buf, " ");

    write_message(buf, level, category, message);

    let _ = out.print(buf);
}

fn write_message(buf: &mut Buffer, level: Level, category: &str, message: impl FnOnce(&mut Buffer)) {
    try_write_fg(buf, level, level_color(level).map(Color::Ansi256));
    write_plain(buf, " ");

    write_fg(buf, format_args!("{} ", category), CATEGORY);

    message(buf);
    write_plain(buf, "\n");
}

fn level_color(level: Level) -> Option<u8> {
    match level {
        Level::Debug => Some(244),
        Level::Info => None,
        Level::Warn => Some(202),
        Level::Error => Some(124),
    }
}

struct LocalTime {
    h: u8,
    m: u8,
    s: u8,
    ms: u16,
}

fn local_now() -> Option<LocalTime> {
    // On Linux and OSX the local offset can't be determined in
    // multi-threaded programs, so this usually falls back to UTC
    let now = time::OffsetDateTime::now_local().ok()?;

    let (h, m, s, ms) = now.time().as_hms_milli();

    Some(LocalTime { h, m, s, ms })
}

fn write_timestamp(buf: &mut Buffer) {
    let LocalTime { h, m, s, ms } = local_now().unwrap_or_else(|| {
        let (h, m, s, ms) = time::OffsetDateTime::now_utc().time().as_hms_milli();

        LocalTime { h, m, s, ms }
    });

    write_plain(
        buf,
        format_args!("{:>02}:{:>02}:{:>02}.{:>03}", h, m, s, ms),
    );
}

struct Writer<'a> {
    buf: &'a mut Buffer,
}

impl<'a> sval_fmt::TokenWrite for Writer<'a> {
    fn write_text_quote(&mut self) -> fmt::Result {
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> fmt::Result {
        self.write(text, TEXT);

        Ok(())
    }

    fn write_number<N: fmt::Display>(&mut self, num: N) -> fmt::Result {
        self.write(num, NUMBER);

        Ok(())
    }

    fn write_atom<A: fmt::Display>(&mut self, atom: A) -> fmt::Result {
        self.write(atom, ATOM);

        Ok(())
    }

    fn write_ident(&mut self, ident: &str) -> fmt::Result {
        self.write(ident, IDENT);

        Ok(())
    }

    fn write_field(&mut self, field: &str) -> fmt::Result {
        self.write(field, FIELD);

        Ok(())
    }
}

impl<'a> fmt::Write for Writer<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write!(&mut self.buf, "{}", s).map_err(|_| fmt::Error)
    }
}

impl<'a> template::Write for Writer<'a> {
    fn write_hole_value(&mut self, value: &Value, hole: &Hole) -> fmt::Result {
        let structured = match hole.format() {
            Some("?") | Some("#?") => true,
            Some(_) => false,
            None => hole.capture() == Some(Capture::Structure),
        };

        if structured {
            return sval_fmt::stream_to_token_write(self, value);
        }

        let color = if value.to_f64().is_some() {
            NUMBER
        } else {
            TEXT
        };

        self.write(HoleValue { value, hole }, color);

        Ok(())
    }
}

struct HoleValue<'a> {
    value: &'a Value,
    hole: &'a Hole,
}

impl<'a> fmt::Display for HoleValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.hole.fmt_value(self.value, f)
    }
}

const CATEGORY: Color = Color::Ansi256(244);

const TEXT: Color = Color::Ansi256(69);
const NUMBER: Color = Color::Ansi256(135);
const ATOM: Color = Color::Ansi256(168);
const IDENT: Color = Color::Ansi256(170);
const FIELD: Color = Color::Ansi256(174);

fn write_fg(buf: &mut Buffer, v: impl fmt::Display, color: Color) {
    let _ = buf.set_color(ColorSpec::new().set_fg(Some(color)));
    let _ = write!(buf, "{}", v);
    let _ = buf.reset();
}

fn try_write_fg(buf: &mut Buffer, v: impl fmt::Display, color: Option<Color>) {
    if let Some(color) = color {
        write_fg(buf, v, color);
    } else {
        write_plain(buf, v);
    }
}

fn write_plain(buf: &mut Buffer, v: impl fmt::Display) {
    let _ = write!(buf, "{}", v);
}

impl<'a> Writer<'a> {
    fn write(&mut self, v: impl fmt::Display, color: Color) {
        write_fg(&mut *self.buf, v, color);
    }
}

fn with_shared_buf(writer: &BufferWriter, with_buf: impl FnOnce(&BufferWriter, &mut Buffer)) {
    thread_local! {
        static STDOUT: RefCell<Option<Buffer>> = RefCell::new(None);
    }

    STDOUT.with(|buf| {
        match buf.try_borrow_mut() {
            // If there are no overlapping references then use the cached buffer
            Ok(mut slot) => match &mut *slot {
                Some(buf) => {
                    buf.clear();
                    with_buf(writer, buf);
                }
                None => {
                    let mut buf = writer.buffer();
                    with_buf(writer, &mut buf);

                    *slot = Some(buf);
                }
            },
            // If there are overlapping references then just create a
            // buffer on-demand to use
            Err(_) => {
                with_buf(writer, &mut writer.buffer());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(template: &str, params: &Params) -> String {
        let mut buf = Buffer::no_color();

        write_message(&mut buf, Level::Info, "orders", |buf| {
            let _ = Template::parse(template)
                .unwrap()
                .render()
                .with_props(params)
                .write(Writer { buf });
        });

        String::from_utf8(buf.into_inner()).unwrap()
    }

    #[test]
    fn write_plain_values() {
        let params = Params::new().with("OrderId", 7).with("Customer", "bob");

        assert_eq!(
            "info orders Order 7 for bob\n",
            render("Order {OrderId} for {Customer}", &params)
        );
    }

    #[test]
    fn write_formatted_values() {
        let params = Params::new().with("Duration", 1.5);

        assert_eq!(
            "info orders took 1.50ms\n",
            render("took {Duration:.2}ms", &params)
        );
        assert_eq!(
            "info orders took 1.50ms\n",
            render("took {Duration:0.00}ms", &params)
        );
    }

    #[test]
    fn write_missing_values() {
        assert_eq!(
            "info orders Order `OrderId`\n",
            render("Order {OrderId}", &Params::new())
        );
    }

    #[test]
    fn dialect_is_structured_or_rust() {
        assert_eq!(Dialect::Structured, stdout().dialect());
        assert_eq!(Dialect::Rust, stdout().with_dialect(Dialect::Rust).dialect());
        assert_eq!(
            Dialect::Structured,
            stdout().with_dialect(Dialect::Plain).dialect()
        );
    }
}

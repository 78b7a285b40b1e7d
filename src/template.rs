/*!
The [`Template`] type.

Templates are text with holes, like `{TypeName}.{MethodName} took {Duration:0.00}ms`. A hole is a label, optionally preceded by a capture marker (`@` to structure the value, `$` to stringify it) and optionally followed by a format specifier after a `:`. Literal braces are escaped by doubling them, as in `{{` and `}}`.

Templates are rendered by filling their holes from some [`Props`]. Holes that can't be filled are written as their label in backticks, like `` `Missing` ``. How text, values, and missing holes are written can be customized through the [`Write`] trait.
*/

use core::fmt;

use thiserror::Error;

use crate::{
    empty::Empty,
    value::{Params, Value},
};

/**
An error encountered while parsing a template.
*/
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parsing failed: {reason}")]
pub struct ParseError {
    reason: String,
}

impl ParseError {
    fn incomplete_hole() -> Self {
        ParseError {
            reason: "unexpected end of input, expected `}`".to_owned(),
        }
    }

    fn unescaped_hole() -> Self {
        ParseError {
            reason: "`{` and `}` characters must be escaped as `{{` and `}}`".to_owned(),
        }
    }

    fn missing_label() -> Self {
        ParseError {
            reason: "empty holes (`{}`) aren't supported, put a label inside like `{MethodName}`"
                .to_owned(),
        }
    }
}

/**
A parsed template.
*/
#[derive(Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    /**
    Parse a template from text.
    */
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parts = Vec::new();
        let mut text = String::new();

        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    if !text.is_empty() {
                        parts.push(Part::text(std::mem::take(&mut text)));
                    }

                    let mut hole = String::new();
                    let mut closed = false;

                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(ParseError::unescaped_hole()),
                            c => hole.push(c),
                        }
                    }

                    if !closed {
                        return Err(ParseError::incomplete_hole());
                    }

                    parts.push(Part(PartKind::Hole(Hole::parse(&hole)?)));
                }
                '}' => return Err(ParseError::unescaped_hole()),
                c => text.push(c),
            }
        }

        if !text.is_empty() {
            parts.push(Part::text(text));
        }

        Ok(Template { parts })
    }

    /**
    Create a template from its parts.
    */
    pub fn from_parts(parts: impl IntoIterator<Item = Part>) -> Self {
        Template {
            parts: parts.into_iter().collect(),
        }
    }

    /**
    The parts of the template, in order.
    */
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /**
    The holes of the template, in order.
    */
    pub fn holes(&self) -> impl Iterator<Item = &Hole> {
        self.parts.iter().filter_map(Part::as_hole)
    }

    /**
    Mutably iterate over the holes of the template.
    */
    pub fn holes_mut(&mut self) -> impl Iterator<Item = &mut Hole> {
        self.parts.iter_mut().filter_map(|part| match part.0 {
            PartKind::Hole(ref mut hole) => Some(hole),
            PartKind::Text(_) => None,
        })
    }

    /**
    Render the template.

    Until props are supplied through [`Render::with_props`], every hole is written as its label.
    */
    pub fn render(&self) -> Render<'_, Empty> {
        Render {
            tpl: self,
            props: Empty,
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string(), f)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Writes the template back in its source syntax
        for part in &self.parts {
            match part.0 {
                PartKind::Text(ref text) => {
                    for c in text.chars() {
                        match c {
                            '{' => f.write_str("{{")?,
                            '}' => f.write_str("}}")?,
                            c => fmt::Write::write_char(f, c)?,
                        }
                    }
                }
                PartKind::Hole(ref hole) => fmt::Display::fmt(hole, f)?,
            }
        }

        Ok(())
    }
}

/**
A fragment of text or a hole in a [`Template`].
*/
#[derive(Clone, PartialEq, Eq)]
pub struct Part(PartKind);

#[derive(Clone, PartialEq, Eq)]
enum PartKind {
    Text(String),
    Hole(Hole),
}

impl Part {
    /**
    A fragment of text.
    */
    pub fn text(text: impl Into<String>) -> Self {
        Part(PartKind::Text(text.into()))
    }

    /**
    A hole with the given label.
    */
    pub fn hole(label: impl Into<String>) -> Self {
        Part(PartKind::Hole(Hole::new(label)))
    }

    /**
    Try get the part as text.
    */
    pub fn as_text(&self) -> Option<&str> {
        match self.0 {
            PartKind::Text(ref text) => Some(text),
            PartKind::Hole(_) => None,
        }
    }

    /**
    Try get the part as a hole.
    */
    pub fn as_hole(&self) -> Option<&Hole> {
        match self.0 {
            PartKind::Hole(ref hole) => Some(hole),
            PartKind::Text(_) => None,
        }
    }
}

impl From<Hole> for Part {
    fn from(hole: Hole) -> Self {
        Part(PartKind::Hole(hole))
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            PartKind::Text(ref text) => f.debug_tuple("Text").field(text).finish(),
            PartKind::Hole(ref hole) => f.debug_tuple("Hole").field(hole).finish(),
        }
    }
}

/**
How the value of a hole is captured.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /**
    `@`: write the value's structure.
    */
    Structure,
    /**
    `$`: write the value as a string.
    */
    Stringify,
}

impl Capture {
    fn marker(&self) -> char {
        match self {
            Capture::Structure => '@',
            Capture::Stringify => '$',
        }
    }
}

/**
A hole in a [`Template`].
*/
#[derive(Clone, PartialEq, Eq)]
pub struct Hole {
    label: String,
    capture: Option<Capture>,
    format: Option<String>,
}

impl Hole {
    /**
    A hole with the given label and no capture marker or format specifier.
    */
    pub fn new(label: impl Into<String>) -> Self {
        Hole {
            label: label.into(),
            capture: None,
            format: None,
        }
    }

    fn parse(hole: &str) -> Result<Self, ParseError> {
        let (capture, rest) = match hole.chars().next() {
            Some('@') => (Some(Capture::Structure), &hole[1..]),
            Some('$') => (Some(Capture::Stringify), &hole[1..]),
            _ => (None, hole),
        };

        let (label, format) = match rest.split_once(':') {
            Some((label, format)) => (label, Some(format.to_owned())),
            None => (rest, None),
        };

        if label.is_empty() {
            return Err(ParseError::missing_label());
        }

        Ok(Hole {
            label: label.to_owned(),
            capture,
            format,
        })
    }

    /**
    The label used to find the value of the hole.
    */
    pub fn label(&self) -> &str {
        &self.label
    }

    /**
    The capture marker of the hole.
    */
    pub fn capture(&self) -> Option<Capture> {
        self.capture
    }

    /**
    The format specifier of the hole.
    */
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /**
    Set or clear the capture marker.
    */
    pub fn set_capture(&mut self, capture: Option<Capture>) {
        self.capture = capture;
    }

    /**
    Set or clear the format specifier.
    */
    pub fn set_format(&mut self, format: Option<impl Into<String>>) {
        self.format = format.map(Into::into);
    }

    /**
    Write a value the way this hole specifies.
    */
    pub fn fmt_value(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format().and_then(FormatSpec::parse) {
            Some(FormatSpec::Debug) => fmt::Debug::fmt(value, f),
            Some(FormatSpec::Fixed(precision)) => match value.to_f64() {
                Some(v) => write!(f, "{:.*}", precision, v),
                None => fmt::Display::fmt(value, f),
            },
            None => match self.capture {
                Some(Capture::Structure) => fmt::Debug::fmt(value, f),
                Some(Capture::Stringify) | None => fmt::Display::fmt(value, f),
            },
        }
    }
}

impl fmt::Debug for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string(), f)
    }
}

impl fmt::Display for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;

        if let Some(capture) = self.capture {
            fmt::Write::write_char(f, capture.marker())?;
        }

        f.write_str(&self.label)?;

        if let Some(ref format) = self.format {
            f.write_str(":")?;
            f.write_str(format)?;
        }

        f.write_str("}")
    }
}

/**
A format specifier understood by hole rendering.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormatSpec {
    /**
    `?` or `#?`.
    */
    Debug,
    /**
    A fixed number of decimal places, like `.2`, `0.00`, `F2`, or `N2`.
    */
    Fixed(usize),
}

/**
The largest number of decimal places a specifier can ask for.

Specifiers asking for more aren't understood and the value is written as-is.
*/
pub(crate) const MAX_PRECISION: usize = 32;

impl FormatSpec {
    pub(crate) fn parse(spec: &str) -> Option<Self> {
        Self::parse_rust(spec).or_else(|| Self::parse_numeric(spec))
    }

    /**
    Rust-style specifiers: `?`, `#?`, `.N`.
    */
    pub(crate) fn parse_rust(spec: &str) -> Option<Self> {
        match spec {
            "?" | "#?" => Some(FormatSpec::Debug),
            spec => {
                let digits = spec.strip_prefix('.')?;

                parse_digits(digits).map(FormatSpec::Fixed)
            }
        }
    }

    /**
    Numeric picture specifiers: `0.00`, `F2`, `N2`.
    */
    pub(crate) fn parse_numeric(spec: &str) -> Option<Self> {
        if let Some(rest) = spec.strip_prefix(['F', 'f', 'N', 'n']) {
            return if rest.is_empty() {
                Some(FormatSpec::Fixed(2))
            } else {
                parse_digits(rest).map(FormatSpec::Fixed)
            };
        }

        let decimals = match spec.split_once('.') {
            Some(("0", decimals)) => decimals,
            None if spec == "0" => "",
            _ => return None,
        };

        if decimals.len() <= MAX_PRECISION && decimals.bytes().all(|b| b == b'0') {
            Some(FormatSpec::Fixed(decimals.len()))
        } else {
            None
        }
    }
}

fn parse_digits(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits
        .parse()
        .ok()
        .filter(|precision| *precision <= MAX_PRECISION)
}

/**
A source of values to fill holes in a template with.
*/
pub trait Props {
    /**
    Get the value for a label.
    */
    fn get(&self, label: &str) -> Option<Value>;
}

impl<'a, P: Props + ?Sized> Props for &'a P {
    fn get(&self, label: &str) -> Option<Value> {
        (**self).get(label)
    }
}

impl Props for Empty {
    fn get(&self, _: &str) -> Option<Value> {
        None
    }
}

impl Props for Params {
    fn get(&self, label: &str) -> Option<Value> {
        Params::get(self, label).cloned()
    }
}

impl<P: Props, Q: Props> Props for (P, Q) {
    fn get(&self, label: &str) -> Option<Value> {
        self.0.get(label).or_else(|| self.1.get(label))
    }
}

/**
A [`Template`] ready to be written with some [`Props`].
*/
pub struct Render<'a, P> {
    tpl: &'a Template,
    props: P,
}

impl<'a, P> Render<'a, P> {
    /**
    Fill the template's holes from the given props.
    */
    pub fn with_props<U>(self, props: U) -> Render<'a, U> {
        Render {
            tpl: self.tpl,
            props,
        }
    }
}

impl<'a, P: Props> Render<'a, P> {
    /**
    Write the template to the given writer.
    */
    pub fn write(&self, mut writer: impl Write) -> fmt::Result {
        for part in &self.tpl.parts {
            match part.0 {
                PartKind::Text(ref text) => writer.write_text(text)?,
                PartKind::Hole(ref hole) => {
                    if let Some(value) = self.props.get(hole.label()) {
                        writer.write_hole_value(&value, hole)?;
                    } else {
                        writer.write_hole_label(hole.label())?;
                    }
                }
            }
        }

        Ok(())
    }
}

impl<'a, P: Props> fmt::Display for Render<'a, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f)
    }
}

impl<'a, P: Props> fmt::Debug for Render<'a, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write as _;

        struct Escape<W>(W);

        impl<W: fmt::Write> fmt::Write for Escape<W> {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                for c in s.escape_debug() {
                    self.0.write_char(c)?;
                }

                Ok(())
            }
        }

        f.write_char('"')?;
        write!(Escape(&mut *f), "{}", self)?;
        f.write_char('"')
    }
}

/**
A writer for the parts of a rendered [`Template`].
*/
pub trait Write: fmt::Write {
    /**
    Write a fragment of text.
    */
    fn write_text(&mut self, text: &str) -> fmt::Result {
        self.write_str(text)
    }

    /**
    Write the value of a hole.
    */
    fn write_hole_value(&mut self, value: &Value, hole: &Hole) -> fmt::Result {
        struct FormatValue<'a> {
            value: &'a Value,
            hole: &'a Hole,
        }

        impl<'a> fmt::Display for FormatValue<'a> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.hole.fmt_value(self.value, f)
            }
        }

        self.write_fmt(format_args!("{}", FormatValue { value, hole }))
    }

    /**
    Write a hole that has no value.
    */
    fn write_hole_label(&mut self, label: &str) -> fmt::Result {
        self.write_fmt(format_args!("`{}`", label))
    }
}

impl<'a, W: Write + ?Sized> Write for &'a mut W {
    fn write_text(&mut self, text: &str) -> fmt::Result {
        (**self).write_text(text)
    }

    fn write_hole_value(&mut self, value: &Value, hole: &Hole) -> fmt::Result {
        (**self).write_hole_value(value, hole)
    }

    fn write_hole_label(&mut self, label: &str) -> fmt::Result {
        (**self).write_hole_label(label)
    }
}

impl<'a> Write for fmt::Formatter<'a> {
    fn write_hole_value(&mut self, value: &Value, hole: &Hole) -> fmt::Result {
        hole.fmt_value(value, self)
    }
}

impl Write for String {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for case in [
            "",
            "text only",
            "{A} and {B}",
            "{@InputParameters} returned {$OutputValue}",
            "{Duration:0.00}ms",
            "{InputParameters:?} in {Duration:.2}",
            "escaped {{braces}} around {Hole}",
            "{TypeName}.{MethodName}",
        ] {
            let tpl = Template::parse(case).unwrap();

            assert_eq!(case, tpl.to_string());
        }
    }

    #[test]
    fn parse_holes() {
        let tpl = Template::parse("{@Input} {Duration:0.00} {$Out:?}").unwrap();

        let holes = tpl.holes().collect::<Vec<_>>();

        assert_eq!(3, holes.len());

        assert_eq!("Input", holes[0].label());
        assert_eq!(Some(Capture::Structure), holes[0].capture());
        assert_eq!(None, holes[0].format());

        assert_eq!("Duration", holes[1].label());
        assert_eq!(None, holes[1].capture());
        assert_eq!(Some("0.00"), holes[1].format());

        assert_eq!("Out", holes[2].label());
        assert_eq!(Some(Capture::Stringify), holes[2].capture());
        assert_eq!(Some("?"), holes[2].format());
    }

    #[test]
    fn parse_invalid() {
        for case in ["{unclosed", "stray }", "{}", "{nested {hole}}", "{@}"] {
            assert!(Template::parse(case).is_err(), "{}", case);
        }
    }

    #[test]
    fn render() {
        let props = Params::new()
            .with("Name", "bob")
            .with("Duration", 12.3456)
            .with("Input", Params::new().with("x", 1));

        for (template, expected) in [
            ("Hello {Name}", "Hello bob"),
            ("{$Name}", "bob"),
            ("{@Name}", "\"bob\""),
            ("{Name:?}", "\"bob\""),
            ("{Duration:0.00}", "12.35"),
            ("{Duration:.1}", "12.3"),
            ("{Duration:F3}", "12.346"),
            ("{Name:0.00}", "bob"),
            ("{Input}", "{x: 1}"),
            ("{@Input}", "{x: 1}"),
            ("{Missing}", "`Missing`"),
            ("{{{Name}}}", "{bob}"),
        ] {
            let tpl = Template::parse(template).unwrap();

            assert_eq!(expected, tpl.render().with_props(&props).to_string(), "{}", template);
        }
    }

    #[test]
    fn render_custom_writer() {
        struct Missing(String, Vec<String>);

        impl fmt::Write for Missing {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                self.0.write_str(s)
            }
        }

        impl Write for Missing {
            fn write_hole_label(&mut self, label: &str) -> fmt::Result {
                self.1.push(label.to_owned());
                Ok(())
            }
        }

        let tpl = Template::parse("{A} {B} {C}").unwrap();

        let mut writer = Missing(String::new(), Vec::new());
        tpl.render()
            .with_props(Params::new().with("B", 2))
            .write(&mut writer)
            .unwrap();

        assert_eq!(" 2 ", writer.0);
        assert_eq!(vec!["A", "C"], writer.1);
    }

    #[test]
    fn format_spec_parse() {
        for (spec, expected) in [
            ("?", Some(FormatSpec::Debug)),
            ("#?", Some(FormatSpec::Debug)),
            (".2", Some(FormatSpec::Fixed(2))),
            ("0.00", Some(FormatSpec::Fixed(2))),
            ("0.0", Some(FormatSpec::Fixed(1))),
            ("0", Some(FormatSpec::Fixed(0))),
            ("F2", Some(FormatSpec::Fixed(2))),
            ("N", Some(FormatSpec::Fixed(2))),
            ("n4", Some(FormatSpec::Fixed(4))),
            ("x", None),
            (".", None),
            ("0.01", None),
            ("yyyy-MM-dd", None),
            (".32", Some(FormatSpec::Fixed(MAX_PRECISION))),
            (".33", None),
            (".70000", None),
            ("F99999999999999999999999", None),
        ] {
            assert_eq!(expected, FormatSpec::parse(spec), "{}", spec);
        }

        let zeros = format!("0.{}", "0".repeat(MAX_PRECISION + 1));
        assert_eq!(None, FormatSpec::parse(&zeros));
    }

    #[test]
    fn render_oversized_precision() {
        let props = Params::new().with("Duration", 1.5);

        for template in ["{Duration:.70000}", "{Duration:F70000}"] {
            assert_eq!(
                "took 1.5",
                Template::parse(&format!("took {}", template))
                    .unwrap()
                    .render()
                    .with_props(&props)
                    .to_string()
            );
        }
    }
}

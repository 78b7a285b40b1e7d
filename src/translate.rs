/*!
Translating templates between sink dialects.

Templates are written in a neutral syntax and translated into the dialect a sink understands before they're written. Translation happens in three steps:

1. Syntax belonging to other dialects is stripped by a chain of [`Cleaner`]s.
2. If the template already uses the target dialect's markers it's returned as-is.
3. Otherwise the well-known fields are enhanced with the dialect's markers, like `{@InputParameters}` or `{Duration:.2}`.

Translating a template that has already been translated returns it unchanged.
*/

use core::fmt;

use crate::{
    template::{Capture, FormatSpec, Hole, Template},
    value::Params,
    well_known::{KEY_DURATION, KEY_INPUT_PARAMETERS, KEY_OUTPUT_VALUE},
};

/**
The template syntax a sink understands.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /**
    Message templates with destructuring and numeric picture formats.

    Parameters are structured with `{@InputParameters}` and durations use `{Duration:0.00}`.
    */
    #[default]
    Structured,
    /**
    Rust-style format specifiers.

    Parameters are debug-formatted with `{InputParameters:?}` and durations use `{Duration:.2}`.
    */
    Rust,
    /**
    Plain holes with no markers or specifiers.
    */
    Plain,
}

impl Dialect {
    /**
    Whether a hole already uses this dialect's markers.
    */
    pub fn is_native(&self, hole: &Hole) -> bool {
        match self {
            Dialect::Structured => {
                hole.capture() == Some(Capture::Structure)
                    || hole.format().and_then(FormatSpec::parse_numeric).is_some()
            }
            Dialect::Rust => hole.format().and_then(FormatSpec::parse_rust).is_some(),
            Dialect::Plain => false,
        }
    }

    fn enhance(&self, hole: &mut Hole) {
        if hole.capture().is_some() || hole.format().is_some() {
            return;
        }

        let (capture, format) = match (self, hole.label()) {
            (Dialect::Structured, KEY_INPUT_PARAMETERS | KEY_OUTPUT_VALUE) => {
                (Some(Capture::Structure), None)
            }
            (Dialect::Structured, KEY_DURATION) => (None, Some("0.00")),
            (Dialect::Rust, KEY_INPUT_PARAMETERS | KEY_OUTPUT_VALUE) => (None, Some("?")),
            (Dialect::Rust, KEY_DURATION) => (None, Some(".2")),
            _ => return,
        };

        hole.set_capture(capture);
        hole.set_format(format);
    }

    fn cleaners(&self) -> Vec<Box<dyn Cleaner + Send + Sync>> {
        match self {
            Dialect::Structured => vec![Box::new(RustSpecCleaner)],
            Dialect::Rust => vec![Box::new(CaptureMarkerCleaner), Box::new(NumericSpecCleaner)],
            Dialect::Plain => vec![
                Box::new(CaptureMarkerCleaner),
                Box::new(NumericSpecCleaner),
                Box::new(RustSpecCleaner),
            ],
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Structured => "Structured",
            Dialect::Rust => "Rust",
            Dialect::Plain => "Plain",
        })
    }
}

/**
A pass that strips one dialect's syntax from templates.

Cleaners are idempotent and leave holes without their markers untouched.
*/
pub trait Cleaner {
    /**
    Strip this cleaner's markers from a hole.
    */
    fn clean(&self, hole: &mut Hole);
}

impl<'a, C: Cleaner + ?Sized> Cleaner for &'a C {
    fn clean(&self, hole: &mut Hole) {
        (**self).clean(hole)
    }
}

impl<C: Cleaner + ?Sized> Cleaner for Box<C> {
    fn clean(&self, hole: &mut Hole) {
        (**self).clean(hole)
    }
}

/**
Strips `@` and `$` capture markers.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureMarkerCleaner;

impl Cleaner for CaptureMarkerCleaner {
    fn clean(&self, hole: &mut Hole) {
        hole.set_capture(None);
    }
}

/**
Strips numeric picture specifiers like `0.00`, `F2`, and `N2`.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericSpecCleaner;

impl Cleaner for NumericSpecCleaner {
    fn clean(&self, hole: &mut Hole) {
        if hole.format().and_then(FormatSpec::parse_numeric).is_some() {
            hole.set_format(None::<String>);
        }
    }
}

/**
Strips Rust-style specifiers like `?`, `#?`, and `.2`.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct RustSpecCleaner;

impl Cleaner for RustSpecCleaner {
    fn clean(&self, hole: &mut Hole) {
        if hole.format().and_then(FormatSpec::parse_rust).is_some() {
            hole.set_format(None::<String>);
        }
    }
}

/**
Translates neutral templates into a sink's [`Dialect`].
*/
pub struct TemplateTranslator {
    dialect: Dialect,
    cleaners: Vec<Box<dyn Cleaner + Send + Sync>>,
}

impl fmt::Debug for TemplateTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateTranslator")
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl TemplateTranslator {
    /**
    Create a translator for the given dialect.

    The translator cleans the syntax of every other dialect.
    */
    pub fn new(dialect: Dialect) -> Self {
        TemplateTranslator {
            dialect,
            cleaners: dialect.cleaners(),
        }
    }

    /**
    The dialect templates are translated into.
    */
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /**
    Translate a template into this translator's dialect.

    A missing or empty template translates to an empty string. A template that can't be parsed is returned as-is.
    */
    pub fn translate_template(&self, template: Option<&str>) -> String {
        let template = match template {
            Some(template) if !template.is_empty() => template,
            _ => return String::new(),
        };

        let mut parsed = match Template::parse(template) {
            Ok(parsed) => parsed,
            Err(_) => return template.to_owned(),
        };

        for cleaner in &self.cleaners {
            for hole in parsed.holes_mut() {
                cleaner.clean(hole);
            }
        }

        if !parsed.holes().any(|hole| self.dialect.is_native(hole)) {
            for hole in parsed.holes_mut() {
                self.dialect.enhance(hole);
            }
        }

        parsed.to_string()
    }

    /**
    Select and order parameters to match the placeholders of a template.

    Parameters are returned in the order their placeholders first appear. Parameters with no placeholder are dropped, as are placeholders with no parameter.
    */
    pub fn translate_parameters(&self, parameters: &Params, current_template: &str) -> Params {
        let mut translated = Params::new();

        for name in placeholder_names(current_template) {
            if translated.contains(name) {
                continue;
            }

            if let Some(value) = parameters.get(name) {
                translated.insert(name, value.clone());
            }
        }

        translated
    }
}

/**
Find the names of placeholders in a template, in order.

A placeholder is a `{`, an optional capture marker, then a name running up to a `:` or `}`. Escaped braces are skipped.
*/
fn placeholder_names(template: &str) -> impl Iterator<Item = &str> {
    let bytes = template.as_bytes();
    let mut i = 0;

    std::iter::from_fn(move || {
        while i < bytes.len() {
            match bytes[i] {
                b'{' if bytes.get(i + 1) == Some(&b'{') => i += 2,
                b'{' => {
                    i += 1;

                    if matches!(bytes.get(i), Some(b'@') | Some(b'$')) {
                        i += 1;
                    }

                    let start = i;
                    while i < bytes.len() && !matches!(bytes[i], b':' | b'}' | b'{') {
                        i += 1;
                    }

                    let terminated = matches!(bytes.get(i), Some(b':') | Some(b'}'));

                    if terminated && i > start {
                        return Some(&template[start..i]);
                    }
                }
                _ => i += 1,
            }
        }

        None
    })
}

/*!
Configuration for intercepted methods.

A [`LoggingConfig`] is built once at startup and treated as read-only afterwards. It carries the defaults used for every intercepted method, the named templates formatters can render, and an ordered list of [`MethodRule`]s that match methods by name or by wildcard pattern.

Per-method overrides that would otherwise be attached to the methods themselves live in an [`AttributeTable`]. An attribute always wins over a rule.
*/

use core::{fmt, str::FromStr};
use std::collections::{BTreeMap, HashMap};

use crate::{error::ConfigError, id::MethodIdentity, level::Level};

/**
The kind of formatter used to turn a log entry into a message.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormatterType {
    /**
    Render a template, filling holes from the entry's fields.
    */
    #[default]
    Structured,
    /**
    Serialize the entry as a JSON object.
    */
    Json,
    /**
    Render a named template that must exist.
    */
    Template,
}

impl FormatterType {
    /**
    The name of the formatter type, like `Structured`.
    */
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatterType::Structured => "Structured",
            FormatterType::Json => "Json",
            FormatterType::Template => "Template",
        }
    }
}

impl fmt::Display for FormatterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatterType {
    type Err = ParseFormatterTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for ty in [
            FormatterType::Structured,
            FormatterType::Json,
            FormatterType::Template,
        ] {
            if s.eq_ignore_ascii_case(ty.as_str()) {
                return Ok(ty);
            }
        }

        Err(ParseFormatterTypeError {})
    }
}

/**
An error attempting to parse a [`FormatterType`] from text.
*/
#[derive(Debug)]
pub struct ParseFormatterTypeError {}

impl fmt::Display for ParseFormatterTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the input was not a valid formatter type")
    }
}

impl std::error::Error for ParseFormatterTypeError {}

/**
Logging settings attached to a method, a type, or a rule.

Any setting left unspecified takes its value from the [`LoggingConfig`].
*/
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LogAttribute {
    enabled: bool,
    input_logging: Option<bool>,
    output_logging: Option<bool>,
    formatter_type: Option<FormatterType>,
    target: Option<String>,
    level: Option<Level>,
    exception_level: Option<Level>,
    template_name: Option<String>,
}

impl Default for LogAttribute {
    fn default() -> Self {
        Self::new()
    }
}

impl LogAttribute {
    /**
    Log calls, using the configured defaults for every setting.
    */
    pub const fn new() -> Self {
        LogAttribute {
            enabled: true,
            input_logging: None,
            output_logging: None,
            formatter_type: None,
            target: None,
            level: None,
            exception_level: None,
            template_name: None,
        }
    }

    /**
    Don't log calls.
    */
    pub const fn skip() -> Self {
        LogAttribute {
            enabled: false,
            input_logging: None,
            output_logging: None,
            formatter_type: None,
            target: None,
            level: None,
            exception_level: None,
            template_name: None,
        }
    }

    /**
    Whether calls are logged.
    */
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /**
    Set whether input parameters are captured.
    */
    pub fn with_input_logging(mut self, input_logging: bool) -> Self {
        self.input_logging = Some(input_logging);
        self
    }

    /**
    Set whether return values are captured.
    */
    pub fn with_output_logging(mut self, output_logging: bool) -> Self {
        self.output_logging = Some(output_logging);
        self
    }

    /**
    Set the formatter used.
    */
    pub fn with_formatter_type(mut self, formatter_type: FormatterType) -> Self {
        self.formatter_type = Some(formatter_type);
        self
    }

    /**
    Set the target entries are routed to.
    */
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /**
    Set the level of successful calls.
    */
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /**
    Set the level of failed calls.
    */
    pub fn with_exception_level(mut self, exception_level: Level) -> Self {
        self.exception_level = Some(exception_level);
        self
    }

    /**
    Set the name of the template to render.
    */
    pub fn with_template_name(mut self, template_name: impl Into<String>) -> Self {
        self.template_name = Some(template_name.into());
        self
    }

    pub(crate) fn input_logging(&self) -> Option<bool> {
        self.input_logging
    }

    pub(crate) fn output_logging(&self) -> Option<bool> {
        self.output_logging
    }

    pub(crate) fn formatter_type(&self) -> Option<FormatterType> {
        self.formatter_type
    }

    pub(crate) fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub(crate) fn level(&self) -> Option<Level> {
        self.level
    }

    pub(crate) fn exception_level(&self) -> Option<Level> {
        self.exception_level
    }

    pub(crate) fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }
}

/**
Per-method and per-type [`LogAttribute`]s.

A method-level attribute wins over a type-level one.
*/
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    types: HashMap<String, LogAttribute>,
    methods: HashMap<String, HashMap<String, LogAttribute>>,
}

impl AttributeTable {
    /**
    Create an empty table.
    */
    pub fn new() -> Self {
        Self::default()
    }

    /**
    Attach an attribute to every method declared by a type.
    */
    pub fn with_type(mut self, type_name: impl Into<String>, attribute: LogAttribute) -> Self {
        self.types.insert(type_name.into(), attribute);
        self
    }

    /**
    Attach an attribute to a single method.

    The attribute applies to every overload of the method.
    */
    pub fn with_method(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        attribute: LogAttribute,
    ) -> Self {
        self.methods
            .entry(type_name.into())
            .or_default()
            .insert(method_name.into(), attribute);
        self
    }

    /**
    Find the attribute that applies to a method, if there is one.
    */
    pub fn get(&self, identity: &MethodIdentity) -> Option<&LogAttribute> {
        self.methods
            .get(identity.type_name())
            .and_then(|methods| methods.get(identity.method_name()))
            .or_else(|| self.types.get(identity.type_name()))
    }

    /**
    Whether the table has no attributes.
    */
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.methods.is_empty()
    }

    pub(crate) fn attributes(&self) -> impl Iterator<Item = &LogAttribute> {
        self.types
            .values()
            .chain(self.methods.values().flat_map(HashMap::values))
    }
}

/**
A rule matching methods by their `Type.Method` name.

The pattern is either an exact name or a wildcard pattern where `*` matches any run of characters and `?` matches a single character.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodRule {
    pattern: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    attribute: LogAttribute,
}

impl MethodRule {
    /**
    Create a rule that logs matching methods with the configured defaults.
    */
    pub fn new(pattern: impl Into<String>) -> Self {
        Self::with_attribute(pattern, LogAttribute::new())
    }

    /**
    Create a rule that applies the given attribute to matching methods.
    */
    pub fn with_attribute(pattern: impl Into<String>, attribute: LogAttribute) -> Self {
        MethodRule {
            pattern: pattern.into(),
            attribute,
        }
    }

    /**
    The pattern matched against `Type.Method` names.
    */
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /**
    The attribute applied to matching methods.
    */
    pub fn attribute(&self) -> &LogAttribute {
        &self.attribute
    }

    /**
    Check that the pattern can be used.
    */
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason| {
            Err(ConfigError::InvalidPattern {
                pattern: self.pattern.clone(),
                reason,
            })
        };

        if self.pattern.is_empty() {
            return invalid("the pattern is empty");
        }

        if self.pattern.chars().any(char::is_whitespace) {
            return invalid("the pattern contains whitespace");
        }

        if self.pattern.contains(['{', '}']) {
            return invalid("the pattern contains braces");
        }

        Ok(())
    }

    /**
    Whether the rule matches a `Type.Method` name.
    */
    pub fn matches(&self, qualified_name: &str) -> bool {
        if !self.pattern.contains(['*', '?']) {
            return self.pattern == qualified_name;
        }

        let pattern = self.pattern.chars().collect::<Vec<_>>();
        let input = qualified_name.chars().collect::<Vec<_>>();

        wildcard_match(&pattern, &input)
    }
}

fn wildcard_match(pattern: &[char], input: &[char]) -> bool {
    let (mut p, mut i) = (0, 0);

    // The last `*` seen in the pattern, and the input position it was tried at
    let mut backtrack = None;

    while i < input.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, i));
                p += 1;
            }
            Some('?') => {
                p += 1;
                i += 1;
            }
            Some(c) if *c == input[i] => {
                p += 1;
                i += 1;
            }
            _ => match backtrack {
                // Let the last `*` consume one more character and try again
                Some((star, start)) => {
                    p = star + 1;
                    i = start + 1;
                    backtrack = Some((star, start + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/**
The configuration shared by the decision cache, formatters, and processor.
*/
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoggingConfig {
    default_formatter_type: FormatterType,
    default_target: String,
    enable_fallback: bool,
    auto_detect: bool,
    log_inputs: bool,
    log_outputs: bool,
    default_level: Level,
    default_exception_level: Level,
    default_template: String,
    exception_template: String,
    templates: BTreeMap<String, String>,
    rules: Vec<MethodRule>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingConfig {
    /**
    The template rendered for successful calls when no template is named.
    */
    pub const DEFAULT_TEMPLATE: &'static str =
        "{TypeName}.{MethodName} completed in {Duration}ms with {InputParameters} returning {OutputValue}";

    /**
    The template rendered for failed calls when no template is named.
    */
    pub const DEFAULT_EXCEPTION_TEMPLATE: &'static str =
        "{TypeName}.{MethodName} failed in {Duration}ms with {InputParameters}: {ExceptionMessage}";

    /**
    Create a configuration with the default settings.

    No methods are logged until a rule or attribute matches them, or [`LoggingConfig::with_auto_detect`] is enabled.
    */
    pub fn new() -> Self {
        LoggingConfig {
            default_formatter_type: FormatterType::Structured,
            default_target: crate::well_known::DEFAULT_TARGET.to_owned(),
            enable_fallback: true,
            auto_detect: false,
            log_inputs: true,
            log_outputs: true,
            default_level: Level::Info,
            default_exception_level: Level::Error,
            default_template: Self::DEFAULT_TEMPLATE.to_owned(),
            exception_template: Self::DEFAULT_EXCEPTION_TEMPLATE.to_owned(),
            templates: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    /**
    Set the formatter used when a method doesn't name one.
    */
    pub fn with_default_formatter_type(mut self, formatter_type: FormatterType) -> Self {
        self.default_formatter_type = formatter_type;
        self
    }

    /**
    Set the target used when a method doesn't name one.
    */
    pub fn with_default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = target.into();
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
    Set whether methods without a rule or attribute are logged.
    */
    pub fn with_auto_detect(mut self, auto_detect: bool) -> Self {
        self.auto_detect = auto_detect;
        self
    }

    /**
    Set whether input parameters are captured by default.
    */
    pub fn with_log_inputs(mut self, log_inputs: bool) -> Self {
        self.log_inputs = log_inputs;
        self
    }

    /**
    Set whether return values are captured by default.
    */
    pub fn with_log_outputs(mut self, log_outputs: bool) -> Self {
        self.log_outputs = log_outputs;
        self
    }

    /**
    Set the level of successful calls.
    */
    pub fn with_default_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /**
    Set the level of failed calls.
    */
    pub fn with_default_exception_level(mut self, level: Level) -> Self {
        self.default_exception_level = level;
        self
    }

    /**
    Set the template rendered for successful calls.
    */
    pub fn with_default_template(mut self, template: impl Into<String>) -> Self {
        self.default_template = template.into();
        self
    }

    /**
    Set the template rendered for failed calls.
    */
    pub fn with_exception_template(mut self, template: impl Into<String>) -> Self {
        self.exception_template = template.into();
        self
    }

    /**
    Define a named template.
    */
    pub fn with_template(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(name.into(), template.into());
        self
    }

    /**
    Append a rule.

    Rules are evaluated in the order they're added and the first match wins.
    */
    pub fn with_rule(mut self, rule: MethodRule) -> Self {
        self.rules.push(rule);
        self
    }

    /**
    The formatter used when a method doesn't name one.
    */
    pub fn default_formatter_type(&self) -> FormatterType {
        self.default_formatter_type
    }

    /**
    The target used when a method doesn't name one.
    */
    pub fn default_target(&self) -> &str {
        &self.default_target
    }

    /**
    Whether a missing formatter falls back to the default one.
    */
    pub fn enable_fallback(&self) -> bool {
        self.enable_fallback
    }

    /**
    Whether methods without a rule or attribute are logged.
    */
    pub fn auto_detect(&self) -> bool {
        self.auto_detect
    }

    /**
    Whether input parameters are captured by default.
    */
    pub fn log_inputs(&self) -> bool {
        self.log_inputs
    }

    /**
    Whether return values are captured by default.
    */
    pub fn log_outputs(&self) -> bool {
        self.log_outputs
    }

    /**
    The level of successful calls.
    */
    pub fn default_level(&self) -> Level {
        self.default_level
    }

    /**
    The level of failed calls.
    */
    pub fn default_exception_level(&self) -> Level {
        self.default_exception_level
    }

    /**
    The template rendered for successful calls.
    */
    pub fn default_template(&self) -> &str {
        &self.default_template
    }

    /**
    The template rendered for failed calls.
    */
    pub fn exception_template(&self) -> &str {
        &self.exception_template
    }

    /**
    Get a named template.
    */
    pub fn template(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(|template| &**template)
    }

    /**
    The rules, in evaluation order.
    */
    pub fn rules(&self) -> &[MethodRule] {
        &self.rules
    }

    /**
    Check the rules and attributes against this configuration.
    */
    pub fn validate(&self, attributes: &AttributeTable) -> Result<(), ConfigError> {
        for rule in &self.rules {
            rule.validate()?;
        }

        for attribute in self
            .rules
            .iter()
            .map(MethodRule::attribute)
            .chain(attributes.attributes())
        {
            if let Some(name) = attribute.template_name() {
                if self.template(name).is_none() {
                    return Err(ConfigError::UnknownTemplate(name.to_owned()));
                }
            }
        }

        Ok(())
    }
}

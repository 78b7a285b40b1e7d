/*!
The [`ConfigError`] and [`SetupError`] types.
*/

use std::io;

use thiserror::Error;

use crate::config::FormatterType;

/**
An error in the logging configuration.

Configuration errors are surfaced at startup by [`crate::Setup::spawn`], and at formatter resolution when fallback is disabled. They never reach the call sites of intercepted methods.
*/
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /**
    The formatter set was empty.
    */
    #[error("no formatters were registered")]
    NoFormatters,
    /**
    More than one formatter was registered for the same type.
    */
    #[error("more than one formatter was registered for `{0}`")]
    DuplicateFormatter(FormatterType),
    /**
    No formatter was registered for the requested type.
    */
    #[error("no formatter is registered for `{requested}` (fallback enabled: {enable_fallback})")]
    FormatterNotFound {
        /**
        The formatter type that was requested.
        */
        requested: FormatterType,
        /**
        Whether fallback was enabled for the request.
        */
        enable_fallback: bool,
    },
    /**
    A rule pattern couldn't be used.
    */
    #[error("the rule pattern `{pattern}` is invalid: {reason}")]
    InvalidPattern {
        /**
        The pattern as it was configured.
        */
        pattern: String,
        /**
        Why the pattern is invalid.
        */
        reason: &'static str,
    },
    /**
    A rule or attribute named a template that isn't configured.
    */
    #[error("the template `{0}` is not defined")]
    UnknownTemplate(String),
}

/**
An error starting the logging pipeline.
*/
#[derive(Error, Debug)]
pub enum SetupError {
    /**
    The configuration was invalid.
    */
    #[error("the logging configuration is invalid: {0}")]
    Config(#[from] ConfigError),
    /**
    The background worker couldn't be started.
    */
    #[error("failed to start the background worker: {0}")]
    Spawn(#[from] io::Error),
}

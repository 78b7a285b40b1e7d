/*!
Decision-cached, non-blocking logging for intercepted method calls.

`autolog` sits behind an interception layer, like a proxy or a wrapper generated around methods, and turns each intercepted call into a log entry. The pipeline looks like this:

1. The [`Interceptor`] consults a [`DecisionCache`] to decide whether and how calls to a method are logged. Decisions come from attributes declared on types and methods, then from ordered [`MethodRule`]s, and are computed once per method.
2. Calls that are logged become [`LogEntry`]s, which are enqueued on a [`LogChannel`] without waiting. If the channel is full the entry is dropped rather than slowing the caller down.
3. A background worker hands entries to the [`Processor`], which formats them with a [`Formatter`] and writes them to the [`Sink`] for their target. Templated messages are translated into the template dialect the sink understands along the way.

# Getting started

Configure the pipeline with [`setup`], and close it before your program exits:

```
use std::time::Duration;

use autolog::{params, LoggingConfig, MethodIdentity, MethodRule};

let init = autolog::setup()
    .config(LoggingConfig::new().with_rule(MethodRule::new("Orders.*")))
    .sink(autolog::sink::from_fn(|message, level, category| {
        println!("[{level}] {category}: {message}");
    }))
    .spawn()
    .unwrap();

let place_order = MethodIdentity::new("Orders", "Place");

let order_id: Result<u64, String> = init.interceptor().intercept(
    &place_order,
    || params! { quantity: 3 },
    || Ok(42),
);

init.close(Duration::from_secs(5));
```

# Diagnostics

`autolog` reports problems with its own operation, like entries that couldn't be formatted, to a separate diagnostics sink. It's silent by default; see [`runtime::init_internal`] to route diagnostics somewhere.
*/

pub mod channel;
pub mod config;
pub mod decision;
pub mod empty;
pub mod entry;
pub mod error;
pub mod format;
pub mod id;
pub mod intercept;
pub mod level;
pub mod processor;
pub mod runtime;
pub mod setup;
pub mod sink;
pub mod template;
pub mod translate;
pub mod value;
pub mod well_known;

mod internal_metrics;

#[doc(inline)]
pub use self::{
    channel::{BackgroundChannel, ChannelState, DirectChannel, Handoff, LogChannel},
    config::{AttributeTable, FormatterType, LogAttribute, LoggingConfig, MethodRule},
    decision::{DecisionCache, InterceptionDecision},
    empty::Empty,
    entry::LogEntry,
    error::{ConfigError, SetupError},
    format::{FormattedMessage, Formatter, FormatterFactory, FormattingContext},
    id::{EntryId, MethodIdentity},
    intercept::{Call, Interceptor},
    level::Level,
    processor::Processor,
    setup::{Init, Setup},
    sink::{Sink, SinkProvider, Targets},
    template::Template,
    translate::{Dialect, TemplateTranslator},
    value::{Params, ToValue, Value},
};

pub use autolog_batcher::Metric;

/**
Start configuring the logging pipeline.

Call [`Setup::spawn`] once configuration is complete to start it.
*/
pub fn setup() -> Setup {
    Setup::new()
}

/*!
The [`Interceptor`] type.

An interceptor is the boundary between intercepted methods and the logging pipeline. It consults the [`DecisionCache`] for each call, builds a [`LogEntry`] if the call should be logged, and enqueues it on a [`LogChannel`].

```
# use autolog::{params, Interceptor, MethodIdentity};
# fn example(interceptor: &Interceptor) -> Result<i32, std::io::Error> {
let place_order = MethodIdentity::new("Orders", "Place");

let id = interceptor.intercept(&place_order, || params! { quantity: 3 }, || {
    Ok::<_, std::io::Error>(42)
})?;
# Ok(id)
# }
```
*/

use core::{fmt, time::Duration};
use std::{sync::Arc, time::Instant};

use crate::{
    channel::LogChannel,
    decision::{DecisionCache, InterceptionDecision},
    entry::LogEntry,
    id::MethodIdentity,
    value::{Params, ToValue, Value},
};

/**
A completed call to an intercepted method.
*/
#[derive(Debug, Clone, Default)]
pub struct Call {
    inputs: Params,
    output: Option<Value>,
    error: Option<String>,
    duration: Duration,
}

impl Call {
    /**
    A call that took the given time.
    */
    pub fn new(duration: Duration) -> Self {
        Call {
            inputs: Params::new(),
            output: None,
            error: None,
            duration,
        }
    }

    /**
    Set the arguments the call was made with.
    */
    pub fn with_inputs(mut self, inputs: Params) -> Self {
        self.inputs = inputs;
        self
    }

    /**
    Set the value the call returned.
    */
    pub fn with_output(mut self, output: impl Into<Value>) -> Self {
        self.output = Some(output.into());
        self
    }

    /**
    Set the error the call failed with.
    */
    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /**
    The arguments the call was made with.
    */
    pub fn inputs(&self) -> &Params {
        &self.inputs
    }

    /**
    The value the call returned.
    */
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /**
    The error the call failed with.
    */
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /**
    How long the call took.
    */
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/**
Records intercepted calls as [`LogEntry`]s.
*/
pub struct Interceptor {
    decisions: Arc<DecisionCache>,
    channel: Arc<dyn LogChannel + Send + Sync>,
}

impl Interceptor {
    /**
    Create an interceptor that enqueues entries on the given channel.
    */
    pub fn new(
        decisions: Arc<DecisionCache>,
        channel: Arc<dyn LogChannel + Send + Sync>,
    ) -> Self {
        Interceptor {
            decisions,
            channel,
        }
    }

    /**
    The decision for a method.
    */
    pub fn decision(&self, identity: &MethodIdentity) -> Arc<InterceptionDecision> {
        self.decisions.resolve(identity)
    }

    /**
    The cache of decisions.
    */
    pub fn decisions(&self) -> &DecisionCache {
        &self.decisions
    }

    /**
    Record a completed call.

    Returns `true` if an entry was enqueued. Calls to methods that aren't logged, and calls that couldn't be enqueued, return `false`.
    */
    pub fn record(&self, identity: &MethodIdentity, call: Call) -> bool {
        let decision = self.decision(identity);

        self.record_with(identity, &decision, call)
    }

    /**
    Time a call and record it.

    The `inputs` function is only called if the method's arguments are logged. The result of `f` is returned as-is.
    */
    pub fn intercept<T: ToValue, E: fmt::Display>(
        &self,
        identity: &MethodIdentity,
        inputs: impl FnOnce() -> Params,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let decision = self.decision(identity);

        if !decision.should_log {
            return f();
        }

        let inputs = if decision.input_logging {
            inputs()
        } else {
            Params::new()
        };

        let start = Instant::now();
        let result = f();
        let mut call = Call::new(start.elapsed()).with_inputs(inputs);

        match &result {
            Ok(output) if decision.output_logging => call = call.with_output(output.to_value()),
            Ok(_) => (),
            Err(err) => call = call.with_error(err),
        }

        self.record_with(identity, &decision, call);

        result
    }

    fn record_with(
        &self,
        identity: &MethodIdentity,
        decision: &InterceptionDecision,
        call: Call,
    ) -> bool {
        if !decision.should_log {
            return false;
        }

        let Call {
            inputs,
            output,
            error,
            duration,
        } = call;

        let mut entry = LogEntry::builder(identity.type_name(), identity.method_name())
            .level(decision.level)
            .exception_level(decision.exception_level)
            .formatter_type(decision.formatter_type)
            .duration(duration);

        if decision.input_logging {
            entry = entry.input_parameters(inputs);
        }

        if let (true, Some(output)) = (decision.output_logging, output) {
            entry = entry.output_value(output);
        }

        if let Some(error) = error {
            entry = entry.exception_message(error);
        }

        if let Some(target) = &decision.target {
            entry = entry.target(target.clone());
        }

        if let Some(template_name) = &decision.template_name {
            entry = entry.template_name(template_name.clone());
        }

        self.channel.try_enqueue(entry.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use crate::{
        channel::{self, DirectChannel},
        config::{AttributeTable, LogAttribute, LoggingConfig, MethodRule},
        level::Level,
    };

    fn capture(
        config: LoggingConfig,
        attributes: AttributeTable,
    ) -> (Arc<Mutex<Vec<LogEntry>>>, Interceptor) {
        let entries = Arc::new(Mutex::new(Vec::new()));

        let channel = DirectChannel::new(channel::from_fn({
            let entries = entries.clone();

            move |entry: LogEntry| entries.lock().unwrap().push(entry)
        }));

        let interceptor = Interceptor::new(
            Arc::new(DecisionCache::new(Arc::new(config), Arc::new(attributes))),
            Arc::new(channel),
        );

        (entries, interceptor)
    }

    #[test]
    fn record_skips_unlogged_methods() {
        let (entries, interceptor) = capture(LoggingConfig::new(), AttributeTable::new());

        assert!(!interceptor.record(
            &MethodIdentity::new("Svc", "Do"),
            Call::new(Duration::from_millis(1))
        ));
        assert!(entries.lock().unwrap().is_empty());
    }

    #[test]
    fn record_applies_decision() {
        let (entries, interceptor) = capture(
            LoggingConfig::new(),
            AttributeTable::new().with_method(
                "Svc",
                "Do",
                LogAttribute::new()
                    .with_output_logging(false)
                    .with_target("calls")
                    .with_level(Level::Debug)
                    .with_template_name("do"),
            ),
        );

        assert!(interceptor.record(
            &MethodIdentity::new("Svc", "Do"),
            Call::new(Duration::from_millis(3))
                .with_inputs(Params::new().with("x", 1))
                .with_output(5)
        ));

        let entries = entries.lock().unwrap();
        let entry = &entries[0];

        assert_eq!("Svc", entry.type_name());
        assert_eq!("Do", entry.method_name());
        assert_eq!(Some(&Value::I64(1)), entry.input_parameters().get("x"));
        assert_eq!(None, entry.output_value());
        assert_eq!(Some("calls"), entry.target());
        assert_eq!(Level::Debug, entry.level());
        assert_eq!(Some("do"), entry.template_name());
        assert_eq!(Duration::from_millis(3), entry.duration());
    }

    #[test]
    fn intercept_captures_results() {
        let (entries, interceptor) = capture(
            LoggingConfig::new().with_rule(MethodRule::new("Svc.*")),
            AttributeTable::new(),
        );

        let ok: Result<i32, String> = interceptor.intercept(
            &MethodIdentity::new("Svc", "Add"),
            || Params::new().with("a", 1).with("b", 2),
            || Ok(3),
        );

        let err: Result<i32, String> = interceptor.intercept(
            &MethodIdentity::new("Svc", "Div"),
            || Params::new().with("a", 1).with("b", 0),
            || Err("division by zero".to_owned()),
        );

        assert_eq!(Ok(3), ok);
        assert_eq!(Err("division by zero".to_owned()), err);

        let entries = entries.lock().unwrap();

        assert_eq!(2, entries.len());

        assert_eq!(Some(&Value::I64(3)), entries[0].output_value());
        assert!(!entries[0].is_failure());

        assert_eq!(Some("division by zero"), entries[1].exception_message());
        assert_eq!(Level::Error, entries[1].effective_level());
    }

    #[test]
    fn intercept_skips_input_capture_when_disabled() {
        let (entries, interceptor) = capture(LoggingConfig::new(), AttributeTable::new());

        let result: Result<(), String> = interceptor.intercept(
            &MethodIdentity::new("Svc", "Do"),
            || panic!("inputs were captured"),
            || Ok(()),
        );

        assert_eq!(Ok(()), result);
        assert!(entries.lock().unwrap().is_empty());

        let (entries, interceptor) = capture(
            LoggingConfig::new().with_rule(MethodRule::with_attribute(
                "Svc.Do",
                LogAttribute::new().with_input_logging(false),
            )),
            AttributeTable::new(),
        );

        let result: Result<(), String> = interceptor.intercept(
            &MethodIdentity::new("Svc", "Do"),
            || panic!("inputs were captured"),
            || Ok(()),
        );

        assert_eq!(Ok(()), result);
        assert!(entries.lock().unwrap()[0].input_parameters().is_empty());
    }
}

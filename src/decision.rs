/*!
The [`DecisionCache`] type.

Deciding whether and how a method is logged involves scanning attributes and pattern rules, so it's done once per distinct method and memoized. After the first call every lookup is a read from a concurrent map.
*/

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    config::{AttributeTable, FormatterType, LogAttribute, LoggingConfig},
    id::MethodIdentity,
    level::Level,
};

/**
The verdict on whether and how calls to a method are logged.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptionDecision {
    /**
    Whether calls are logged at all.
    */
    pub should_log: bool,
    /**
    Whether arguments are captured.
    */
    pub input_logging: bool,
    /**
    Whether return values are captured.
    */
    pub output_logging: bool,
    /**
    The formatter used.
    */
    pub formatter_type: FormatterType,
    /**
    The target entries are routed to, or `None` for the default target.
    */
    pub target: Option<String>,
    /**
    The level of successful calls.
    */
    pub level: Level,
    /**
    The level of failed calls.
    */
    pub exception_level: Level,
    /**
    The named template to render, or `None` for the configured defaults.
    */
    pub template_name: Option<String>,
}

impl InterceptionDecision {
    /**
    A decision that doesn't log.
    */
    pub fn disabled(config: &LoggingConfig) -> Self {
        InterceptionDecision {
            should_log: false,
            input_logging: false,
            output_logging: false,
            ..Self::from_defaults(config)
        }
    }

    /**
    A decision that logs using the configured defaults.
    */
    pub fn from_defaults(config: &LoggingConfig) -> Self {
        InterceptionDecision {
            should_log: true,
            input_logging: config.log_inputs(),
            output_logging: config.log_outputs(),
            formatter_type: config.default_formatter_type(),
            target: None,
            level: config.default_level(),
            exception_level: config.default_exception_level(),
            template_name: None,
        }
    }

    /**
    A decision from an attribute, taking unspecified settings from the configured defaults.
    */
    pub fn from_attribute(attribute: &LogAttribute, config: &LoggingConfig) -> Self {
        if !attribute.enabled() {
            return Self::disabled(config);
        }

        InterceptionDecision {
            should_log: true,
            input_logging: attribute.input_logging().unwrap_or(config.log_inputs()),
            output_logging: attribute.output_logging().unwrap_or(config.log_outputs()),
            formatter_type: attribute
                .formatter_type()
                .unwrap_or(config.default_formatter_type()),
            target: attribute.target().map(Into::into),
            level: attribute.level().unwrap_or(config.default_level()),
            exception_level: attribute
                .exception_level()
                .unwrap_or(config.default_exception_level()),
            template_name: attribute.template_name().map(Into::into),
        }
    }
}

/**
A memoized map of method identities to their [`InterceptionDecision`]s.

The cache never evicts; its size is bounded by the number of distinct intercepted methods.
*/
pub struct DecisionCache {
    config: Arc<LoggingConfig>,
    attributes: Arc<AttributeTable>,
    decisions: DashMap<MethodIdentity, Arc<InterceptionDecision>>,
}

impl DecisionCache {
    /**
    Create an empty cache that resolves decisions using the given configuration and attributes.
    */
    pub fn new(config: Arc<LoggingConfig>, attributes: Arc<AttributeTable>) -> Self {
        DecisionCache {
            config,
            attributes,
            decisions: DashMap::new(),
        }
    }

    /**
    Get the decision for a method.

    The first call for a method computes its decision. Later calls return the same shared decision. If several threads race on the first call they may each compute a decision, but they all return the one that was inserted first.
    */
    pub fn resolve(&self, identity: &MethodIdentity) -> Arc<InterceptionDecision> {
        if let Some(decision) = self.decisions.get(identity) {
            return decision.value().clone();
        }

        // Compute outside of any shard lock, then keep whichever decision landed first
        let decision = Arc::new(self.compute(identity));

        self.decisions
            .entry(identity.clone())
            .or_insert(decision)
            .value()
            .clone()
    }

    /**
    Compute the decision for a method without consulting or updating the cache.
    */
    pub fn compute(&self, identity: &MethodIdentity) -> InterceptionDecision {
        if let Some(attribute) = self.attributes.get(identity) {
            return InterceptionDecision::from_attribute(attribute, &self.config);
        }

        if !self.config.rules().is_empty() {
            let qualified_name = identity.qualified_name();

            if let Some(rule) = self
                .config
                .rules()
                .iter()
                .find(|rule| rule.matches(&qualified_name))
            {
                return InterceptionDecision::from_attribute(rule.attribute(), &self.config);
            }
        }

        if self.config.auto_detect() {
            InterceptionDecision::from_defaults(&self.config)
        } else {
            InterceptionDecision::disabled(&self.config)
        }
    }

    /**
    Whether a decision has been cached for a method.
    */
    pub fn contains(&self, identity: &MethodIdentity) -> bool {
        self.decisions.contains_key(identity)
    }

    /**
    The number of cached decisions.
    */
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /**
    Whether no decisions have been cached.
    */
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /**
    The configuration decisions are resolved with.
    */
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{sync::Barrier, thread};

    use crate::config::MethodRule;

    fn cache(config: LoggingConfig, attributes: AttributeTable) -> DecisionCache {
        DecisionCache::new(Arc::new(config), Arc::new(attributes))
    }

    #[test]
    fn resolve_is_memoized() {
        let cache = cache(LoggingConfig::new().with_auto_detect(true), AttributeTable::new());

        let id = MethodIdentity::new("Svc", "Do");

        assert!(!cache.contains(&id));

        let a = cache.resolve(&id);
        let b = cache.resolve(&MethodIdentity::new("Svc", "Do"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.contains(&id));
        assert_eq!(1, cache.len());
    }

    #[test]
    fn resolve_converges_across_threads() {
        let cache = Arc::new(cache(
            LoggingConfig::new().with_rule(MethodRule::new("Svc.*")),
            AttributeTable::new(),
        ));

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles = (0..threads)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();

                thread::spawn(move || {
                    barrier.wait();
                    cache.resolve(&MethodIdentity::new("Svc", "Do"))
                })
            })
            .collect::<Vec<_>>();

        let decisions = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();

        let cached = cache.resolve(&MethodIdentity::new("Svc", "Do"));

        for decision in decisions {
            assert!(Arc::ptr_eq(&cached, &decision));
        }

        assert_eq!(1, cache.len());
    }

    #[test]
    fn attribute_wins_over_rule() {
        let cache = cache(
            LoggingConfig::new().with_rule(MethodRule::with_attribute(
                "Svc.*",
                LogAttribute::new().with_target("rules"),
            )),
            AttributeTable::new().with_method(
                "Svc",
                "Do",
                LogAttribute::new().with_target("attributes"),
            ),
        );

        let decision = cache.resolve(&MethodIdentity::new("Svc", "Do"));
        assert_eq!(Some("attributes"), decision.target.as_deref());

        let decision = cache.resolve(&MethodIdentity::new("Svc", "Other"));
        assert_eq!(Some("rules"), decision.target.as_deref());
    }

    #[test]
    fn first_matching_rule_wins() {
        let cache = cache(
            LoggingConfig::new()
                .with_rule(MethodRule::with_attribute("Svc.Secret", LogAttribute::skip()))
                .with_rule(MethodRule::with_attribute(
                    "Svc.*",
                    LogAttribute::new()
                        .with_formatter_type(FormatterType::Json)
                        .with_output_logging(false),
                )),
            AttributeTable::new(),
        );

        let secret = cache.resolve(&MethodIdentity::new("Svc", "Secret"));
        assert!(!secret.should_log);

        let other = cache.resolve(&MethodIdentity::new("Svc", "Do"));
        assert!(other.should_log);
        assert!(other.input_logging);
        assert!(!other.output_logging);
        assert_eq!(FormatterType::Json, other.formatter_type);
    }

    #[test]
    fn default_depends_on_auto_detect() {
        let id = MethodIdentity::new("Unmatched", "Do");

        let off = cache(LoggingConfig::new(), AttributeTable::new());
        assert!(!off.resolve(&id).should_log);

        let on = cache(
            LoggingConfig::new()
                .with_auto_detect(true)
                .with_default_level(Level::Debug),
            AttributeTable::new(),
        );

        let decision = on.resolve(&id);
        assert!(decision.should_log);
        assert_eq!(Level::Debug, decision.level);
        assert_eq!(Level::Error, decision.exception_level);
        assert_eq!(None, decision.target);
    }
}

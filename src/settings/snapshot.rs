// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed, validated configuration built from the settings and secrets payloads.

use crate::constants::settings::{
    CONSOLE_SERVICE, CONTEXT, DEFAULT_TRIGGERS, SERVICE_PREFIX, SUBSCRIPTIONS, TEMPLATE_PREFIX,
    TRIGGER_PREFIX,
};
use crate::error::ValidationError;
use crate::settings::notifier::{Notifier, ServiceOptions};
use crate::settings::payload::RawPayload;
use crate::settings::subscriptions::{
    selector_matches, AnnotatedSubscription, Destination, ResolvedSubscription, Subscription,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

static SECRET_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z0-9_.-]+)").expect("secret reference pattern is valid"));

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Template {
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Service specific fields (`slack`, `email`, ...) kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub when: String,
    #[serde(default)]
    pub send: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub once_per: Option<String>,
}

/// Immutable configuration the worker is built from
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub templates: BTreeMap<String, Template>,
    pub triggers: BTreeMap<String, Vec<Condition>>,
    pub notifier: Notifier,
    pub subscriptions: Vec<Subscription>,
    pub default_triggers: Vec<String>,
    pub context: BTreeMap<String, String>,
}

impl ConfigSnapshot {
    /// Parse and cross-check the merged settings and secrets payloads
    pub fn from_payloads(
        settings: &RawPayload,
        secrets: &RawPayload,
    ) -> Result<Self, ValidationError> {
        let mut snapshot = ConfigSnapshot::default();

        for (key, _) in settings.iter() {
            if let Some(name) = key.strip_prefix(TEMPLATE_PREFIX) {
                let template: Template = parse_yaml(settings, key)?;
                snapshot.templates.insert(name.to_string(), template);
            } else if let Some(name) = key.strip_prefix(TRIGGER_PREFIX) {
                let conditions: Option<Vec<Condition>> = parse_yaml(settings, key)?;
                snapshot
                    .triggers
                    .insert(name.to_string(), conditions.unwrap_or_default());
            } else if let Some(rest) = key.strip_prefix(SERVICE_PREFIX) {
                let (kind, name) = rest.split_once('.').unwrap_or((rest, rest));
                let options: Option<BTreeMap<String, Value>> = parse_yaml(settings, key)?;
                let options: BTreeMap<String, Value> = options
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| substitute_secrets(name, v, secrets).map(|v| (k, v)))
                    .collect::<Result<_, _>>()?;
                snapshot.notifier.add_configured(
                    name,
                    ServiceOptions {
                        kind: kind.to_string(),
                        options,
                    },
                );
            } else if key == SUBSCRIPTIONS {
                let subscriptions: Option<Vec<Subscription>> = parse_yaml(settings, key)?;
                snapshot.subscriptions = subscriptions.unwrap_or_default();
            } else if key == DEFAULT_TRIGGERS {
                let triggers: Option<Vec<String>> = parse_yaml(settings, key)?;
                snapshot.default_triggers = triggers.unwrap_or_default();
            } else if key == CONTEXT {
                let context: Option<BTreeMap<String, String>> = parse_yaml(settings, key)?;
                snapshot.context = context.unwrap_or_default();
            } else {
                debug!("Ignoring unrecognized settings key '{}'", key);
            }
        }

        snapshot.check_references()?;
        Ok(snapshot)
    }

    fn check_references(&self) -> Result<(), ValidationError> {
        for (name, conditions) in &self.triggers {
            if conditions.is_empty() {
                return Err(ValidationError::EmptyTrigger(name.clone()));
            }
            for condition in conditions {
                if condition.when.trim().is_empty() {
                    return Err(ValidationError::EmptyCondition(name.clone()));
                }
                if let Some(template) = condition
                    .send
                    .iter()
                    .find(|t| !self.templates.contains_key(*t))
                {
                    return Err(ValidationError::UnknownTemplate {
                        trigger: name.clone(),
                        template: template.clone(),
                    });
                }
            }
        }

        for trigger in &self.default_triggers {
            self.check_trigger(DEFAULT_TRIGGERS, trigger)?;
        }

        for (i, subscription) in self.subscriptions.iter().enumerate() {
            let referrer = format!("subscription #{}", i + 1);
            for trigger in &subscription.triggers {
                self.check_trigger(&referrer, trigger)?;
            }
            for recipient in &subscription.recipients {
                let destination = Destination::parse(recipient)?;
                if !self.is_known_service(&destination.service) {
                    return Err(ValidationError::UnknownService {
                        referrer,
                        service: destination.service,
                    });
                }
            }
        }

        Ok(())
    }

    fn check_trigger(&self, referrer: &str, trigger: &str) -> Result<(), ValidationError> {
        if self.triggers.contains_key(trigger) {
            Ok(())
        } else {
            Err(ValidationError::UnknownTrigger {
                referrer: referrer.to_string(),
                trigger: trigger.to_string(),
            })
        }
    }

    // The console sink is registered after validation, so it counts as defined here.
    fn is_known_service(&self, service: &str) -> bool {
        service == CONSOLE_SERVICE || self.notifier.has_service(service)
    }

    /// Subscriptions that apply to an application, from its annotations and the default subscriptions.
    /// References to unknown triggers or services are skipped.
    pub fn resolve_subscriptions(
        &self,
        annotated: &[AnnotatedSubscription],
        labels: &BTreeMap<String, String>,
    ) -> Vec<ResolvedSubscription> {
        let mut resolved = BTreeSet::new();

        for subscription in annotated {
            if !self.notifier.has_service(&subscription.service) {
                debug!("Skipping subscription to unknown service '{}'", subscription.service);
                continue;
            }
            let triggers = match &subscription.trigger {
                Some(trigger) => std::slice::from_ref(trigger),
                None => self.default_triggers.as_slice(),
            };
            for trigger in triggers {
                if !self.triggers.contains_key(trigger) {
                    debug!("Skipping subscription to unknown trigger '{}'", trigger);
                    continue;
                }
                for recipient in &subscription.recipients {
                    resolved.insert(ResolvedSubscription {
                        trigger: trigger.clone(),
                        destination: Destination {
                            service: subscription.service.clone(),
                            recipient: recipient.clone(),
                        },
                    });
                }
            }
        }

        for subscription in &self.subscriptions {
            if let Some(selector) = &subscription.selector {
                if !selector_matches(selector, labels) {
                    continue;
                }
            }
            let triggers = if subscription.triggers.is_empty() {
                &self.default_triggers
            } else {
                &subscription.triggers
            };
            for destination in subscription
                .recipients
                .iter()
                .filter_map(|r| Destination::parse(r).ok())
            {
                for trigger in triggers {
                    resolved.insert(ResolvedSubscription {
                        trigger: trigger.clone(),
                        destination: destination.clone(),
                    });
                }
            }
        }

        resolved.into_iter().collect()
    }
}

fn parse_yaml<T: DeserializeOwned>(payload: &RawPayload, key: &str) -> Result<T, ValidationError> {
    let Some(Some(raw)) = payload.get_str(key) else {
        return Err(ValidationError::InvalidEncoding(key.to_string()));
    };
    serde_yaml::from_str(raw).map_err(|source| ValidationError::InvalidYaml {
        key: key.to_string(),
        source,
    })
}

fn substitute_secrets(
    service: &str,
    value: Value,
    secrets: &RawPayload,
) -> Result<Value, ValidationError> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_str(service, &s, secrets)?)),
        Value::Sequence(items) => items
            .into_iter()
            .map(|v| substitute_secrets(service, v, secrets))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Value::Mapping(entries) => {
            let mut out = Mapping::new();
            for (k, v) in entries {
                out.insert(k, substitute_secrets(service, v, secrets)?);
            }
            Ok(Value::Mapping(out))
        }
        other => Ok(other),
    }
}

fn substitute_str(service: &str, raw: &str, secrets: &RawPayload) -> Result<String, ValidationError> {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for caps in SECRET_REF.captures_iter(raw) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let secret = match secrets.get_str(key.as_str()) {
            Some(Some(v)) => v.trim(),
            Some(None) => {
                return Err(ValidationError::InvalidSecretEncoding(key.as_str().to_string()))
            }
            None => {
                return Err(ValidationError::MissingSecret {
                    service: service.to_string(),
                    key: key.as_str().to_string(),
                })
            }
        };
        out.push_str(&raw[last..whole.start()]);
        out.push_str(secret);
        last = whole.end();
    }
    out.push_str(&raw[last..]);
    Ok(out)
}

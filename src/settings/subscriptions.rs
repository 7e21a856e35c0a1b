// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Notification subscriptions: who gets notified, through which service, for which trigger.

use crate::error::ValidationError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A default subscription declared under the `subscriptions` settings key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Triggers to subscribe to; empty means the default triggers
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Label selector limiting which applications the subscription applies to
    #[serde(default)]
    pub selector: Option<String>,
}

/// A subscription declared on an application through a
/// `notifications.argoproj.io/subscribe.[<trigger>.]<service>` annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedSubscription {
    /// `None` subscribes to the default triggers
    pub trigger: Option<String>,
    pub service: String,
    pub recipients: Vec<String>,
}

/// A `<service>:<recipient>` pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Destination {
    pub service: String,
    pub recipient: String,
}

impl Destination {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.split_once(':') {
            Some((service, recipient)) if !service.trim().is_empty() => Ok(Self {
                service: service.trim().to_string(),
                recipient: recipient.trim().to_string(),
            }),
            _ => Err(ValidationError::MalformedRecipient(value.to_string())),
        }
    }
}

/// A subscription of one destination to one trigger, resolved for a specific application
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolvedSubscription {
    pub trigger: String,
    pub destination: Destination,
}

/// Check a Kubernetes equality-based label selector (`a=b,c!=d,e,!f`) against labels
pub fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((key, value)) = term.split_once("!=") {
                labels.get(key.trim()).map(String::as_str) != Some(value.trim())
            } else if let Some((key, value)) = term
                .split_once("==")
                .or_else(|| term.split_once('='))
            {
                labels.get(key.trim()).map(String::as_str) == Some(value.trim())
            } else if let Some(key) = term.strip_prefix('!') {
                !labels.contains_key(key.trim())
            } else {
                labels.contains_key(term)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_destination_parse() {
        let dest = Destination::parse("slack:deployments").unwrap();
        assert_eq!(dest.service, "slack");
        assert_eq!(dest.recipient, "deployments");
    }

    #[test]
    fn test_destination_parse_keeps_colons_in_recipient() {
        let dest = Destination::parse("webhook:https://example.com").unwrap();
        assert_eq!(dest.service, "webhook");
        assert_eq!(dest.recipient, "https://example.com");
    }

    #[test]
    fn test_destination_parse_rejects_missing_service() {
        assert!(Destination::parse("deployments").is_err());
        assert!(Destination::parse(":deployments").is_err());
    }

    #[test]
    fn test_selector_equality() {
        let l = labels(&[("team", "payments"), ("env", "prod")]);
        assert!(selector_matches("team=payments", &l));
        assert!(selector_matches("team==payments, env=prod", &l));
        assert!(!selector_matches("team=search", &l));
    }

    #[test]
    fn test_selector_inequality_and_existence() {
        let l = labels(&[("team", "payments")]);
        assert!(selector_matches("env!=prod", &l));
        assert!(selector_matches("team", &l));
        assert!(selector_matches("!env", &l));
        assert!(!selector_matches("!team", &l));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        assert!(selector_matches("", &BTreeMap::new()));
    }
}

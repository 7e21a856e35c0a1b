// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::annotations::SUBSCRIBE_PREFIX;
use crate::settings::AnnotatedSubscription;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "Application")]
#[kube(namespaced)]
#[kube(status = "ApplicationStatus")]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<serde_json::Value>,
}

impl Application {
    /// Sync status, e.g. `Synced` or `OutOfSync`
    pub fn sync_status(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.sync.as_ref())
            .map(|s| s.status.as_str())
    }

    /// Health status, e.g. `Healthy` or `Degraded`
    pub fn health_status(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .map(|h| h.status.as_str())
    }

    /// Subscriptions declared through `notifications.argoproj.io/subscribe.*` annotations
    pub fn subscriptions(&self) -> Vec<AnnotatedSubscription> {
        self.metadata
            .annotations
            .iter()
            .flatten()
            .filter_map(|(key, value)| {
                let target = key.strip_prefix(SUBSCRIBE_PREFIX)?;
                let (trigger, service) = match target.rsplit_once('.') {
                    Some((trigger, service)) => (Some(trigger.to_string()), service),
                    None => (None, target),
                };
                if service.is_empty() {
                    return None;
                }
                let recipients = value
                    .split(';')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect();
                Some(AnnotatedSubscription {
                    trigger,
                    service: service.to_string(),
                    recipients,
                })
            })
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Failed to parse new settings: {0}")]
    InvalidSettings(#[from] ValidationError),

    #[error("Failed to construct worker: {0}")]
    WorkerConstruction(String),

    #[error("Failed to initialize worker: {0}")]
    WorkerInitialization(String),

    #[error("Timed out after {0:?} waiting for caches to sync")]
    SyncTimeout(Duration),

    #[error("Watch for {0} stopped before its cache synced")]
    WatchClosed(String),

    #[error("Controller task stopped: {0}")]
    TaskStopped(String),

    #[error("Metrics endpoint failed: {0}")]
    MetricsError(String),
}

/// Reasons a merged settings/secrets pair cannot become a configuration snapshot.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("key '{key}' is not valid YAML: {source}")]
    InvalidYaml {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("key '{0}' is not valid UTF-8")]
    InvalidEncoding(String),

    #[error("trigger '{0}' has no conditions")]
    EmptyTrigger(String),

    #[error("trigger '{0}' has a condition with an empty 'when' expression")]
    EmptyCondition(String),

    #[error("trigger '{trigger}' sends undefined template '{template}'")]
    UnknownTemplate { trigger: String, template: String },

    #[error("{referrer} references undefined trigger '{trigger}'")]
    UnknownTrigger { referrer: String, trigger: String },

    #[error("{referrer} references undefined service '{service}'")]
    UnknownService { referrer: String, service: String },

    #[error("recipient '{0}' must have the form <service>:<recipient>")]
    MalformedRecipient(String),

    #[error("service '{service}' references secret key '{key}' which does not exist")]
    MissingSecret { service: String, key: String },

    #[error("secret key '{0}' is not valid UTF-8")]
    InvalidSecretEncoding(String),
}

pub type Result<T> = std::result::Result<T, ControllerError>;

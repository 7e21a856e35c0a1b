// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Well-known names of the watched configuration resources
pub mod resources {
    /// ConfigMap holding templates, triggers and service settings
    pub const CONFIG_MAP_NAME: &str = "argocd-notifications-cm";
    /// Secret holding the credentials referenced by service settings
    pub const SECRET_NAME: &str = "argocd-notifications-secret";
}

/// Key layout of the settings ConfigMap
pub mod settings {
    pub const TEMPLATE_PREFIX: &str = "template.";
    pub const TRIGGER_PREFIX: &str = "trigger.";
    pub const SERVICE_PREFIX: &str = "service.";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const DEFAULT_TRIGGERS: &str = "defaultTriggers";
    pub const CONTEXT: &str = "context";
    /// Name under which the built-in console sink is registered
    pub const CONSOLE_SERVICE: &str = "console";
}

/// Application annotations understood by the worker
pub mod annotations {
    /// `notifications.argoproj.io/subscribe.<trigger>.<service>: <recipient>;<recipient>`
    pub const SUBSCRIBE_PREFIX: &str = "notifications.argoproj.io/subscribe.";
}

/// Command line defaults
pub mod defaults {
    pub const METRICS_PORT: u16 = 9001;
    pub const PROCESSORS_COUNT: usize = 1;
    pub const SYNC_TIMEOUT_SECS: u64 = 60;
    pub const LOG_LEVEL: &str = "info";
    pub const ARGOCD_REPO_SERVER: &str = "argocd-repo-server:8081";
}

/// Capacity of the per-watcher event channel feeding the merger
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Capacity of the queue between the application watch and the processors
pub const PROCESSOR_QUEUE_CAPACITY: usize = 256;

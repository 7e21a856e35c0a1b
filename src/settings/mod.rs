// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Notification settings: raw payloads, validation into snapshots, and notification services.

pub mod notifier;
pub mod payload;
pub mod snapshot;
pub mod subscriptions;

pub use notifier::{ConsoleService, Notification, NotificationSink, Notifier, Service, ServiceOptions};
pub use payload::RawPayload;
pub use snapshot::{Condition, ConfigSnapshot, Template};
pub use subscriptions::{AnnotatedSubscription, Destination, ResolvedSubscription, Subscription};

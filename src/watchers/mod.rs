// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watchers for the settings ConfigMap and the credentials Secret.

pub mod event;
pub mod readiness;
pub mod resource;

pub use event::{ConfigUpdate, EventKind, WatchEvent};
pub use readiness::{await_initial_sync, await_initial_sync_or_failure, task_failure};
pub use resource::{ResourceWatcher, SyncedWatch, WatchedResource};

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Events delivered by the resource watchers to the config merger.

use crate::settings::RawPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// First sighting of the resource (initial list or creation)
    Added,
    Updated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Updated => "updated",
        }
    }
}

/// Latest payload of one of the two configuration resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigUpdate {
    Settings(RawPayload),
    Secrets(RawPayload),
}

impl ConfigUpdate {
    pub fn resource(&self) -> &'static str {
        match self {
            ConfigUpdate::Settings(_) => "settings",
            ConfigUpdate::Secrets(_) => "secrets",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub update: ConfigUpdate,
}

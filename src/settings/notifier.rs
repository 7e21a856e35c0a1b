// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Notification services known to a configuration snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// A rendered notification ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: Option<String>,
    pub message: String,
}

/// A service that delivers notifications in-process
pub trait NotificationSink: Send + Sync + fmt::Debug {
    fn send(&self, notification: &Notification, recipient: &str) -> io::Result<()>;
}

/// Connection parameters of a service declared in the settings, secrets resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOptions {
    /// Service type, e.g. `slack` for `service.slack` or `service.webhook.github`
    pub kind: String,
    pub options: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone)]
pub enum Service {
    Configured(ServiceOptions),
    Sink(Arc<dyn NotificationSink>),
}

/// Named notification services available to the worker
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    services: BTreeMap<String, Service>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-process sink, replacing any service with the same name
    pub fn add_service(&mut self, name: impl Into<String>, sink: Arc<dyn NotificationSink>) {
        self.services.insert(name.into(), Service::Sink(sink));
    }

    pub(crate) fn add_configured(&mut self, name: impl Into<String>, options: ServiceOptions) {
        self.services.insert(name.into(), Service::Configured(options));
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Writes notifications to a stream, stdout by default. Handy when debugging triggers.
pub struct ConsoleService {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleService {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl fmt::Debug for ConsoleService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleService").finish_non_exhaustive()
    }
}

impl NotificationSink for ConsoleService {
    fn send(&self, notification: &Notification, recipient: &str) -> io::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "console output lock poisoned"))?;
        match &notification.title {
            Some(title) => writeln!(out, "[{}] {}: {}", recipient, title, notification.message)?,
            None => writeln!(out, "[{}] {}", recipient, notification.message)?,
        }
        out.flush()
    }
}

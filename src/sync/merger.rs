// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Combines the settings and secrets updates into validated snapshots.

use crate::constants::settings::CONSOLE_SERVICE;
use crate::error::Result;
use crate::metrics;
use crate::settings::{ConfigSnapshot, ConsoleService, RawPayload};
use crate::sync::lifecycle::WorkerLifecycle;
use crate::watchers::{ConfigUpdate, WatchEvent};
use crate::worker::WorkerFactory;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument};

struct MergeState<F: WorkerFactory> {
    settings: Option<RawPayload>,
    secrets: Option<RawPayload>,
    generation: u64,
    lifecycle: WorkerLifecycle<F>,
}

/// Latest payload of each resource plus the worker lifecycle, behind one lock.
///
/// The lock is held from the field update through validation and worker hand-off, so merge
/// attempts from the two watchers are applied one at a time in arrival order.
pub struct ConfigMerger<F: WorkerFactory> {
    state: Mutex<MergeState<F>>,
}

impl<F: WorkerFactory> ConfigMerger<F> {
    pub fn new(lifecycle: WorkerLifecycle<F>) -> Self {
        Self {
            state: Mutex::new(MergeState {
                settings: None,
                secrets: None,
                generation: 0,
                lifecycle,
            }),
        }
    }

    /// Record `update` and, once both resources are known, validate and apply the merged snapshot.
    ///
    /// Every update is a new merge attempt, even when the payload did not change.
    #[instrument(skip(self, update), fields(resource = update.resource()))]
    pub async fn on_update(&self, update: ConfigUpdate) -> Result<()> {
        metrics::record_merge_attempt(update.resource());

        let mut state = self.state.lock().await;
        match update {
            ConfigUpdate::Settings(payload) => state.settings = Some(payload),
            ConfigUpdate::Secrets(payload) => state.secrets = Some(payload),
        }

        let (Some(settings), Some(secrets)) = (&state.settings, &state.secrets) else {
            debug!("Waiting for both settings and secrets before starting the worker");
            return Ok(());
        };

        let mut snapshot = ConfigSnapshot::from_payloads(settings, secrets)?;
        snapshot
            .notifier
            .add_service(CONSOLE_SERVICE, Arc::new(ConsoleService::stdout()));

        state.generation += 1;
        let generation = state.generation;
        info!(
            "Configuration generation {} is valid: {} triggers, {} templates, {} services",
            generation,
            snapshot.triggers.len(),
            snapshot.templates.len(),
            snapshot.notifier.len()
        );

        state.lifecycle.apply(generation, snapshot).await
    }

    /// Feed every event from one watcher into [`ConfigMerger::on_update`].
    ///
    /// Returns when the watcher's channel closes, or with the first fatal error.
    pub async fn consume(self: Arc<Self>, mut events: mpsc::Receiver<WatchEvent>) -> Result<()> {
        while let Some(event) = events.recv().await {
            debug!("{} {}", event.update.resource(), event.kind.as_str());
            self.on_update(event.update).await?;
        }
        Ok(())
    }

    /// Stop the running worker and wait for it to finish
    pub async fn shutdown(&self) {
        self.state.lock().await.lifecycle.shutdown().await;
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.lifecycle.generation()
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Owns the single running worker and hands off to a new one on each valid snapshot.

use crate::error::Result;
use crate::metrics;
use crate::settings::ConfigSnapshot;
use crate::worker::{Worker, WorkerFactory};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

struct RunningWorker {
    generation: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// At most one worker runs at a time. A replacement is only built after the
/// previous worker's run task has returned.
pub struct WorkerLifecycle<F: WorkerFactory> {
    factory: F,
    concurrency: usize,
    root: CancellationToken,
    current: Option<RunningWorker>,
}

impl<F: WorkerFactory> WorkerLifecycle<F> {
    /// Worker tokens are children of `root`, so cancelling it stops the running worker too.
    pub fn new(factory: F, concurrency: usize, root: CancellationToken) -> Self {
        Self {
            factory,
            concurrency,
            root,
            current: None,
        }
    }

    /// Generation of the running worker, 0 when idle
    pub fn generation(&self) -> u64 {
        self.current.as_ref().map_or(0, |w| w.generation)
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Replace the running worker with one built from `snapshot`.
    ///
    /// Construction and initialization errors are returned to the caller, which treats them as
    /// fatal. The previous worker is already stopped at that point.
    #[instrument(skip(self, snapshot))]
    pub async fn apply(&mut self, generation: u64, snapshot: ConfigSnapshot) -> Result<()> {
        if generation <= self.generation() {
            debug!(
                "Ignoring snapshot generation {}, worker already at {}",
                generation,
                self.generation()
            );
            return Ok(());
        }

        if self.current.is_some() {
            info!("Settings had been updated. Restarting controller...");
            self.stop().await;
        }

        let mut worker = self.factory.new_worker(snapshot)?;
        let token = self.root.child_token();
        worker.initialize(&token).await?;

        let task = tokio::spawn(worker.run(token.clone(), self.concurrency));
        self.current = Some(RunningWorker {
            generation,
            token,
            task,
        });

        metrics::record_config_reload(generation);
        info!("Worker generation {} started", generation);
        Ok(())
    }

    /// Cancel the running worker, if any, and wait for it to finish
    pub async fn shutdown(&mut self) {
        self.stop().await;
    }

    async fn stop(&mut self) {
        let Some(running) = self.current.take() else {
            return;
        };

        running.token.cancel();
        if let Err(e) = running.task.await {
            error!("Worker generation {} ended abnormally: {}", running.generation, e);
        } else {
            debug!("Worker generation {} stopped", running.generation);
        }
    }
}

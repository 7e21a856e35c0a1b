// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The worker the controller runs for each valid configuration snapshot.

pub mod application;

use crate::error::Result;
use crate::settings::ConfigSnapshot;
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub use application::{ApplicationWorker, ApplicationWorkerFactory, RepoServerAddress};

/// One worker instance bound to a single configuration snapshot
pub trait Worker: Send + 'static {
    /// Prepare the worker. Runs to completion before [`Worker::run`] is started.
    fn initialize(&mut self, token: &CancellationToken) -> impl Future<Output = Result<()>> + Send;

    /// Process until `token` is cancelled. Resolves only once all of the worker's tasks have stopped.
    fn run(
        self,
        token: CancellationToken,
        concurrency: usize,
    ) -> impl Future<Output = ()> + Send + 'static;
}

/// Builds workers from snapshots
pub trait WorkerFactory: Send + Sync + 'static {
    type Worker: Worker;

    fn new_worker(&self, snapshot: ConfigSnapshot) -> Result<Self::Worker>;
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Startup readiness gate for the configuration watchers.

use crate::error::{ControllerError, Result};
use crate::watchers::resource::SyncedWatch;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

/// Wait until every watcher finished its initial list, failing after `timeout`.
///
/// Returns the identities of the resources that do not exist yet. Missing resources are
/// reported with a single warning and are not an error: the watchers keep running and the
/// worker starts as soon as both resources appear.
pub async fn await_initial_sync(
    watches: &[&dyn SyncedWatch],
    timeout: Duration,
) -> Result<Vec<String>> {
    let all_synced = async {
        for watch in watches {
            watch
                .sync_signal()
                .wait_for(|synced| *synced)
                .await
                .map_err(|_| ControllerError::WatchClosed(watch.identity().to_string()))?;
        }
        Ok::<(), ControllerError>(())
    };

    tokio::time::timeout(timeout, all_synced)
        .await
        .map_err(|_| ControllerError::SyncTimeout(timeout))??;

    let missing: Vec<String> = watches
        .iter()
        .filter(|w| w.is_empty())
        .map(|w| w.identity().to_string())
        .collect();

    if missing.is_empty() {
        info!("Caches synced, configuration resources found");
    } else {
        warn!(
            "Cannot find {}. Waiting when both config map and secret are created.",
            missing.join(" and ")
        );
    }

    Ok(missing)
}

/// [`await_initial_sync`], failing early when one of the long-running `tasks` ends first.
///
/// Fatal errors raised while the initial lists are delivered surface immediately instead of
/// after the sync completes or times out.
pub async fn await_initial_sync_or_failure(
    watches: &[&dyn SyncedWatch],
    timeout: Duration,
    tasks: &mut JoinSet<Result<()>>,
) -> Result<Vec<String>> {
    tokio::select! {
        missing = await_initial_sync(watches, timeout) => missing,
        Some(joined) = tasks.join_next() => Err(task_failure(joined)),
    }
}

/// Error for a long-running task that completed, which only happens on failure
pub fn task_failure(joined: std::result::Result<Result<()>, JoinError>) -> ControllerError {
    match joined {
        Ok(Err(e)) => e,
        Ok(Ok(())) => ControllerError::TaskStopped("task returned before shutdown".to_string()),
        Err(e) => ControllerError::TaskStopped(e.to_string()),
    }
}

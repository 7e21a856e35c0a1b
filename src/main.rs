// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use clap::Parser;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use notifications_controller::config::Config;
use notifications_controller::constants::resources::{CONFIG_MAP_NAME, SECRET_NAME};
use notifications_controller::kubernetes::{create_client, resolve_namespace};
use notifications_controller::metrics::{init_metrics, serve_metrics, WorkerMetrics};
use notifications_controller::sync::{ConfigMerger, WorkerLifecycle};
use notifications_controller::watchers::{await_initial_sync_or_failure, task_failure, ResourceWatcher};
use notifications_controller::worker::ApplicationWorkerFactory;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // RUST_LOG wins over --loglevel
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting notifications controller");

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    let client = create_client(&config).await?;
    let namespace = resolve_namespace(&config, &client);
    info!(
        "Configuration loaded: namespace={}, processors={}, app_label_selector={:?}",
        namespace,
        config.processors_count,
        config.app_label_selector()
    );

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let handle = init_metrics()?;
    tasks.spawn(serve_metrics(handle, config.metrics_port, shutdown.clone()));

    let factory = ApplicationWorkerFactory::new(
        client.clone(),
        &namespace,
        config.app_label_selector().map(str::to_string),
        &config.argocd_repo_server,
        WorkerMetrics,
    );
    let merger = Arc::new(ConfigMerger::new(WorkerLifecycle::new(
        factory,
        config.processors_count,
        shutdown.child_token(),
    )));

    let (settings_watch, settings_events) =
        ResourceWatcher::<ConfigMap>::watch(client.clone(), &namespace, CONFIG_MAP_NAME, shutdown.clone());
    let (secret_watch, secret_events) =
        ResourceWatcher::<Secret>::watch(client, &namespace, SECRET_NAME, shutdown.clone());

    tasks.spawn(merger.clone().consume(settings_events));
    tasks.spawn(merger.clone().consume(secret_events));

    info!("Waiting for settings and secret caches to sync...");
    await_initial_sync_or_failure(
        &[&settings_watch, &secret_watch],
        config.sync_timeout(),
        &mut tasks,
    )
    .await?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received shutdown signal");
        }
        Some(joined) = tasks.join_next() => return Err(task_failure(joined).into()),
    }

    shutdown.cancel();
    merger.shutdown().await;
    tasks.shutdown().await;
    info!("Notifications controller stopped");
    Ok(())
}

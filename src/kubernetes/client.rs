// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation from command line connection flags

use crate::config::Config;
use crate::error::{ControllerError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Create a client from an explicit kubeconfig/context, or infer one (in-cluster, then default kubeconfig)
#[instrument(skip(config), fields(kubeconfig = ?config.kubeconfig, context = ?config.context))]
pub async fn create_client(config: &Config) -> Result<Client> {
    let options = KubeConfigOptions {
        context: config.context.clone(),
        ..Default::default()
    };

    let client_config = match (&config.kubeconfig, &options.context) {
        (Some(path), _) => load_kubeconfig(path, &options).await?,
        (None, Some(_)) => KConfig::from_kubeconfig(&options).await.map_err(|e| {
            ControllerError::KubeconfigError(format!("Failed to load context: {}", e))
        })?,
        (None, None) => KConfig::infer().await.map_err(|e| {
            ControllerError::KubeconfigError(format!("Failed to infer config: {}", e))
        })?,
    };

    debug!("Using cluster URL {}", client_config.cluster_url);

    let client = Client::try_from(client_config)
        .map_err(|e| ControllerError::KubeconfigError(format!("Failed to create client: {}", e)))?;
    info!("Connected to Kubernetes cluster");
    Ok(client)
}

/// Resolve the namespace to watch: the explicit override, or the client's default namespace
pub fn resolve_namespace(config: &Config, client: &Client) -> String {
    config
        .namespace
        .as_deref()
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| client.default_namespace())
        .to_string()
}

async fn load_kubeconfig(path: &Path, options: &KubeConfigOptions) -> Result<KConfig> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
        ControllerError::KubeconfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;

    KConfig::from_custom_kubeconfig(kubeconfig, options)
        .await
        .map_err(|e| ControllerError::KubeconfigError(format!("Failed to create config: {}", e)))
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::defaults;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Controller configuration, read from flags with environment variable fallback
#[derive(Parser, Debug, Clone)]
#[command(name = "notifications-controller", version, about = "Runs the notifications controller and reloads it whenever its settings change")]
pub struct Config {
    /// Path to a kubeconfig file. In-cluster or default config is inferred if unset
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, env = "KUBE_CONTEXT")]
    pub context: Option<String>,

    /// Namespace which controller handles. Current namespace if empty
    #[arg(long, env = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Processors count
    #[arg(long, env = "PROCESSORS_COUNT", default_value_t = defaults::PROCESSORS_COUNT, value_parser = parse_processors_count)]
    pub processors_count: usize,

    /// App label selector
    #[arg(long, env = "APP_LABEL_SELECTOR")]
    pub app_label_selector: Option<String>,

    /// Set the logging level. One of: debug|info|warn|error
    #[arg(long = "loglevel", env = "LOG_LEVEL", default_value = defaults::LOG_LEVEL, value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// Metrics port
    #[arg(long, env = "METRICS_PORT", default_value_t = defaults::METRICS_PORT)]
    pub metrics_port: u16,

    /// Argo CD repo server address
    #[arg(long, env = "ARGOCD_REPO_SERVER", default_value = defaults::ARGOCD_REPO_SERVER)]
    pub argocd_repo_server: String,

    /// Seconds to wait for the settings and secret caches to sync
    #[arg(long, env = "SYNC_TIMEOUT_SECS", default_value_t = defaults::SYNC_TIMEOUT_SECS)]
    pub sync_timeout_secs: u64,
}

impl Config {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// Label selector for applications, with empty strings treated as unset
    pub fn app_label_selector(&self) -> Option<&str> {
        self.app_label_selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn parse_processors_count(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("processors count must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        let mut argv = vec!["notifications-controller"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.processors_count, 1);
        assert_eq!(config.metrics_port, 9001);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.sync_timeout(), Duration::from_secs(60));
        assert!(config.app_label_selector().is_none());
        assert_eq!(config.argocd_repo_server, "argocd-repo-server:8081");
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--namespace",
            "argocd",
            "--processors-count",
            "4",
            "--app-label-selector",
            "team=payments",
            "--loglevel",
            "debug",
            "--metrics-port",
            "9100",
            "--argocd-repo-server",
            "repo.argocd.svc:8081",
        ])
        .unwrap();

        assert_eq!(config.namespace.as_deref(), Some("argocd"));
        assert_eq!(config.processors_count, 4);
        assert_eq!(config.app_label_selector(), Some("team=payments"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.argocd_repo_server, "repo.argocd.svc:8081");
    }

    #[test]
    fn test_zero_processors_rejected() {
        assert!(parse(&["--processors-count", "0"]).is_err());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        assert!(parse(&["--loglevel", "verbose"]).is_err());
    }

    #[test]
    fn test_blank_label_selector_is_unset() {
        let config = parse(&["--app-label-selector", "  "]).unwrap();
        assert!(config.app_label_selector().is_none());
    }
}

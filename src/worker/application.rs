// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Worker watching Argo CD Applications and resolving their notification subscriptions.

use crate::constants::PROCESSOR_QUEUE_CAPACITY;
use crate::error::{ControllerError, Result};
use crate::metrics::WorkerMetrics;
use crate::settings::{ConfigSnapshot, ResolvedSubscription};
use crate::types::Application;
use crate::worker::{Worker, WorkerFactory};
use futures::StreamExt;
use kube::{api::ListParams, Api, Client, ResourceExt};
use kube_runtime::watcher::{watcher, Config as WatcherConfig};
use kube_runtime::WatchStreamExt;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// `host:port` of the Argo CD repo server the worker reads application manifests from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoServerAddress {
    pub host: String,
    pub port: u16,
}

impl RepoServerAddress {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || {
            ControllerError::WorkerConstruction(format!(
                "Invalid Argo CD repo server address '{}', expected <host>:<port>",
                value
            ))
        };
        let (host, port) = value.trim().rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for RepoServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Creates [`ApplicationWorker`]s for a namespace and optional label selector
pub struct ApplicationWorkerFactory {
    client: Client,
    namespace: String,
    selector: Option<String>,
    repo_server: String,
    metrics: WorkerMetrics,
}

impl ApplicationWorkerFactory {
    pub fn new(
        client: Client,
        namespace: impl Into<String>,
        selector: Option<String>,
        repo_server: impl Into<String>,
        metrics: WorkerMetrics,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            selector,
            repo_server: repo_server.into(),
            metrics,
        }
    }
}

impl WorkerFactory for ApplicationWorkerFactory {
    type Worker = ApplicationWorker;

    // The label selector is checked by the API server on the first list in `initialize`
    fn new_worker(&self, snapshot: ConfigSnapshot) -> Result<ApplicationWorker> {
        let repo_server = RepoServerAddress::parse(&self.repo_server)?;

        Ok(ApplicationWorker {
            api: Api::namespaced(self.client.clone(), &self.namespace),
            selector: self.selector.clone(),
            repo_server,
            snapshot: Arc::new(snapshot),
            metrics: self.metrics.clone(),
        })
    }
}

pub struct ApplicationWorker {
    api: Api<Application>,
    selector: Option<String>,
    repo_server: RepoServerAddress,
    snapshot: Arc<ConfigSnapshot>,
    metrics: WorkerMetrics,
}

impl ApplicationWorker {
    pub fn repo_server(&self) -> &RepoServerAddress {
        &self.repo_server
    }

    fn watcher_config(&self) -> WatcherConfig {
        match &self.selector {
            Some(selector) => WatcherConfig::default().labels(selector),
            None => WatcherConfig::default(),
        }
    }
}

impl Worker for ApplicationWorker {
    #[instrument(skip(self, token), fields(repo_server = %self.repo_server))]
    async fn initialize(&mut self, token: &CancellationToken) -> Result<()> {
        let mut params = ListParams::default();
        if let Some(selector) = &self.selector {
            params = params.labels(selector);
        }

        let apps = tokio::select! {
            _ = token.cancelled() => {
                return Err(ControllerError::WorkerInitialization(
                    "cancelled before applications were listed".to_string(),
                ));
            }
            listed = self.api.list(&params) => listed.map_err(|e| {
                ControllerError::WorkerInitialization(format!("Failed to list applications: {}", e))
            })?,
        };

        info!(
            "Worker initialized: {} applications, {} triggers, {} templates, {} services",
            apps.items.len(),
            self.snapshot.triggers.len(),
            self.snapshot.templates.len(),
            self.snapshot.notifier.len()
        );
        Ok(())
    }

    fn run(
        self,
        token: CancellationToken,
        concurrency: usize,
    ) -> impl Future<Output = ()> + Send + 'static {
        async move {
            let (queue_tx, queue_rx) = mpsc::channel::<Arc<Application>>(PROCESSOR_QUEUE_CAPACITY);
            let queue_rx = Arc::new(Mutex::new(queue_rx));

            let mut processors = JoinSet::new();
            for id in 0..concurrency.max(1) {
                processors.spawn(run_processor(
                    id,
                    queue_rx.clone(),
                    self.snapshot.clone(),
                    self.metrics.clone(),
                    token.clone(),
                ));
            }

            let mut apps = pin!(watcher(self.api.clone(), self.watcher_config())
                .default_backoff()
                .applied_objects());

            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    next = apps.next() => next,
                };
                match next {
                    Some(Ok(app)) => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            sent = queue_tx.send(Arc::new(app)) => if sent.is_err() { break },
                        }
                    }
                    Some(Err(e)) => warn!("Application watch error, will retry: {}", e),
                    None => break,
                }
            }

            drop(queue_tx);
            while processors.join_next().await.is_some() {}
            info!("Worker stopped");
        }
    }
}

async fn run_processor(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Arc<Application>>>>,
    snapshot: Arc<ConfigSnapshot>,
    metrics: WorkerMetrics,
    token: CancellationToken,
) {
    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                _ = token.cancelled() => None,
                app = queue.recv() => app,
            }
        };
        let Some(app) = next else { break };
        process_application(&snapshot, &metrics, &app);
    }
    debug!("Processor {} stopped", id);
}

/// Resolve and record the notification subscriptions of one application
pub fn process_application(
    snapshot: &ConfigSnapshot,
    metrics: &WorkerMetrics,
    app: &Application,
) -> Vec<ResolvedSubscription> {
    let subscriptions = snapshot.resolve_subscriptions(&app.subscriptions(), app.labels());

    metrics.application_processed();
    for subscription in &subscriptions {
        metrics.subscription_resolved(&subscription.trigger, &subscription.destination.service);
    }

    debug!(
        app = %app.name_any(),
        sync = ?app.sync_status(),
        health = ?app.health_status(),
        subscriptions = subscriptions.len(),
        "Processed application"
    );
    subscriptions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RawPayload;
    use crate::test_utils::{application_list_json, applications_path, status_json, MockService, MOCK_NAMESPACE};
    use crate::types::application::ApplicationSpec;
    use http::{Request, Response};
    use kube::api::ObjectMeta;
    use kube::client::Body;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn snapshot() -> ConfigSnapshot {
        let settings: RawPayload = [
            ("template.app-synced", "message: synced\n"),
            ("trigger.on-synced", "- when: app.status.sync.status == 'Synced'\n  send: [app-synced]\n"),
            ("service.slack", "token: plain\n"),
        ]
        .into_iter()
        .collect();
        ConfigSnapshot::from_payloads(&settings, &RawPayload::new()).unwrap()
    }

    fn factory(client: Client, selector: Option<&str>) -> ApplicationWorkerFactory {
        ApplicationWorkerFactory::new(
            client,
            MOCK_NAMESPACE,
            selector.map(str::to_string),
            "argocd-repo-server:8081",
            WorkerMetrics,
        )
    }

    async fn respond_once(status: u16, reason: &'static str, message: &'static str) -> Client {
        let (service, mut handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        tokio::spawn(async move {
            let (_request, send) = handle.next_request().await.expect("service not called");
            send.send_response(
                Response::builder()
                    .status(status)
                    .body(Body::from(status_json(status, reason, message).into_bytes()))
                    .unwrap(),
            );
        });
        Client::new(service, MOCK_NAMESPACE)
    }

    #[tokio::test]
    async fn test_initialize_lists_applications_with_selector() {
        let mock = MockService::new().on_get(
            &applications_path(MOCK_NAMESPACE),
            200,
            &application_list_json(&["guestbook", "billing"]),
        );
        let requests = mock.clone();
        let mut worker = factory(mock.into_client(), Some("team=payments"))
            .new_worker(snapshot())
            .unwrap();

        worker.initialize(&CancellationToken::new()).await.unwrap();

        let seen = requests.requests();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with(&applications_path(MOCK_NAMESPACE)));
        assert!(seen[0].contains("labelSelector=team%3Dpayments"));
    }

    #[tokio::test]
    async fn test_initialize_fails_when_api_forbidden() {
        let client = respond_once(403, "Forbidden", "applications is forbidden").await;
        let mut worker = factory(client, None).new_worker(snapshot()).unwrap();

        let err = worker
            .initialize(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::WorkerInitialization(_)));
    }

    #[tokio::test]
    async fn test_rejected_selector_fails_initialization() {
        let client = respond_once(400, "BadRequest", "unable to parse requirement").await;
        let mut worker = factory(client, Some("team in (payments"))
            .new_worker(snapshot())
            .unwrap();

        let err = worker
            .initialize(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::WorkerInitialization(_)));
    }

    #[tokio::test]
    async fn test_initialize_returns_when_cancelled() {
        // The mock never answers, so only cancellation can end the list call
        let (service, _handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let client = Client::new(service, MOCK_NAMESPACE);
        let mut worker = factory(client, None).new_worker(snapshot()).unwrap();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), worker.initialize(&token))
            .await
            .expect("initialize ignored cancellation");

        assert!(matches!(result, Err(ControllerError::WorkerInitialization(_))));
    }

    #[tokio::test]
    async fn test_repo_server_address_is_carried_to_worker() {
        let worker = factory(MockService::new().into_client(), None)
            .new_worker(snapshot())
            .unwrap();

        assert_eq!(
            worker.repo_server(),
            &RepoServerAddress {
                host: "argocd-repo-server".to_string(),
                port: 8081,
            }
        );
        assert_eq!(worker.repo_server().to_string(), "argocd-repo-server:8081");
    }

    #[tokio::test]
    async fn test_invalid_repo_server_fails_construction() {
        for address in ["argocd-repo-server", ":8081", "argocd-repo-server:http"] {
            let factory = ApplicationWorkerFactory::new(
                MockService::new().into_client(),
                MOCK_NAMESPACE,
                None,
                address,
                WorkerMetrics,
            );

            let result = factory.new_worker(snapshot());

            assert!(
                matches!(result, Err(ControllerError::WorkerConstruction(_))),
                "{} should be rejected",
                address
            );
        }
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let mock = MockService::new().on_get(
            &applications_path(MOCK_NAMESPACE),
            200,
            &application_list_json(&["guestbook"]),
        );
        let worker = factory(mock.into_client(), None)
            .new_worker(snapshot())
            .unwrap();
        let token = CancellationToken::new();

        let run = tokio::spawn(worker.run(token.clone(), 3));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[test]
    fn test_process_application_resolves_annotations() {
        let app = Application {
            metadata: ObjectMeta {
                name: Some("guestbook".to_string()),
                annotations: Some(BTreeMap::from([(
                    "notifications.argoproj.io/subscribe.on-synced.slack".to_string(),
                    "deployments".to_string(),
                )])),
                ..Default::default()
            },
            spec: ApplicationSpec {
                project: None,
                source: None,
                destination: None,
            },
            status: None,
        };

        let resolved = process_application(&snapshot(), &WorkerMetrics, &app);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].trigger, "on-synced");
        assert_eq!(resolved[0].destination.recipient, "deployments");
    }
}

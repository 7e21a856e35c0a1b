// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics and the `/metrics` HTTP endpoint.

use crate::error::{ControllerError, Result};
use bytes::Bytes;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod names {
    pub const WATCH_EVENTS_TOTAL: &str = "notifications_watch_events_total";
    pub const MERGE_ATTEMPTS_TOTAL: &str = "notifications_config_merge_attempts_total";
    pub const CONFIG_RELOADS_TOTAL: &str = "notifications_config_reloads_total";
    pub const WORKER_GENERATION: &str = "notifications_worker_generation";
    pub const APPLICATIONS_PROCESSED_TOTAL: &str = "notifications_applications_processed_total";
    pub const SUBSCRIPTIONS_RESOLVED_TOTAL: &str = "notifications_subscriptions_resolved_total";
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ControllerError::MetricsError(format!("Failed to install recorder: {}", e)))
}

pub fn record_watch_event(resource: &'static str, event: &'static str) {
    counter!(names::WATCH_EVENTS_TOTAL, "resource" => resource, "event" => event).increment(1);
}

pub fn record_merge_attempt(resource: &'static str) {
    counter!(names::MERGE_ATTEMPTS_TOTAL, "resource" => resource).increment(1);
}

pub fn record_config_reload(generation: u64) {
    counter!(names::CONFIG_RELOADS_TOTAL).increment(1);
    gauge!(names::WORKER_GENERATION).set(generation as f64);
}

/// Metrics sink handed to each worker instance
#[derive(Debug, Clone, Default)]
pub struct WorkerMetrics;

impl WorkerMetrics {
    pub fn application_processed(&self) {
        counter!(names::APPLICATIONS_PROCESSED_TOTAL).increment(1);
    }

    pub fn subscription_resolved(&self, trigger: &str, service: &str) {
        counter!(
            names::SUBSCRIPTIONS_RESOLVED_TOTAL,
            "trigger" => trigger.to_string(),
            "service" => service.to_string()
        )
        .increment(1);
    }
}

/// Serve `GET /metrics` on all interfaces until the token is cancelled
pub async fn serve_metrics(
    handle: PrometheusHandle,
    port: u16,
    token: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::MetricsError(format!("Failed to bind {}: {}", addr, e)))?;
    info!("serving metrics on port {}", port);

    loop {
        let (stream, peer) = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept metrics connection: {}", e);
                    continue;
                }
            },
        };

        let handle = handle.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let handle = handle.clone();
                async move { Ok::<_, Infallible>(route(req.method(), req.uri().path(), || handle.render())) }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Metrics connection from {} failed: {}", peer, e);
            }
        });
    }
}

fn route(method: &Method, path: &str, render: impl FnOnce() -> String) -> Response<Full<Bytes>> {
    let (status, content_type, body) = match (method, path) {
        (&Method::GET, "/metrics") => (
            StatusCode::OK,
            "text/plain; version=0.0.4",
            Bytes::from(render()),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            "text/plain",
            Bytes::from_static(b"not found\n"),
        ),
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_route_renders() {
        let response = route(&Method::GET, "/metrics", || {
            "notifications_config_reloads_total 3\n".to_string()
        });

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
        assert_eq!(
            body_string(response).await,
            "notifications_config_reloads_total 3\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let response = route(&Method::GET, "/healthz", || panic!("must not render"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_is_not_found() {
        let response = route(&Method::POST, "/metrics", || panic!("must not render"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

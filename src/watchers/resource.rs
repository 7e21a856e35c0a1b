// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watcher for a single named ConfigMap or Secret.

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::metrics;
use crate::settings::RawPayload;
use crate::watchers::event::{ConfigUpdate, EventKind, WatchEvent};
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use kube_runtime::reflector::{self, Store};
use kube_runtime::watcher::{self, watcher, Config as WatcherConfig, Event};
use kube_runtime::WatchStreamExt;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A configuration resource kind the controller watches
pub trait WatchedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + DeserializeOwned
    + Debug
    + Send
    + Sync
    + 'static
{
    /// Human readable kind used in operator messages
    const DESCRIPTION: &'static str;

    fn to_update(&self) -> ConfigUpdate;
}

impl WatchedResource for ConfigMap {
    const DESCRIPTION: &'static str = "config map";

    fn to_update(&self) -> ConfigUpdate {
        ConfigUpdate::Settings(RawPayload::from(self))
    }
}

impl WatchedResource for Secret {
    const DESCRIPTION: &'static str = "secret";

    fn to_update(&self) -> ConfigUpdate {
        ConfigUpdate::Secrets(RawPayload::from(self))
    }
}

/// Sync state and cache of a watcher, as seen by the startup readiness gate
pub trait SyncedWatch: Send + Sync {
    /// e.g. `config map argocd-notifications-cm`
    fn identity(&self) -> &str;
    fn has_synced(&self) -> bool;
    fn sync_signal(&self) -> watch::Receiver<bool>;
    fn is_empty(&self) -> bool;
}

/// Watches one named resource, keeps the last observed object cached,
/// and delivers create/update events on a channel.
pub struct ResourceWatcher<K: WatchedResource> {
    identity: String,
    store: Store<K>,
    synced: watch::Receiver<bool>,
}

impl<K: WatchedResource> ResourceWatcher<K> {
    /// Start watching `name` in `namespace`. Delivery begins immediately in a background task
    /// and stops when `token` is cancelled or the returned receiver is dropped.
    #[instrument(skip(client, token))]
    pub fn watch(
        client: Client,
        namespace: &str,
        name: &str,
        token: CancellationToken,
    ) -> (Self, mpsc::Receiver<WatchEvent>) {
        let api: Api<K> = Api::namespaced(client, namespace);
        let config = WatcherConfig::default().fields(&format!("metadata.name={}", name));
        // Transient errors are retried with backoff inside the stream
        Self::from_stream(name, watcher(api, config).default_backoff(), token)
    }

    /// Drive the watcher from an arbitrary stream of watch events
    pub fn from_stream<S>(
        name: &str,
        stream: S,
        token: CancellationToken,
    ) -> (Self, mpsc::Receiver<WatchEvent>)
    where
        S: Stream<Item = Result<Event<K>, watcher::Error>> + Send + 'static,
    {
        let identity = format!("{} {}", K::DESCRIPTION, name);
        let (store, writer) = reflector::store();
        let (synced_tx, synced) = watch::channel(false);
        let (events_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(deliver(
            identity.clone(),
            reflector::reflector(writer, stream),
            synced_tx,
            events_tx,
            token,
        ));

        (
            Self {
                identity,
                store,
                synced,
            },
            events,
        )
    }

    /// Objects currently in the local cache
    pub fn list(&self) -> Vec<Arc<K>> {
        self.store.state()
    }
}

impl<K: WatchedResource> SyncedWatch for ResourceWatcher<K> {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    fn sync_signal(&self) -> watch::Receiver<bool> {
        self.synced.clone()
    }

    fn is_empty(&self) -> bool {
        self.list().is_empty()
    }
}

async fn deliver<K, S>(
    identity: String,
    stream: S,
    synced: watch::Sender<bool>,
    events: mpsc::Sender<WatchEvent>,
    token: CancellationToken,
) where
    K: WatchedResource,
    S: Stream<Item = Result<Event<K>, watcher::Error>>,
{
    let mut stream = pin!(stream);
    let mut found = false;

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => break,
            next = stream.next() => next,
        };

        let object = match next {
            None => {
                debug!("Watch for {} ended", identity);
                break;
            }
            Some(Ok(Event::Init)) => {
                debug!("Listing {}", identity);
                continue;
            }
            Some(Ok(Event::InitDone)) => {
                synced.send_replace(true);
                debug!("Cache for {} synced", identity);
                continue;
            }
            Some(Ok(Event::Apply(object))) | Some(Ok(Event::InitApply(object))) => object,
            Some(Ok(Event::Delete(_))) => {
                warn!("{} was deleted, keeping the last known configuration", identity);
                found = false;
                continue;
            }
            Some(Err(e)) => {
                warn!("Watch error for {}, will retry: {}", identity, e);
                continue;
            }
        };

        let kind = if found {
            EventKind::Updated
        } else {
            info!("{} found", identity);
            EventKind::Added
        };
        found = true;

        let update = object.to_update();
        metrics::record_watch_event(update.resource(), kind.as_str());
        if events.send(WatchEvent { kind, update }).await.is_err() {
            debug!("Receiver for {} dropped, stopping watch", identity);
            break;
        }
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Raw key/value payloads as last observed on the watched resources.

use bytes::Bytes;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Opaque key → bytes mapping taken from a ConfigMap or Secret
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPayload(BTreeMap<String, Bytes>);

impl RawPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.0.get(key)
    }

    /// Value under `key` as UTF-8; `Some(None)` when present but not valid UTF-8
    pub fn get_str(&self, key: &str) -> Option<Option<&str>> {
        self.0.get(key).map(|v| std::str::from_utf8(v).ok())
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Bytes> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Bytes>> FromIterator<(K, V)> for RawPayload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&ConfigMap> for RawPayload {
    fn from(cm: &ConfigMap) -> Self {
        let mut payload = RawPayload::new();
        for (k, v) in cm.binary_data.iter().flatten() {
            payload.insert(k.clone(), v.0.clone());
        }
        for (k, v) in cm.data.iter().flatten() {
            payload.insert(k.clone(), v.clone());
        }
        payload
    }
}

impl From<&Secret> for RawPayload {
    fn from(secret: &Secret) -> Self {
        let mut payload = RawPayload::new();
        for (k, v) in secret.data.iter().flatten() {
            payload.insert(k.clone(), v.0.clone());
        }
        // stringData is write-only on the API server but may appear on objects we build ourselves
        for (k, v) in secret.string_data.iter().flatten() {
            payload.insert(k.clone(), v.clone());
        }
        payload
    }
}

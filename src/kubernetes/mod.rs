// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client construction and namespace resolution.

pub mod client;

pub use client::{create_client, resolve_namespace};

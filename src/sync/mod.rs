// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Merging of configuration updates and hand-off between worker instances.

pub mod lifecycle;
pub mod merger;

pub use lifecycle::WorkerLifecycle;
pub use merger::ConfigMerger;

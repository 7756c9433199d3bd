// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubernetes-facing building blocks: kinds, selectors, versions and inventory

pub mod field_selectors;
pub mod inventory;
pub mod kinds;
pub mod version;

pub use field_selectors::{Operation, Selector};
pub use inventory::{
    ClusterRef, ClusterSnapshot, ClusterType, ClusterVersionProvider, InventoryKey,
    ManagedCluster, ResourceInventoryProvider,
};
pub use kinds::{KindInfo, KindRegistry, KindScope, ResourceKind};
pub use version::{Comparison, KubeVersion, compare_versions};

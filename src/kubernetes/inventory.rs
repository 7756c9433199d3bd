// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster identity, inventory snapshots and the collaborators that fill them.

use anyhow::Result;
use async_trait::async_trait;
use kube::ResourceExt;
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::kinds::ResourceKind;

/// Which controller manages the cluster object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClusterType {
    Capi,
    Sveltos,
}

impl ClusterType {
    pub fn as_lowercase(self) -> &'static str {
        match self {
            ClusterType::Capi => "capi",
            ClusterType::Sveltos => "sveltos",
        }
    }
}

/// Reference to a managed cluster, ordered by (type, namespace, name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRef {
    pub cluster_type: ClusterType,
    pub namespace: String,
    pub name: String,
}

impl ClusterRef {
    pub fn new(
        cluster_type: ClusterType,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster_type,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key used in classifier cluster info (`namespace--name`)
    pub fn info_key(&self) -> String {
        format!("{}--{}", self.namespace, self.name)
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.cluster_type.as_lowercase(),
            self.namespace,
            self.name
        )
    }
}

/// A cluster taking part in a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedCluster {
    pub cluster: ClusterRef,
    /// Not-ready clusters are reported but not evaluated
    pub ready: bool,
}

impl ManagedCluster {
    pub fn ready(cluster: ClusterRef) -> Self {
        Self {
            cluster,
            ready: true,
        }
    }

    pub fn pending(cluster: ClusterRef) -> Self {
        Self {
            cluster,
            ready: false,
        }
    }
}

/// One inventory query: a kind plus an optional namespace scope
///
/// `None` namespace means no namespace restriction (cluster-wide listing).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InventoryKey {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
}

impl InventoryKey {
    pub fn new(kind: ResourceKind, namespace: Option<&str>) -> Self {
        Self {
            kind,
            namespace: namespace.filter(|ns| !ns.is_empty()).map(String::from),
        }
    }

    /// Whether `obj` falls inside this query
    pub fn contains(&self, obj: &DynamicObject) -> bool {
        if ResourceKind::of(obj).as_ref() != Some(&self.kind) {
            return false;
        }
        match &self.namespace {
            Some(ns) => obj.metadata.namespace.as_deref() == Some(ns.as_str()),
            None => true,
        }
    }
}

impl fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} in namespace {}", self.kind, ns),
            None => write!(f, "{} (all namespaces)", self.kind),
        }
    }
}

/// Point-in-time view of one cluster
///
/// Resources are keyed by (kind, namespace, name) so overlapping queries do
/// not duplicate entries and iteration order is stable.
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    pub cluster: ClusterRef,
    /// Reported version, or the collaborator error text
    pub version: Option<Result<String, String>>,
    resources: BTreeMap<(ResourceKind, String, String), DynamicObject>,
    /// Inventory queries the collaborator failed, with the error text
    failed: BTreeMap<InventoryKey, String>,
}

impl ClusterSnapshot {
    pub fn new(cluster: ClusterRef) -> Self {
        Self {
            cluster,
            version: None,
            resources: BTreeMap::new(),
            failed: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(Ok(version.into()));
        self
    }

    pub fn with_resources(mut self, resources: impl IntoIterator<Item = DynamicObject>) -> Self {
        self.add_resources(resources);
        self
    }

    /// Add resources; objects without type metadata cannot be matched and are dropped
    pub fn add_resources(&mut self, resources: impl IntoIterator<Item = DynamicObject>) {
        for obj in resources {
            if let Some(kind) = ResourceKind::of(&obj) {
                let namespace = obj.namespace().unwrap_or_default();
                let name = obj.name_any();
                self.resources.insert((kind, namespace, name), obj);
            }
        }
    }

    pub fn record_failure(&mut self, key: InventoryKey, message: impl Into<String>) {
        self.failed.insert(key, message.into());
    }

    /// Resources inside `key`, or the error that prevented listing them
    ///
    /// A failed cluster-wide query also fails every namespaced query of the same kind.
    pub fn select(&self, key: &InventoryKey) -> Result<Vec<&DynamicObject>, String> {
        if let Some(message) = self.failed.get(key).or_else(|| {
            self.failed
                .get(&InventoryKey::new(key.kind.clone(), None))
        }) {
            return Err(message.clone());
        }
        Ok(self
            .resources
            .values()
            .filter(|obj| key.contains(obj))
            .collect())
    }

    /// Number of distinct resources collected
    pub(crate) fn len(&self) -> usize {
        self.resources.len()
    }
}

/// Lists resources currently present in a cluster
#[async_trait]
pub trait ResourceInventoryProvider: Send + Sync {
    /// Resources of `kind` in `cluster`, restricted to `namespace` when given
    async fn list(
        &self,
        cluster: &ClusterRef,
        kind: &ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>>;
}

/// Reports the Kubernetes version a cluster is running
#[async_trait]
pub trait ClusterVersionProvider: Send + Sync {
    async fn version(&self, cluster: &ClusterRef) -> Result<String>;
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Registry of resource kinds known to the classifier.
//!
//! The registry is an explicit value handed to the evaluator, so tests and
//! embedders decide which kinds (and which selectable fields) exist. Built-in
//! kinds come from k8s-openapi type information; CRDs are added from
//! configuration.

use kube::core::{DynamicObject, TypeMeta};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::field_selectors::{UNIVERSAL_FIELDS, kind_field_paths};

/// Group/version/kind of a resource, ordered for deterministic keys
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKind {
    /// API group (empty string for core v1)
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl ResourceKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Split an `apiVersion` ("apps/v1" or "v1") into group and version
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// Kind of an inventory object, taken from its type metadata
    pub fn of(obj: &DynamicObject) -> Option<Self> {
        obj.types
            .as_ref()
            .map(|TypeMeta { api_version, kind }| Self::from_api_version(api_version, kind))
    }

    /// Get the full API group/version string
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

/// Whether instances of a kind live in a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindScope {
    Namespaced,
    Cluster,
}

/// Information about a registered kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindInfo {
    #[serde(flatten)]
    pub kind: ResourceKind,
    pub scope: KindScope,
    /// Field paths selectable in addition to [`UNIVERSAL_FIELDS`]
    #[serde(default)]
    pub field_paths: Vec<String>,
}

/// Registry of all kinds the evaluator knows about
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    by_kind: HashMap<ResourceKind, KindInfo>,
}

impl KindRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind to the registry, replacing an existing entry for the same kind
    pub fn add(&mut self, info: KindInfo) {
        self.by_kind.insert(info.kind.clone(), info);
    }

    pub fn get(&self, kind: &ResourceKind) -> Option<&KindInfo> {
        self.by_kind.get(kind)
    }

    /// Fields a field filter may reference for `kind`
    ///
    /// Unregistered kinds only get the universal fields.
    pub fn supported_fields(&self, kind: &ResourceKind) -> Vec<&str> {
        let mut fields: Vec<&str> = UNIVERSAL_FIELDS.to_vec();
        if let Some(info) = self.get(kind) {
            fields.extend(info.field_paths.iter().map(String::as_str));
        }
        fields
    }

    /// Check if a field path can be filtered on for `kind`
    pub fn is_supported(&self, kind: &ResourceKind, field_path: &str) -> bool {
        self.supported_fields(kind).contains(&field_path)
    }

    /// Build a registry of built-in kinds using k8s-openapi types (no discovery)
    pub fn with_core_kinds() -> Self {
        use k8s_openapi::api::{
            apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
            autoscaling::v2::HorizontalPodAutoscaler,
            batch::v1::{CronJob, Job},
            certificates::v1::CertificateSigningRequest,
            core::v1::{
                ConfigMap, Endpoints, Event, LimitRange, Namespace, Node, PersistentVolume,
                PersistentVolumeClaim, Pod, ReplicationController, ResourceQuota, Secret,
                Service, ServiceAccount,
            },
            networking::v1::{Ingress, NetworkPolicy},
            policy::v1::PodDisruptionBudget,
            rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
            storage::v1::StorageClass,
        };
        use kube::Resource;

        let mut registry = Self::new();

        // Scope is an associated type on the Resource trait, so it is spelled out here
        macro_rules! add_kind {
            ($type:ty, namespaced) => {
                add_kind!(@inner $type, KindScope::Namespaced)
            };
            ($type:ty, cluster) => {
                add_kind!(@inner $type, KindScope::Cluster)
            };
            (@inner $type:ty, $scope:expr) => {{
                registry.add(KindInfo {
                    kind: ResourceKind::new(
                        <$type>::group(&()),
                        <$type>::version(&()),
                        <$type>::kind(&()),
                    ),
                    scope: $scope,
                    field_paths: kind_field_paths(&<$type>::plural(&()))
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                });
            }};
        }

        // Core API (v1)
        add_kind!(Pod, namespaced);
        add_kind!(Service, namespaced);
        add_kind!(ConfigMap, namespaced);
        add_kind!(Secret, namespaced);
        add_kind!(Event, namespaced);
        add_kind!(ServiceAccount, namespaced);
        add_kind!(Endpoints, namespaced);
        add_kind!(PersistentVolumeClaim, namespaced);
        add_kind!(ReplicationController, namespaced);
        add_kind!(ResourceQuota, namespaced);
        add_kind!(LimitRange, namespaced);
        add_kind!(Node, cluster);
        add_kind!(Namespace, cluster);
        add_kind!(PersistentVolume, cluster);

        // apps/v1
        add_kind!(Deployment, namespaced);
        add_kind!(StatefulSet, namespaced);
        add_kind!(DaemonSet, namespaced);
        add_kind!(ReplicaSet, namespaced);

        // batch/v1
        add_kind!(Job, namespaced);
        add_kind!(CronJob, namespaced);

        add_kind!(Ingress, namespaced);
        add_kind!(NetworkPolicy, namespaced);
        add_kind!(HorizontalPodAutoscaler, namespaced);
        add_kind!(PodDisruptionBudget, namespaced);
        add_kind!(StorageClass, cluster);
        add_kind!(CertificateSigningRequest, cluster);

        add_kind!(Role, namespaced);
        add_kind!(RoleBinding, namespaced);
        add_kind!(ClusterRole, cluster);
        add_kind!(ClusterRoleBinding, cluster);

        registry
    }
}

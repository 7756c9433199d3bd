// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Label and field selectors evaluated against inventory resources
//!
//! Field filters follow Kubernetes field selector semantics, so only the fields
//! the API server can select on are accepted. Kubernetes does not expose that
//! list programmatically; the per-kind tables below are kept by hand.
//!
//! ## Selector Basics
//!
//! - Only `Equal` (`=`) and `Different` (`!=`) are supported
//! - All kinds support `metadata.name` and `metadata.namespace`
//! - Additional fields vary by kind (e.g., `status.phase` for pods)
//! - Field paths use dot notation: `status.phase`
//!
//! ## Table Maintenance
//!
//! Source: https://kubernetes.io/docs/concepts/overview/working-with-objects/field-selectors/#supported-fields
//!
//! When updating for new Kubernetes versions, check the `GetAttrs` functions in
//! the `strategy.go` of each resource and extend [`kind_field_paths`].

use kube::ResourceExt;
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields every kind can be filtered on
pub const UNIVERSAL_FIELDS: &[&str] = &["metadata.name", "metadata.namespace"];

/// Comparison applied by a selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Equals operator (=)
    Equal,
    /// Not equals operator (!=). An absent value counts as different.
    Different,
}

impl std::str::FromStr for Operation {
    type Err = crate::error::SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Equal" => Ok(Operation::Equal),
            "Different" => Ok(Operation::Different),
            other => Err(crate::error::SpecError::UnknownOperation(other.to_string())),
        }
    }
}

/// A single `key op value` predicate, used for both label and field filters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Selector {
    /// Label key, or field path in Kubernetes notation (e.g., "status.phase")
    pub key: String,
    pub operation: Operation,
    pub value: String,
}

impl Selector {
    pub fn new(key: impl Into<String>, operation: Operation, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operation,
            value: value.into(),
        }
    }

    /// Render in Kubernetes selector string format
    ///
    /// Examples:
    /// - `Selector { key: "status.phase", operation: Equal, value: "Running" }`
    ///   → `"status.phase=Running"`
    /// - `Selector { key: "type", operation: Different, value: "Opaque" }`
    ///   → `"type!=Opaque"`
    pub fn to_k8s_string(&self) -> String {
        match self.operation {
            Operation::Equal => format!("{}={}", self.key, self.value),
            Operation::Different => format!("{}!={}", self.key, self.value),
        }
    }

    /// Check the selector against the resource's value for `key`
    pub fn matches(&self, actual: Option<&str>) -> bool {
        match self.operation {
            Operation::Equal => actual == Some(self.value.as_str()),
            Operation::Different => actual != Some(self.value.as_str()),
        }
    }

    pub fn matches_labels(&self, obj: &DynamicObject) -> bool {
        self.matches(obj.labels().get(&self.key).map(String::as_str))
    }

    pub fn matches_field(&self, obj: &DynamicObject) -> bool {
        self.matches(field_value(obj, &self.key).as_deref())
    }
}

/// Render a list of selectors as a comma-separated Kubernetes selector string
pub fn to_selector_string(selectors: &[Selector]) -> Option<String> {
    if selectors.is_empty() {
        return None;
    }
    Some(
        selectors
            .iter()
            .map(Selector::to_k8s_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Extract the value a field selector would see for `path`
///
/// `metadata.name`/`metadata.namespace` come from the object metadata; every
/// other path walks the object body. Scalars are rendered the way the API
/// server does for selectors (`true`, `3`); objects and arrays yield `None`.
pub fn field_value(obj: &DynamicObject, path: &str) -> Option<String> {
    match path {
        "metadata.name" => obj.metadata.name.clone(),
        "metadata.namespace" => obj.metadata.namespace.clone(),
        _ => {
            let mut current = &obj.data;
            for segment in path.split('.') {
                current = current.get(segment)?;
            }
            match current {
                Value::String(s) => Some(s.clone()),
                Value::Bool(b) => Some(b.to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }
    }
}

/// Kind-specific selectable fields for built-in kinds, keyed by plural name
///
/// Returns an empty slice for kinds with only the universal fields.
pub fn kind_field_paths(plural: &str) -> &'static [&'static str] {
    match plural {
        // https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/pod-v1/
        "pods" => &[
            "spec.nodeName",
            "spec.restartPolicy",
            "spec.schedulerName",
            "spec.serviceAccountName",
            "spec.hostNetwork",
            "status.phase",
            "status.podIP",
            "status.nominatedNodeName",
        ],
        // https://kubernetes.io/docs/reference/kubernetes-api/cluster-resources/event-v1/
        "events" => &[
            "involvedObject.kind",
            "involvedObject.namespace",
            "involvedObject.name",
            "involvedObject.uid",
            "involvedObject.apiVersion",
            "involvedObject.resourceVersion",
            "involvedObject.fieldPath",
            "reason",
            "reportingComponent",
            "source",
            "type",
        ],
        "secrets" => &["type"],
        "namespaces" => &["status.phase"],
        "replicasets" | "replicationcontrollers" => &["status.replicas"],
        "jobs" => &["status.successful"],
        "nodes" => &["spec.unschedulable"],
        "certificatesigningrequests" => &["spec.signerName"],
        _ => &[],
    }
}

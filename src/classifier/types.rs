// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Classifier schema types
//!
//! Two layers: the `*Spec` structs mirror the serialized Classifier resource
//! and accept anything that deserializes; [`Classifier`] and friends are only
//! built through validation, so evaluation code never re-checks operators,
//! bounds or versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SpecError;
use crate::kubernetes::field_selectors::{Operation, Selector};
use crate::kubernetes::inventory::InventoryKey;
use crate::kubernetes::kinds::ResourceKind;
use crate::kubernetes::version::{Comparison, KubeVersion};

/// Label added by the classifier to its reports
pub const CLASSIFIER_NAME_LABEL: &str = "projectsveltos.io/classifier-name";
pub const REPORT_CLUSTER_NAME_LABEL: &str = "classifier.projectsveltos.io/cluster-name";
pub const REPORT_CLUSTER_TYPE_LABEL: &str = "classifier.projectsveltos.io/cluster-type";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierLabel {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFilterSpec {
    pub key: String,
    pub operation: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilterSpec {
    pub field: String,
    pub operation: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedResourceConstraintSpec {
    /// Empty for cluster-wide queries
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(default)]
    pub label_filters: Vec<LabelFilterSpec>,
    #[serde(default)]
    pub field_filters: Vec<FieldFilterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<i64>,
    /// Predicate script; must return an object with a boolean `matching` field
    #[serde(default)]
    pub script: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesVersionConstraintSpec {
    pub version: String,
    pub comparison: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierSpec {
    #[serde(default)]
    pub deployed_resource_constraints: Vec<DeployedResourceConstraintSpec>,
    #[serde(default)]
    pub kubernetes_version_constraints: Vec<KubernetesVersionConstraintSpec>,
    #[serde(default)]
    pub classifier_labels: Vec<ClassifierLabel>,
}

/// A Classifier object as handed over by the surrounding controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierResource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Set once deletion of the classifier has been requested
    #[serde(default)]
    pub deleting: bool,
    pub spec: ClassifierSpec,
}

/// Validated resource constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedResourceConstraint {
    kind: ResourceKind,
    namespace: Option<String>,
    label_filters: Vec<Selector>,
    field_filters: Vec<Selector>,
    min_count: u64,
    max_count: Option<u64>,
    script: Option<String>,
}

impl DeployedResourceConstraint {
    /// Validate the constraint at position `index` of a classifier spec
    pub fn from_spec(
        index: usize,
        spec: &DeployedResourceConstraintSpec,
    ) -> Result<Self, SpecError> {
        if spec.kind.trim().is_empty() {
            return Err(SpecError::EmptyKind { index });
        }
        let count = |field: &'static str, value: Option<i64>| -> Result<Option<u64>, SpecError> {
            match value {
                Some(v) if v < 0 => Err(SpecError::NegativeCount {
                    index,
                    field,
                    value: v,
                }),
                Some(v) => Ok(Some(v as u64)),
                None => Ok(None),
            }
        };
        let min_count = count("minCount", spec.min_count)?.unwrap_or(1);
        let max_count = count("maxCount", spec.max_count)?;
        if let Some(max) = max_count
            && min_count > max
        {
            return Err(SpecError::InvertedBounds {
                index,
                min: min_count,
                max,
            });
        }

        let label_filters = spec
            .label_filters
            .iter()
            .map(|f| selector(&f.key, &f.operation, &f.value))
            .collect::<Result<Vec<_>, _>>()?;
        let field_filters = spec
            .field_filters
            .iter()
            .map(|f| selector(&f.field, &f.operation, &f.value))
            .collect::<Result<Vec<_>, _>>()?;

        let namespace = Some(spec.namespace.trim())
            .filter(|ns| !ns.is_empty())
            .map(String::from);
        let script = Some(spec.script.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from);

        Ok(Self {
            kind: ResourceKind::new(spec.group.trim(), spec.version.trim(), spec.kind.trim()),
            namespace,
            label_filters,
            field_filters,
            min_count,
            max_count,
            script,
        })
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn inventory_key(&self) -> InventoryKey {
        InventoryKey::new(self.kind.clone(), self.namespace())
    }

    pub fn label_filters(&self) -> &[Selector] {
        &self.label_filters
    }

    pub fn field_filters(&self) -> &[Selector] {
        &self.field_filters
    }

    /// Lower bound on matching resources; 1 when unset
    pub fn min_count(&self) -> u64 {
        self.min_count
    }

    /// Upper bound on matching resources; unbounded when unset
    pub fn max_count(&self) -> Option<u64> {
        self.max_count
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn count_in_bounds(&self, count: u64) -> bool {
        count >= self.min_count && self.max_count.is_none_or(|max| count <= max)
    }
}

fn selector(key: &str, operation: &str, value: &str) -> Result<Selector, SpecError> {
    if key.trim().is_empty() {
        return Err(SpecError::EmptyFilterKey);
    }
    let operation: Operation = operation.parse()?;
    Ok(Selector::new(key.trim(), operation, value))
}

/// Validated version constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KubernetesVersionConstraint {
    pub version: KubeVersion,
    pub comparison: Comparison,
}

impl KubernetesVersionConstraint {
    pub fn from_spec(
        index: usize,
        spec: &KubernetesVersionConstraintSpec,
    ) -> Result<Self, SpecError> {
        let comparison: Comparison = spec.comparison.parse()?;
        let version = spec
            .version
            .parse()
            .map_err(|_| SpecError::InvalidTargetVersion {
                index,
                version: spec.version.clone(),
            })?;
        Ok(Self {
            version,
            comparison,
        })
    }
}

/// A validated classifier, immutable for the duration of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    name: String,
    creation_timestamp: Option<DateTime<Utc>>,
    deleting: bool,
    rules: ClassifierRules,
}

/// The part of a classifier that defines what it applies; this is what gets hashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierRules {
    pub deployed_resource_constraints: Vec<DeployedResourceConstraint>,
    pub kubernetes_version_constraints: Vec<KubernetesVersionConstraint>,
    /// Requested labels, key -> value
    pub labels: BTreeMap<String, String>,
}

impl Classifier {
    pub fn from_resource(resource: &ClassifierResource) -> Result<Self, SpecError> {
        let name = resource.name.trim();
        if name.is_empty() {
            return Err(SpecError::EmptyName);
        }
        let spec = &resource.spec;

        let deployed_resource_constraints = spec
            .deployed_resource_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| DeployedResourceConstraint::from_spec(i, c))
            .collect::<Result<Vec<_>, _>>()?;
        let kubernetes_version_constraints = spec
            .kubernetes_version_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| KubernetesVersionConstraint::from_spec(i, c))
            .collect::<Result<Vec<_>, _>>()?;

        let mut labels = BTreeMap::new();
        for label in &spec.classifier_labels {
            let key = label.key.trim();
            if key.is_empty() {
                return Err(SpecError::EmptyLabelKey);
            }
            if labels.insert(key.to_string(), label.value.clone()).is_some() {
                return Err(SpecError::DuplicateLabelKey(key.to_string()));
            }
        }

        Ok(Self {
            name: name.to_string(),
            creation_timestamp: resource.creation_timestamp,
            deleting: resource.deleting,
            rules: ClassifierRules {
                deployed_resource_constraints,
                kubernetes_version_constraints,
                labels,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.creation_timestamp
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    pub fn constraints(&self) -> &[DeployedResourceConstraint] {
        &self.rules.deployed_resource_constraints
    }

    pub fn version_constraints(&self) -> &[KubernetesVersionConstraint] {
        &self.rules.kubernetes_version_constraints
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.rules.labels
    }
}

impl TryFrom<&ClassifierResource> for Classifier {
    type Error = SpecError;

    fn try_from(resource: &ClassifierResource) -> Result<Self, Self::Error> {
        Self::from_resource(resource)
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Status and report records produced at the end of a pass
//!
//! Pure transformation of classification and arbitration results into the
//! records external persistence writes back: per-classifier match records and
//! cluster info, and one report per (classifier, cluster).

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::aggregate::Classification;
use super::arbitration::{Arbitration, UnmanagedLabel};
use super::types::{
    CLASSIFIER_NAME_LABEL, Classifier, REPORT_CLUSTER_NAME_LABEL, REPORT_CLUSTER_TYPE_LABEL,
};
use crate::error::SpecError;
use crate::kubernetes::inventory::ClusterRef;

/// Provisioning state of a classifier on a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeatureStatus {
    Provisioning,
    Provisioned,
    Failed,
    Removing,
    Removed,
}

/// A classifier as it enters the reporter
#[derive(Debug, Clone)]
pub enum ClassifierEntry {
    Valid { classifier: Classifier, hash: Vec<u8> },
    Invalid { name: String, hash: Vec<u8>, error: SpecError },
}

impl ClassifierEntry {
    /// A validated classifier; one whose rules cannot be hashed is reported invalid
    pub fn valid(classifier: Classifier) -> Self {
        match content_hash(classifier.rules()) {
            Ok(hash) => Self::Valid { classifier, hash },
            Err(error) => Self::Invalid {
                name: classifier.name().to_string(),
                hash: Vec::new(),
                error,
            },
        }
    }

    /// A classifier that failed validation, hashed over its raw `spec`
    pub fn invalid<T: Serialize>(name: impl Into<String>, spec: &T, error: SpecError) -> Self {
        Self::Invalid {
            name: name.into(),
            hash: content_hash(spec).unwrap_or_default(),
            error,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Valid { classifier, .. } => classifier.name(),
            Self::Invalid { name, .. } => name,
        }
    }

    pub fn hash(&self) -> &[u8] {
        match self {
            Self::Valid { hash, .. } | Self::Invalid { hash, .. } => hash,
        }
    }

    /// Classifiers that take part in classification and arbitration
    pub fn active(&self) -> Option<&Classifier> {
        match self {
            Self::Valid { classifier, .. } if !classifier.is_deleting() => Some(classifier),
            _ => None,
        }
    }
}

/// What happened on one cluster during the pass
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    pub cluster: ClusterRef,
    /// Not-ready clusters are neither classified nor arbitrated
    pub ready: bool,
    /// Verdicts keyed by classifier name
    pub classifications: BTreeMap<String, Classification>,
    pub arbitration: Option<Arbitration>,
}

/// Outcome of one classifier on one evaluated cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMatchRecord {
    pub cluster_ref: ClusterRef,
    pub is_match: bool,
    /// Label keys this classifier manages on the cluster
    pub managed_labels: Vec<String>,
    /// Label keys it wants but another classifier manages
    pub unmanaged_labels: Vec<UnmanagedLabel>,
    /// Constraint errors encountered on this cluster
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub cluster: ClusterRef,
    /// `{namespace}--{name}`
    pub key: String,
    pub hash: Vec<u8>,
    pub status: FeatureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

/// Observed state of a classifier across all clusters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierStatus {
    pub classifier: String,
    /// One record per evaluated cluster, in cluster order
    pub match_records: Vec<ClusterMatchRecord>,
    pub cluster_info: Vec<ClusterInfo>,
}

impl ClassifierStatus {
    /// Records of clusters the classifier currently matches
    pub fn matching(&self) -> impl Iterator<Item = &ClusterMatchRecord> {
        self.match_records.iter().filter(|r| r.is_match)
    }

    pub fn record(&self, cluster: &ClusterRef) -> Option<&ClusterMatchRecord> {
        self.match_records.iter().find(|r| &r.cluster_ref == cluster)
    }
}

/// Audit record for one (classifier, cluster) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierReport {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub classifier_name: String,
    pub cluster: ClusterRef,
    #[serde(rename = "match")]
    pub is_match: bool,
    pub hash: Vec<u8>,
    pub status: FeatureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

/// `{cluster type}--{classifier}--{cluster}`
pub fn report_name(classifier: &str, cluster: &ClusterRef) -> String {
    format!(
        "{}--{}--{}",
        cluster.cluster_type.as_lowercase(),
        classifier,
        cluster.name
    )
}

pub fn report_labels(classifier: &str, cluster: &ClusterRef) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLASSIFIER_NAME_LABEL.to_string(), classifier.to_string()),
        (REPORT_CLUSTER_NAME_LABEL.to_string(), cluster.name.clone()),
        (
            REPORT_CLUSTER_TYPE_LABEL.to_string(),
            cluster.cluster_type.as_lowercase().to_string(),
        ),
    ])
}

/// SHA-256 over the canonical JSON encoding of `value`
pub fn content_hash<T: Serialize>(value: &T) -> Result<Vec<u8>, SpecError> {
    let bytes = serde_json::to_vec(value).map_err(|e| SpecError::Unhashable(e.to_string()))?;
    Ok(Sha256::digest(&bytes).to_vec())
}

/// Status and reports of every classifier after a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub statuses: Vec<ClassifierStatus>,
    pub reports: Vec<ClassifierReport>,
}

/// One cell of the (classifier, cluster) matrix
struct Cell {
    record: Option<ClusterMatchRecord>,
    status: FeatureStatus,
    is_match: bool,
    failure_message: Option<String>,
}

fn cell(entry: &ClassifierEntry, outcome: &ClusterOutcome) -> Cell {
    let classifier = match entry {
        ClassifierEntry::Invalid { error, .. } => {
            return Cell {
                record: None,
                status: FeatureStatus::Failed,
                is_match: false,
                failure_message: Some(error.to_string()),
            };
        }
        ClassifierEntry::Valid { classifier, .. } => classifier,
    };

    if classifier.is_deleting() {
        return Cell {
            record: None,
            status: if outcome.ready {
                FeatureStatus::Removed
            } else {
                FeatureStatus::Removing
            },
            is_match: false,
            failure_message: None,
        };
    }

    let classification = match outcome.classifications.get(classifier.name()) {
        Some(c) if outcome.ready => c,
        _ => {
            return Cell {
                record: None,
                status: FeatureStatus::Provisioning,
                is_match: false,
                failure_message: None,
            };
        }
    };

    let claims = outcome
        .arbitration
        .as_ref()
        .filter(|_| classification.is_match)
        .and_then(|a| a.claims.get(classifier.name()))
        .cloned()
        .unwrap_or_default();

    let failure_message =
        (!classification.failures.is_empty()).then(|| classification.failures.join("; "));

    Cell {
        record: Some(ClusterMatchRecord {
            cluster_ref: outcome.cluster.clone(),
            is_match: classification.is_match,
            managed_labels: claims.managed,
            unmanaged_labels: claims.unmanaged,
            failures: classification.failures.clone(),
        }),
        status: if failure_message.is_some() {
            FeatureStatus::Failed
        } else {
            FeatureStatus::Provisioned
        },
        is_match: classification.is_match,
        failure_message,
    }
}

/// Materialize status and reports for every classifier over every cluster
///
/// `outcomes` must already be in cluster order; entries keep their input order.
pub fn build_status(entries: &[ClassifierEntry], outcomes: &[ClusterOutcome]) -> StatusReport {
    let mut statuses = Vec::with_capacity(entries.len());
    let mut reports = Vec::with_capacity(entries.len() * outcomes.len());

    for entry in entries {
        let mut match_records = Vec::new();
        let mut cluster_info = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            let Cell {
                record,
                status,
                is_match,
                failure_message,
            } = cell(entry, outcome);

            match_records.extend(record);
            cluster_info.push(ClusterInfo {
                cluster: outcome.cluster.clone(),
                key: outcome.cluster.info_key(),
                hash: entry.hash().to_vec(),
                status,
                failure_message: failure_message.clone(),
            });
            reports.push(ClassifierReport {
                name: report_name(entry.name(), &outcome.cluster),
                labels: report_labels(entry.name(), &outcome.cluster),
                classifier_name: entry.name().to_string(),
                cluster: outcome.cluster.clone(),
                is_match,
                hash: entry.hash().to_vec(),
                status,
                failure_message,
            });
        }

        statuses.push(ClassifierStatus {
            classifier: entry.name().to_string(),
            match_records,
            cluster_info,
        });
    }

    StatusReport { statuses, reports }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::arbitration::{ByName, arbitrate};
    use crate::classifier::types::{ClassifierLabel, ClassifierResource, ClassifierSpec};
    use crate::kubernetes::inventory::ClusterType;

    fn classifier(name: &str, env: &str, deleting: bool) -> Classifier {
        Classifier::from_resource(&ClassifierResource {
            name: name.to_string(),
            deleting,
            spec: ClassifierSpec {
                classifier_labels: vec![ClassifierLabel {
                    key: "env".to_string(),
                    value: env.to_string(),
                }],
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn cluster(name: &str) -> ClusterRef {
        ClusterRef::new(ClusterType::Capi, "default", name)
    }

    fn classification(
        classifier: &str,
        cluster: &ClusterRef,
        is_match: bool,
        failures: &[&str],
    ) -> Classification {
        Classification {
            classifier: classifier.to_string(),
            cluster: cluster.clone(),
            is_match,
            failures: failures.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn evaluated(
        cluster: ClusterRef,
        matching: &[&Classifier],
        verdicts: Vec<Classification>,
    ) -> ClusterOutcome {
        ClusterOutcome {
            arbitration: Some(arbitrate(&cluster, matching, &ByName)),
            cluster,
            ready: true,
            classifications: verdicts
                .into_iter()
                .map(|c| (c.classifier.clone(), c))
                .collect(),
        }
    }

    #[test]
    fn test_report_identity() {
        let c = ClusterRef::new(ClusterType::Sveltos, "mgmt", "edge-1");
        assert_eq!(report_name("dns", &c), "sveltos--dns--edge-1");
        let labels = report_labels("dns", &c);
        assert_eq!(labels[CLASSIFIER_NAME_LABEL], "dns");
        assert_eq!(labels[REPORT_CLUSTER_NAME_LABEL], "edge-1");
        assert_eq!(labels[REPORT_CLUSTER_TYPE_LABEL], "sveltos");
    }

    #[test]
    fn test_conflicting_classifiers_records() {
        let c1 = classifier("C1", "prod", false);
        let c2 = classifier("C2", "staging", false);
        let x = cluster("x");
        let outcome = evaluated(
            x.clone(),
            &[&c1, &c2],
            vec![classification("C1", &x, true, &[]), classification("C2", &x, true, &[])],
        );
        let report = build_status(
            &[ClassifierEntry::valid(c1), ClassifierEntry::valid(c2)],
            &[outcome],
        );

        let r1 = report.statuses[0].record(&x).unwrap();
        assert_eq!(r1.managed_labels, vec!["env"]);
        let r2 = report.statuses[1].record(&x).unwrap();
        assert!(r2.managed_labels.is_empty());
        assert_eq!(r2.unmanaged_labels[0].failure_message, "owned by C1");
        assert!(report.reports.iter().all(|r| r.status == FeatureStatus::Provisioned));
    }

    #[test]
    fn test_non_match_record_has_no_labels() {
        let d = classifier("D", "prod", false);
        let y = cluster("y");
        let outcome = evaluated(y.clone(), &[], vec![classification("D", &y, false, &[])]);
        let report = build_status(&[ClassifierEntry::valid(d)], &[outcome]);

        let record = report.statuses[0].record(&y).unwrap();
        assert!(!record.is_match);
        assert!(record.managed_labels.is_empty());
        assert!(record.unmanaged_labels.is_empty());
        assert_eq!(report.statuses[0].matching().count(), 0);
        assert!(!report.reports[0].is_match);
    }

    #[test]
    fn test_failures_mark_failed() {
        let d = classifier("D", "prod", false);
        let y = cluster("y");
        let outcome = evaluated(
            y.clone(),
            &[],
            vec![classification("D", &y, false, &["script failed", "bad field"])],
        );
        let report = build_status(&[ClassifierEntry::valid(d)], &[outcome]);
        assert_eq!(report.reports[0].status, FeatureStatus::Failed);
        assert_eq!(
            report.reports[0].failure_message.as_deref(),
            Some("script failed; bad field")
        );
        assert_eq!(report.statuses[0].cluster_info[0].status, FeatureStatus::Failed);
    }

    #[test]
    fn test_not_ready_cluster_is_provisioning() {
        let c = classifier("C", "prod", false);
        let outcome = ClusterOutcome {
            cluster: cluster("pending"),
            ready: false,
            classifications: BTreeMap::new(),
            arbitration: None,
        };
        let report = build_status(&[ClassifierEntry::valid(c)], &[outcome]);
        assert_eq!(report.reports[0].status, FeatureStatus::Provisioning);
        assert!(report.statuses[0].match_records.is_empty());
    }

    #[test]
    fn test_deleting_classifier_statuses() {
        let c = classifier("C", "prod", true);
        let ready = ClusterOutcome {
            cluster: cluster("a"),
            ready: true,
            classifications: BTreeMap::new(),
            arbitration: None,
        };
        let pending = ClusterOutcome {
            cluster: cluster("b"),
            ready: false,
            classifications: BTreeMap::new(),
            arbitration: None,
        };
        let entry = ClassifierEntry::valid(c);
        assert!(entry.active().is_none());
        let report = build_status(&[entry], &[ready, pending]);
        assert_eq!(report.reports[0].status, FeatureStatus::Removed);
        assert_eq!(report.reports[1].status, FeatureStatus::Removing);
    }

    #[test]
    fn test_invalid_classifier_fails_everywhere() {
        let entry = ClassifierEntry::invalid("broken", &"spec", SpecError::EmptyLabelKey);
        assert_eq!(entry.hash().len(), 32);
        let outcome = ClusterOutcome {
            cluster: cluster("a"),
            ready: true,
            classifications: BTreeMap::new(),
            arbitration: None,
        };
        let report = build_status(&[entry], &[outcome]);
        assert_eq!(report.reports[0].status, FeatureStatus::Failed);
        assert_eq!(
            report.reports[0].failure_message.as_deref(),
            Some("classifier label key must not be empty")
        );
    }

    #[test]
    fn test_content_hash_stable_and_sensitive() {
        let a = classifier("a", "prod", false);
        let same = classifier("b", "prod", false);
        let other = classifier("a", "dev", false);
        assert_eq!(content_hash(a.rules()), content_hash(same.rules()));
        assert_ne!(content_hash(a.rules()), content_hash(other.rules()));
        assert_eq!(content_hash(a.rules()).unwrap().len(), 32);
    }

    #[test]
    fn test_content_hash_reports_unserializable_value() {
        // JSON object keys must be strings
        let value: BTreeMap<(u8, u8), u8> = BTreeMap::from([((1, 2), 3)]);
        assert!(matches!(content_hash(&value), Err(SpecError::Unhashable(_))));

        let entry = ClassifierEntry::invalid("odd", &value, SpecError::EmptyName);
        assert!(entry.hash().is_empty());
        assert!(entry.active().is_none());
    }

    #[test]
    fn test_cluster_info_key() {
        let c = classifier("C", "prod", false);
        let outcome = ClusterOutcome {
            cluster: ClusterRef::new(ClusterType::Capi, "team-a", "edge"),
            ready: false,
            classifications: BTreeMap::new(),
            arbitration: None,
        };
        let report = build_status(&[ClassifierEntry::valid(c)], &[outcome]);
        let info = &report.statuses[0].cluster_info[0];
        assert_eq!(info.key, "team-a--edge");
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json["key"], serde_json::json!("team-a--edge"));
    }

    #[test]
    fn test_report_serializes_match_field() {
        let d = classifier("D", "prod", false);
        let y = cluster("y");
        let outcome = evaluated(y.clone(), &[], vec![classification("D", &y, false, &[])]);
        let report = build_status(&[ClassifierEntry::valid(d)], &[outcome]);
        let json = serde_json::to_value(&report.reports[0]).unwrap();
        assert_eq!(json["match"], serde_json::json!(false));
        assert_eq!(json["status"], serde_json::json!("Provisioned"));
        assert!(json.get("failureMessage").is_none());
    }
}

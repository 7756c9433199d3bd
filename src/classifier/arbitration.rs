// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Label ownership arbitration
//!
//! When several classifiers match the same cluster and ask for the same label
//! key, exactly one of them owns the key for the pass. Classifiers are ranked
//! by a [`ClassifierOrdering`]; the first in rank to request a key owns it and
//! every later requester records the key as unmanaged.
//!
//! Arbitration always runs over the complete set of matching classifiers for a
//! cluster and keeps no memory between passes: an owner that stops matching (or
//! stops asking) hands the key to the next classifier in rank.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use super::types::Classifier;
use crate::kubernetes::inventory::ClusterRef;

/// Total order used to rank classifiers competing for a label key
pub trait ClassifierOrdering: Send + Sync {
    fn compare(&self, a: &Classifier, b: &Classifier) -> Ordering;
}

impl<F> ClassifierOrdering for F
where
    F: Fn(&Classifier, &Classifier) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &Classifier, b: &Classifier) -> Ordering {
        self(a, b)
    }
}

/// Rank by name
#[derive(Debug, Clone, Copy, Default)]
pub struct ByName;

impl ClassifierOrdering for ByName {
    fn compare(&self, a: &Classifier, b: &Classifier) -> Ordering {
        a.name().cmp(b.name())
    }
}

/// Rank oldest first, then by name
///
/// Classifiers without a creation timestamp rank after all timestamped ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByCreationTimestamp;

impl ClassifierOrdering for ByCreationTimestamp {
    fn compare(&self, a: &Classifier, b: &Classifier) -> Ordering {
        let created = match (a.creation_timestamp(), b.creation_timestamp()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        created.then_with(|| a.name().cmp(b.name()))
    }
}

/// A label key a classifier asked for but does not own
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmanagedLabel {
    pub key: String,
    pub failure_message: String,
}

/// Outcome of arbitration for one classifier on one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelClaims {
    /// Keys this classifier owns, sorted
    pub managed: Vec<String>,
    /// Keys owned by another classifier, sorted by key
    pub unmanaged: Vec<UnmanagedLabel>,
}

/// Owner and value of a label on a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelOwner {
    pub value: String,
    pub owner: String,
}

/// Result of one arbitration pass on one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Arbitration {
    pub cluster: ClusterRef,
    /// Claims of every matching classifier, keyed by classifier name
    pub claims: BTreeMap<String, LabelClaims>,
    /// Final label set for the cluster, key -> owner
    pub labels: BTreeMap<String, LabelOwner>,
}

/// Rank `classifiers` deterministically
///
/// Classifiers are first sorted by name and then stably by `ordering`, so the
/// result does not depend on input order even when `ordering` reports ties.
pub fn rank<'a>(
    classifiers: &[&'a Classifier],
    ordering: &dyn ClassifierOrdering,
) -> Vec<&'a Classifier> {
    let mut ranked = classifiers.to_vec();
    ranked.sort_by(|a, b| a.name().cmp(b.name()));
    ranked.sort_by(|a, b| ordering.compare(a, b));
    ranked
}

/// Assign every requested label key on `cluster` to exactly one classifier
///
/// `matching` must hold every classifier that matches the cluster in this pass.
pub fn arbitrate(
    cluster: &ClusterRef,
    matching: &[&Classifier],
    ordering: &dyn ClassifierOrdering,
) -> Arbitration {
    let mut claims: BTreeMap<String, LabelClaims> = BTreeMap::new();
    let mut labels: BTreeMap<String, LabelOwner> = BTreeMap::new();

    for classifier in rank(matching, ordering) {
        let entry = claims.entry(classifier.name().to_string()).or_default();
        for (key, value) in classifier.labels() {
            match labels.get(key) {
                Some(current) => {
                    debug!(
                        cluster = %cluster,
                        classifier = %classifier.name(),
                        owner = %current.owner,
                        key = %key,
                        "Label already managed by another classifier"
                    );
                    entry.unmanaged.push(UnmanagedLabel {
                        key: key.clone(),
                        failure_message: format!("owned by {}", current.owner),
                    });
                }
                None => {
                    labels.insert(
                        key.clone(),
                        LabelOwner {
                            value: value.clone(),
                            owner: classifier.name().to_string(),
                        },
                    );
                    entry.managed.push(key.clone());
                }
            }
        }
    }

    Arbitration {
        cluster: cluster.clone(),
        claims,
        labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::types::{ClassifierLabel, ClassifierResource, ClassifierSpec};
    use crate::kubernetes::inventory::ClusterType;
    use chrono::{TimeZone, Utc};

    fn classifier(name: &str, labels: &[(&str, &str)], created: Option<i64>) -> Classifier {
        Classifier::from_resource(&ClassifierResource {
            name: name.to_string(),
            creation_timestamp: created.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            deleting: false,
            spec: ClassifierSpec {
                classifier_labels: labels
                    .iter()
                    .map(|(k, v)| ClassifierLabel {
                        key: k.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
                ..Default::default()
            },
        })
        .unwrap()
    }

    fn cluster_x() -> ClusterRef {
        ClusterRef::new(ClusterType::Capi, "default", "x")
    }

    #[test]
    fn test_first_in_rank_owns_key() {
        let c1 = classifier("C1", &[("env", "prod")], None);
        let c2 = classifier("C2", &[("env", "staging")], None);
        let result = arbitrate(&cluster_x(), &[&c2, &c1], &ByName);

        assert_eq!(result.claims["C1"].managed, vec!["env"]);
        assert!(result.claims["C1"].unmanaged.is_empty());
        assert!(result.claims["C2"].managed.is_empty());
        assert_eq!(
            result.claims["C2"].unmanaged,
            vec![UnmanagedLabel {
                key: "env".to_string(),
                failure_message: "owned by C1".to_string()
            }]
        );
        assert_eq!(
            result.labels["env"],
            LabelOwner {
                value: "prod".to_string(),
                owner: "C1".to_string()
            }
        );
    }

    #[test]
    fn test_disjoint_keys_all_managed() {
        let a = classifier("a", &[("env", "prod")], None);
        let b = classifier("b", &[("region", "eu")], None);
        let result = arbitrate(&cluster_x(), &[&a, &b], &ByName);
        assert_eq!(result.claims["a"].managed, vec!["env"]);
        assert_eq!(result.claims["b"].managed, vec!["region"]);
        assert_eq!(result.labels.len(), 2);
    }

    #[test]
    fn test_partial_overlap() {
        let a = classifier("a", &[("env", "prod")], None);
        let b = classifier("b", &[("env", "dev"), ("team", "core")], None);
        let result = arbitrate(&cluster_x(), &[&b, &a], &ByName);
        assert_eq!(result.claims["b"].managed, vec!["team"]);
        assert_eq!(result.claims["b"].unmanaged[0].key, "env");
    }

    #[test]
    fn test_independent_of_input_order() {
        let a = classifier("a", &[("env", "1")], None);
        let b = classifier("b", &[("env", "2")], None);
        let c = classifier("c", &[("env", "3"), ("x", "y")], None);
        let orders: [[&Classifier; 3]; 3] = [[&a, &b, &c], [&c, &b, &a], [&b, &c, &a]];
        let expected = arbitrate(&cluster_x(), &orders[0], &ByName);
        for _ in 0..100 {
            for order in &orders {
                assert_eq!(arbitrate(&cluster_x(), order, &ByName), expected);
            }
        }
        assert_eq!(expected.labels["env"].owner, "a");
    }

    #[test]
    fn test_creation_timestamp_ordering() {
        let young = classifier("a-young", &[("env", "1")], Some(2_000));
        let old = classifier("z-old", &[("env", "2")], Some(1_000));
        let result = arbitrate(&cluster_x(), &[&young, &old], &ByCreationTimestamp);
        assert_eq!(result.labels["env"].owner, "z-old");
    }

    #[test]
    fn test_identical_timestamps_fall_back_to_name() {
        let b = classifier("b", &[("env", "1")], Some(1_000));
        let a = classifier("a", &[("env", "2")], Some(1_000));
        let result = arbitrate(&cluster_x(), &[&b, &a], &ByCreationTimestamp);
        assert_eq!(result.labels["env"].owner, "a");
    }

    #[test]
    fn test_untimestamped_rank_last() {
        let none = classifier("a", &[("env", "1")], None);
        let some = classifier("b", &[("env", "2")], Some(5));
        let result = arbitrate(&cluster_x(), &[&none, &some], &ByCreationTimestamp);
        assert_eq!(result.labels["env"].owner, "b");
    }

    #[test]
    fn test_injected_adversarial_ordering() {
        let a = classifier("a", &[("env", "1")], None);
        let b = classifier("b", &[("env", "2")], None);
        let reverse = |x: &Classifier, y: &Classifier| y.name().cmp(x.name());
        let result = arbitrate(&cluster_x(), &[&a, &b], &reverse);
        assert_eq!(result.labels["env"].owner, "b");
        assert_eq!(result.claims["a"].unmanaged[0].failure_message, "owned by b");
    }

    #[test]
    fn test_tied_ordering_still_deterministic() {
        let a = classifier("a", &[("env", "1")], None);
        let b = classifier("b", &[("env", "2")], None);
        let all_equal = |_: &Classifier, _: &Classifier| Ordering::Equal;
        assert_eq!(arbitrate(&cluster_x(), &[&b, &a], &all_equal).labels["env"].owner, "a");
        assert_eq!(arbitrate(&cluster_x(), &[&a, &b], &all_equal).labels["env"].owner, "a");
    }

    #[test]
    fn test_ownership_not_sticky() {
        let a = classifier("a", &[("env", "1")], None);
        let b = classifier("b", &[("env", "2")], None);
        let first = arbitrate(&cluster_x(), &[&a, &b], &ByName);
        assert_eq!(first.labels["env"].owner, "a");

        // "a" no longer matches: the key moves to the next in rank
        let second = arbitrate(&cluster_x(), &[&b], &ByName);
        assert_eq!(second.labels["env"].owner, "b");
        assert_eq!(second.claims["b"].managed, vec!["env"]);
    }

    #[test]
    fn test_classifier_without_labels_gets_empty_claims() {
        let a = classifier("a", &[], None);
        let result = arbitrate(&cluster_x(), &[&a], &ByName);
        assert_eq!(result.claims["a"], LabelClaims::default());
        assert!(result.labels.is_empty());
    }
}

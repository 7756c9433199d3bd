// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Combine every constraint of a classifier into one verdict per cluster.

use serde::Serialize;
use tracing::debug;

use super::constraint::{ConstraintContext, evaluate_constraint};
use super::types::{Classifier, KubernetesVersionConstraint};
use crate::error::EvaluationError;
use crate::kubernetes::inventory::{ClusterRef, ClusterSnapshot};
use crate::kubernetes::version::compare_versions;

/// Verdict of one classifier on one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub classifier: String,
    pub cluster: ClusterRef,
    pub is_match: bool,
    /// Errors that failed individual constraints closed
    pub failures: Vec<String>,
}

/// AND every resource and version constraint of `classifier` on `snapshot`
///
/// All constraints are evaluated, even after the first miss, so every error is
/// reported. A classifier without constraints matches every cluster.
pub fn classify(
    classifier: &Classifier,
    snapshot: &ClusterSnapshot,
    ctx: ConstraintContext<'_>,
) -> Classification {
    let mut is_match = true;
    let mut failures = Vec::new();

    for constraint in classifier.constraints() {
        match evaluate_constraint(constraint, snapshot, ctx) {
            Ok(outcome) => is_match &= outcome.satisfied,
            Err(e) => {
                is_match = false;
                failures.push(e.to_string());
            }
        }
    }

    for constraint in classifier.version_constraints() {
        match check_version(constraint, snapshot) {
            Ok(satisfied) => is_match &= satisfied,
            Err(e) => {
                is_match = false;
                failures.push(e.to_string());
            }
        }
    }

    debug!(
        classifier = %classifier.name(),
        cluster = %snapshot.cluster,
        is_match = is_match,
        failures = failures.len(),
        "Classified cluster"
    );

    Classification {
        classifier: classifier.name().to_string(),
        cluster: snapshot.cluster.clone(),
        is_match,
        failures,
    }
}

fn check_version(
    constraint: &KubernetesVersionConstraint,
    snapshot: &ClusterSnapshot,
) -> Result<bool, EvaluationError> {
    let reported = match &snapshot.version {
        Some(Ok(version)) => version,
        Some(Err(message)) => {
            return Err(EvaluationError::Inventory {
                what: "kubernetes version".to_string(),
                message: message.clone(),
            });
        }
        None => {
            return Err(EvaluationError::Inventory {
                what: "kubernetes version".to_string(),
                message: "version was not collected".to_string(),
            });
        }
    };
    compare_versions(reported, constraint.version, constraint.comparison)
}

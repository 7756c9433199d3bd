// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Deployed resource constraint evaluation
//!
//! A constraint selects resources of one kind (optionally within a namespace),
//! narrows them with label filters, field filters and an optional predicate
//! script, and is satisfied when the number of survivors lies within
//! `[minCount, maxCount]`.

use kube::core::DynamicObject;
use serde::Serialize;
use tracing::debug;

use super::script::{ScriptEvaluator, run_predicate};
use super::types::DeployedResourceConstraint;
use crate::error::EvaluationError;
use crate::kubernetes::field_selectors::to_selector_string;
use crate::kubernetes::inventory::ClusterSnapshot;
use crate::kubernetes::kinds::KindRegistry;

/// Collaborators shared by every constraint in a pass
#[derive(Clone, Copy)]
pub struct ConstraintContext<'a> {
    pub kinds: &'a KindRegistry,
    pub scripts: &'a dyn ScriptEvaluator,
}

/// Result of evaluating one constraint against one cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConstraintOutcome {
    pub satisfied: bool,
    /// Resources that passed every filter
    pub matched: u64,
}

/// Evaluate `constraint` against the resources in `snapshot`
///
/// Errors mean the constraint failed closed; the caller records them.
pub fn evaluate_constraint(
    constraint: &DeployedResourceConstraint,
    snapshot: &ClusterSnapshot,
    ctx: ConstraintContext<'_>,
) -> Result<ConstraintOutcome, EvaluationError> {
    let kind = constraint.kind();

    // Unsupported fields fail the constraint even when nothing would be listed
    if let Some(unsupported) = constraint
        .field_filters()
        .iter()
        .find(|f| !ctx.kinds.is_supported(kind, &f.key))
    {
        return Err(EvaluationError::UnsupportedField {
            kind: kind.to_string(),
            field: unsupported.key.clone(),
        });
    }

    let key = constraint.inventory_key();
    let candidates = snapshot
        .select(&key)
        .map_err(|message| EvaluationError::Inventory {
            what: key.to_string(),
            message,
        })?;
    let listed = candidates.len();

    let filtered: Vec<&DynamicObject> = candidates
        .into_iter()
        .filter(|obj| constraint.label_filters().iter().all(|f| f.matches_labels(obj)))
        .filter(|obj| constraint.field_filters().iter().all(|f| f.matches_field(obj)))
        .collect();

    let matched = match constraint.script() {
        Some(script) => {
            let mut matched = 0u64;
            for obj in &filtered {
                if run_predicate(ctx.scripts, script, obj)? {
                    matched += 1;
                }
            }
            matched
        }
        None => filtered.len() as u64,
    };

    let satisfied = constraint.count_in_bounds(matched);
    debug!(
        cluster = %snapshot.cluster,
        kind = %kind,
        namespace = ?constraint.namespace(),
        label_selector = ?to_selector_string(constraint.label_filters()),
        field_selector = ?to_selector_string(constraint.field_filters()),
        listed = listed,
        matched = matched,
        min = constraint.min_count(),
        max = ?constraint.max_count(),
        satisfied = satisfied,
        "Evaluated resource constraint"
    );

    Ok(ConstraintOutcome { satisfied, matched })
}

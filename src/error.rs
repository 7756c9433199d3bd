// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error kinds surfaced by classification.
//!
//! None of these abort a pass. Evaluation errors are isolated to one
//! (classifier, cluster, constraint) triple and end up as failure messages in
//! the produced records; spec errors exclude a single classifier.

use thiserror::Error;

/// Failure while evaluating a single constraint against a cluster
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// The script collaborator failed or returned something other than
    /// an object with a boolean `matching` field
    #[error("script evaluation failed for {resource}: {message}")]
    PredicateEvaluation { resource: String, message: String },

    /// A field filter references a field outside the supported set for the kind
    #[error("field '{field}' is not supported for filtering {kind}")]
    UnsupportedField { kind: String, field: String },

    /// The cluster reported a version that cannot be parsed
    #[error("cannot parse kubernetes version '{version}'")]
    VersionParse { version: String },

    /// The inventory or version collaborator failed for this cluster
    #[error("failed to collect {what}: {message}")]
    Inventory { what: String, message: String },
}

/// Invalid classifier specification, detected when building validated types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("deployed resource constraint #{index}: kind must not be empty")]
    EmptyKind { index: usize },

    #[error("deployed resource constraint #{index}: {field} must not be negative (got {value})")]
    NegativeCount {
        index: usize,
        field: &'static str,
        value: i64,
    },

    #[error("deployed resource constraint #{index}: minCount {min} is greater than maxCount {max}")]
    InvertedBounds { index: usize, min: u64, max: u64 },

    #[error("unknown operation '{0}' (expected Equal or Different)")]
    UnknownOperation(String),

    #[error("unknown comparison '{0}'")]
    UnknownComparison(String),

    #[error("kubernetes version constraint #{index}: cannot parse version '{version}'")]
    InvalidTargetVersion { index: usize, version: String },

    #[error("filter key must not be empty")]
    EmptyFilterKey,

    #[error("classifier label key must not be empty")]
    EmptyLabelKey,

    #[error("classifier label '{0}' is listed more than once")]
    DuplicateLabelKey(String),

    #[error("classifier name must not be empty")]
    EmptyName,

    #[error("classifier spec cannot be hashed: {0}")]
    Unhashable(String),
}

/// Errors rejecting a whole evaluation pass input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error("classifier '{0}' appears more than once in the pass input")]
    DuplicateClassifier(String),
}

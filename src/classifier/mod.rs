// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Classifier model and evaluation
//!
//! - `types`: classifier resources and their validated form
//! - `constraint`: deployed resource constraints against one snapshot
//! - `aggregate`: all constraints of a classifier into one verdict
//! - `arbitration`: per-cluster label ownership
//! - `status`: per-classifier status and per-cluster reports
//! - `script`: predicate script interpreter seam

pub mod aggregate;
pub mod arbitration;
pub mod constraint;
pub mod script;
pub mod status;
pub mod types;

pub use aggregate::{Classification, classify};
pub use arbitration::{
    Arbitration, ByCreationTimestamp, ByName, ClassifierOrdering, LabelClaims, LabelOwner,
    UnmanagedLabel, arbitrate,
};
pub use constraint::{ConstraintContext, ConstraintOutcome, evaluate_constraint};
pub use script::{NoScriptEvaluator, ScriptEvaluator};
pub use status::{
    ClassifierEntry, ClassifierReport, ClassifierStatus, ClusterOutcome, FeatureStatus,
    StatusReport, build_status,
};
pub use types::{Classifier, ClassifierResource, ClassifierSpec};

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster classification
//!
//! Classifiers describe clusters by the resources deployed in them and by
//! their Kubernetes version. Every pass evaluates each classifier against each
//! managed cluster, decides which classifier owns each requested label key on
//! each cluster, and produces per-classifier status plus one report per
//! classifier/cluster pair.
//!
//! Cluster access goes through [`ResourceInventoryProvider`] and
//! [`ClusterVersionProvider`]; predicate scripts through [`ScriptEvaluator`].

pub mod classifier;
pub mod config;
pub mod error;
pub mod kubernetes;
pub mod logging;
pub mod pass;

pub use classifier::{ClassifierOrdering, ClassifierResource, ScriptEvaluator};
pub use config::EvaluatorConfig;
pub use error::{EvaluationError, PassError, SpecError};
pub use kubernetes::{ClusterRef, ClusterVersionProvider, ManagedCluster, ResourceInventoryProvider};
pub use pass::{Evaluator, PassOutput, evaluate_cluster};

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Evaluation pass
//!
//! A pass takes the current classifiers and clusters, collects one snapshot per
//! ready cluster, classifies, arbitrates labels per cluster and materializes
//! status. Nothing carries over between passes: the same inputs always yield
//! the same output.

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use kube::core::TypeMeta;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::classifier::aggregate::classify;
use crate::classifier::arbitration::{
    ByCreationTimestamp, ByName, ClassifierOrdering, LabelOwner, arbitrate,
};
use crate::classifier::constraint::ConstraintContext;
use crate::classifier::script::{NoScriptEvaluator, ScriptEvaluator};
use crate::classifier::status::{ClassifierEntry, ClusterOutcome, StatusReport, build_status};
use crate::classifier::types::{Classifier, ClassifierResource};
use crate::config::{EvaluatorConfig, OrderingStrategy};
use crate::error::PassError;
use crate::kubernetes::inventory::{
    ClusterRef, ClusterSnapshot, ClusterVersionProvider, InventoryKey, ManagedCluster,
    ResourceInventoryProvider,
};
use crate::kubernetes::kinds::KindRegistry;

/// Default bound on clusters collected concurrently
pub const DEFAULT_MAX_CONCURRENT_CLUSTERS: usize = 10;

/// Final labels of one cluster after arbitration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterLabelAssignment {
    pub cluster: ClusterRef,
    pub labels: BTreeMap<String, LabelOwner>,
}

/// Everything a pass produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassOutput {
    #[serde(flatten)]
    pub status: StatusReport,
    /// Ready clusters only, in cluster order
    pub assignments: Vec<ClusterLabelAssignment>,
}

/// Classify and arbitrate one cluster from an already collected snapshot
///
/// `active` must be the complete set of classifiers taking part in the pass.
pub fn evaluate_cluster(
    snapshot: &ClusterSnapshot,
    active: &[&Classifier],
    ctx: ConstraintContext<'_>,
    ordering: &dyn ClassifierOrdering,
) -> ClusterOutcome {
    let classifications: BTreeMap<_, _> = active
        .iter()
        .map(|c| (c.name().to_string(), classify(c, snapshot, ctx)))
        .collect();

    let matching: Vec<&Classifier> = active
        .iter()
        .copied()
        .filter(|c| classifications.get(c.name()).is_some_and(|v| v.is_match))
        .collect();

    let arbitration = arbitrate(&snapshot.cluster, &matching, ordering);

    ClusterOutcome {
        cluster: snapshot.cluster.clone(),
        ready: true,
        classifications,
        arbitration: Some(arbitration),
    }
}

/// Runs evaluation passes against the configured collaborators
pub struct Evaluator {
    inventory: Arc<dyn ResourceInventoryProvider>,
    versions: Arc<dyn ClusterVersionProvider>,
    scripts: Arc<dyn ScriptEvaluator>,
    kinds: Arc<KindRegistry>,
    ordering: Arc<dyn ClassifierOrdering>,
    max_concurrent_clusters: usize,
}

impl Evaluator {
    /// Evaluator with built-in kinds, creation-timestamp ordering and no script interpreter
    pub fn new(
        inventory: Arc<dyn ResourceInventoryProvider>,
        versions: Arc<dyn ClusterVersionProvider>,
    ) -> Self {
        Self {
            inventory,
            versions,
            scripts: Arc::new(NoScriptEvaluator),
            kinds: Arc::new(KindRegistry::with_core_kinds()),
            ordering: Arc::new(ByCreationTimestamp),
            max_concurrent_clusters: DEFAULT_MAX_CONCURRENT_CLUSTERS,
        }
    }

    /// Evaluator configured from an [`EvaluatorConfig`]
    pub fn from_config(
        config: &EvaluatorConfig,
        inventory: Arc<dyn ResourceInventoryProvider>,
        versions: Arc<dyn ClusterVersionProvider>,
    ) -> Self {
        let ordering: Arc<dyn ClassifierOrdering> = match config.ordering {
            OrderingStrategy::CreationTimestamp => Arc::new(ByCreationTimestamp),
            OrderingStrategy::Name => Arc::new(ByName),
        };
        Self::new(inventory, versions)
            .with_kinds(config.kind_registry())
            .with_ordering(ordering)
            .with_max_concurrent_clusters(config.max_concurrent_clusters)
    }

    pub fn with_scripts(mut self, scripts: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_kinds(mut self, kinds: KindRegistry) -> Self {
        self.kinds = Arc::new(kinds);
        self
    }

    pub fn with_ordering(mut self, ordering: Arc<dyn ClassifierOrdering>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_max_concurrent_clusters(mut self, limit: usize) -> Self {
        self.max_concurrent_clusters = limit.max(1);
        self
    }

    /// Run one full pass
    ///
    /// Only duplicate classifier names reject the pass. Invalid classifiers and
    /// collaborator failures surface as data in the output.
    pub async fn run(
        &self,
        classifiers: &[ClassifierResource],
        clusters: &[ManagedCluster],
    ) -> Result<PassOutput, PassError> {
        let start = Instant::now();
        let entries = validate(classifiers)?;
        let active: Vec<&Classifier> = entries.iter().filter_map(ClassifierEntry::active).collect();

        let keys: BTreeSet<InventoryKey> = active
            .iter()
            .flat_map(|c| c.constraints().iter().map(|dc| dc.inventory_key()))
            .collect();
        let needs_version = active.iter().any(|c| !c.version_constraints().is_empty());

        // One entry per cluster; the first occurrence wins
        let mut seen = HashSet::new();
        let clusters: Vec<&ManagedCluster> = clusters
            .iter()
            .filter(|mc| seen.insert(mc.cluster.clone()))
            .collect();

        info!(
            classifiers = entries.len(),
            active = active.len(),
            clusters = clusters.len(),
            inventory_queries = keys.len(),
            "Starting classification pass"
        );

        let ctx = ConstraintContext {
            kinds: &self.kinds,
            scripts: self.scripts.as_ref(),
        };
        let ordering = self.ordering.as_ref();
        let active = &active;
        let keys = &keys;

        let mut outcomes: Vec<ClusterOutcome> = stream::iter(clusters)
            .map(|managed| async move {
                if !managed.ready {
                    debug!(cluster = %managed.cluster, "Cluster not ready, skipping evaluation");
                    return ClusterOutcome {
                        cluster: managed.cluster.clone(),
                        ready: false,
                        classifications: BTreeMap::new(),
                        arbitration: None,
                    };
                }
                let snapshot = self.collect(&managed.cluster, keys, needs_version).await;
                evaluate_cluster(&snapshot, active, ctx, ordering)
            })
            .buffer_unordered(self.max_concurrent_clusters)
            .collect()
            .await;

        // Completion order is arbitrary; output is in cluster order
        outcomes.sort_by(|a, b| a.cluster.cmp(&b.cluster));

        let assignments = outcomes
            .iter()
            .filter_map(|o| {
                o.arbitration.as_ref().map(|a| ClusterLabelAssignment {
                    cluster: a.cluster.clone(),
                    labels: a.labels.clone(),
                })
            })
            .collect();
        let status = build_status(&entries, &outcomes);

        info!(
            clusters = outcomes.len(),
            reports = status.reports.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Classification pass complete"
        );

        Ok(PassOutput {
            status,
            assignments,
        })
    }

    /// Collect version and inventory for one cluster
    ///
    /// Collaborator failures are recorded in the snapshot, never returned.
    async fn collect(
        &self,
        cluster: &ClusterRef,
        keys: &BTreeSet<InventoryKey>,
        needs_version: bool,
    ) -> ClusterSnapshot {
        let start = Instant::now();
        let mut snapshot = ClusterSnapshot::new(cluster.clone());

        if needs_version {
            snapshot.version = Some(self.versions.version(cluster).await.map_err(|e| {
                warn!(cluster = %cluster, error = %e, "Failed to get cluster version");
                format!("{e:#}")
            }));
        }

        let listings = join_all(keys.iter().map(|key| async move {
            let result = self
                .inventory
                .list(cluster, &key.kind, key.namespace.as_deref())
                .await;
            (key, result)
        }))
        .await;

        for (key, result) in listings {
            match result {
                Ok(mut objects) => {
                    // List responses usually omit per-item apiVersion/kind
                    for obj in &mut objects {
                        if obj.types.is_none() {
                            obj.types = Some(TypeMeta {
                                api_version: key.kind.api_version(),
                                kind: key.kind.kind.clone(),
                            });
                        }
                    }
                    snapshot.add_resources(objects);
                }
                Err(e) => {
                    warn!(cluster = %cluster, query = %key, error = %e, "Failed to list resources");
                    snapshot.record_failure(key.clone(), format!("{e:#}"));
                }
            }
        }

        debug!(
            cluster = %cluster,
            resources = snapshot.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Collected cluster snapshot"
        );
        snapshot
    }
}

/// Validate every classifier, keeping invalid ones for reporting
fn validate(classifiers: &[ClassifierResource]) -> Result<Vec<ClassifierEntry>, PassError> {
    let mut names = HashSet::new();
    let mut entries = Vec::with_capacity(classifiers.len());

    for resource in classifiers {
        let name = resource.name.trim().to_string();
        // Unnamed classifiers are reported invalid, not as duplicates of each other
        if !name.is_empty() && !names.insert(name.clone()) {
            return Err(PassError::DuplicateClassifier(name));
        }
        match Classifier::from_resource(resource) {
            Ok(classifier) => entries.push(ClassifierEntry::valid(classifier)),
            Err(error) => {
                warn!(classifier = %name, error = %error, "Invalid classifier spec");
                entries.push(ClassifierEntry::invalid(name, &resource.spec, error));
            }
        }
    }

    Ok(entries)
}

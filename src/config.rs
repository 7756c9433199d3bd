// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Evaluator configuration
//!
//! All cluster-classifier data is stored under ~/.cluster-classifier/:
//! - ~/.cluster-classifier/config.json - evaluator configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::kubernetes::kinds::{KindInfo, KindRegistry};
use crate::pass::DEFAULT_MAX_CONCURRENT_CLUSTERS;

/// Get the base directory (~/.cluster-classifier/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".cluster-classifier"))
        .context("Could not determine home directory")
}

/// How classifiers competing for a label key are ranked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingStrategy {
    /// Oldest classifier first, ties broken by name
    #[default]
    CreationTimestamp,
    Name,
}

fn default_max_concurrent_clusters() -> usize {
    DEFAULT_MAX_CONCURRENT_CLUSTERS
}

/// Evaluator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Clusters whose inventory is collected concurrently
    #[serde(default = "default_max_concurrent_clusters")]
    pub max_concurrent_clusters: usize,
    #[serde(default)]
    pub ordering: OrderingStrategy,
    /// Kinds (usually CRDs) registered on top of the built-in ones
    #[serde(default)]
    pub additional_kinds: Vec<KindInfo>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_clusters: DEFAULT_MAX_CONCURRENT_CLUSTERS,
            ordering: OrderingStrategy::default(),
            additional_kinds: Vec::new(),
        }
    }
}

impl EvaluatorConfig {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from `path`, or return default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.cluster-classifier/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Built-in kinds plus `additional_kinds`
    ///
    /// An additional kind with the same group/version/kind as a built-in one
    /// replaces it.
    pub fn kind_registry(&self) -> KindRegistry {
        let mut registry = KindRegistry::with_core_kinds();
        for info in &self.additional_kinds {
            registry.add(info.clone());
        }
        registry
    }
}

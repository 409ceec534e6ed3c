// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Configuration for reasoning, merging and graph building
//!
//! Resolution order: `KGRAPH_*` env vars > TOML file > defaults.

use crate::error::{KgraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level kgraph configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct KgraphConfig {
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Depth bound for circular guarantee search
    pub guarantee_max_depth: usize,
    /// Depth bound for money circulation search (never above 5)
    pub circulation_max_depth: usize,
    /// Hop bound for risk propagation
    pub propagation_max_depth: usize,
    /// Neighborhood depth loaded into a rule context
    pub context_depth: usize,
    /// Amount above which a transaction is flagged
    pub large_transaction_threshold: f64,
    /// Minimum matched/total ratio for a disease to be reported
    pub min_symptom_match_ratio: f64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            guarantee_max_depth: 5,
            circulation_max_depth: 5,
            propagation_max_depth: 5,
            context_depth: 3,
            large_transaction_threshold: 1_000_000.0,
            min_symptom_match_ratio: 0.5,
        }
    }
}

/// Which scorer compares entity texts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMode {
    /// Normalized Levenshtein, falls back to Jaccard without the `edit-distance` feature
    #[default]
    EditDistance,
    /// Character-set Jaccard
    Jaccard,
}

impl std::str::FromStr for SimilarityMode {
    type Err = KgraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edit_distance" | "levenshtein" => Ok(SimilarityMode::EditDistance),
            "jaccard" => Ok(SimilarityMode::Jaccard),
            other => Err(KgraphError::Config(format!(
                "Unknown similarity mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeConfig {
    pub similarity_threshold: f64,
    pub candidate_limit: usize,
    pub similarity_mode: SimilarityMode,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            candidate_limit: 100,
            similarity_mode: SimilarityMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub duplicate_threshold: f64,
    pub merge_duplicates: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.85,
            merge_duplicates: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl KgraphConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment overrides
    ///
    /// Supported environment variables:
    /// - KGRAPH_GUARANTEE_MAX_DEPTH
    /// - KGRAPH_CIRCULATION_MAX_DEPTH
    /// - KGRAPH_PROPAGATION_MAX_DEPTH
    /// - KGRAPH_CONTEXT_DEPTH
    /// - KGRAPH_LARGE_TRANSACTION_THRESHOLD
    /// - KGRAPH_MIN_SYMPTOM_MATCH_RATIO
    /// - KGRAPH_SIMILARITY_THRESHOLD
    /// - KGRAPH_CANDIDATE_LIMIT
    /// - KGRAPH_SIMILARITY_MODE (edit_distance | jaccard)
    /// - KGRAPH_DUPLICATE_THRESHOLD
    /// - KGRAPH_MERGE_DUPLICATES
    pub fn apply_env(mut self) -> Self {
        let r = &mut self.reasoning;
        if let Some(v) = env_parse("KGRAPH_GUARANTEE_MAX_DEPTH") {
            r.guarantee_max_depth = v;
        }
        if let Some(v) = env_parse("KGRAPH_CIRCULATION_MAX_DEPTH") {
            r.circulation_max_depth = v;
        }
        if let Some(v) = env_parse("KGRAPH_PROPAGATION_MAX_DEPTH") {
            r.propagation_max_depth = v;
        }
        if let Some(v) = env_parse("KGRAPH_CONTEXT_DEPTH") {
            r.context_depth = v;
        }
        if let Some(v) = env_parse("KGRAPH_LARGE_TRANSACTION_THRESHOLD") {
            r.large_transaction_threshold = v;
        }
        if let Some(v) = env_parse("KGRAPH_MIN_SYMPTOM_MATCH_RATIO") {
            r.min_symptom_match_ratio = v;
        }

        let m = &mut self.merge;
        if let Some(v) = env_parse("KGRAPH_SIMILARITY_THRESHOLD") {
            m.similarity_threshold = v;
        }
        if let Some(v) = env_parse("KGRAPH_CANDIDATE_LIMIT") {
            m.candidate_limit = v;
        }
        if let Some(v) = env_parse("KGRAPH_SIMILARITY_MODE") {
            m.similarity_mode = v;
        }

        let b = &mut self.builder;
        if let Some(v) = env_parse("KGRAPH_DUPLICATE_THRESHOLD") {
            b.duplicate_threshold = v;
        }
        if let Some(v) = env_parse("KGRAPH_MERGE_DUPLICATES") {
            b.merge_duplicates = v;
        }

        self
    }

    /// Load configuration: defaults, then the TOML file, then env overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = Self::file_or_default(config_file)?.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// The TOML file when it exists, defaults otherwise. No env overrides.
    pub fn file_or_default(config_file: Option<PathBuf>) -> Result<Self> {
        match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("merge.similarity_threshold", self.merge.similarity_threshold),
            ("builder.duplicate_threshold", self.builder.duplicate_threshold),
            (
                "reasoning.min_symptom_match_ratio",
                self.reasoning.min_symptom_match_ratio,
            ),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(KgraphError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let depths = [
            ("reasoning.guarantee_max_depth", self.reasoning.guarantee_max_depth),
            ("reasoning.circulation_max_depth", self.reasoning.circulation_max_depth),
            ("reasoning.propagation_max_depth", self.reasoning.propagation_max_depth),
            ("reasoning.context_depth", self.reasoning.context_depth),
        ];
        for (name, value) in depths {
            if value == 0 {
                return Err(KgraphError::Config(format!("{name} must be positive")));
            }
        }

        if self.merge.candidate_limit == 0 {
            return Err(KgraphError::Config(
                "merge.candidate_limit must be positive".into(),
            ));
        }
        Ok(())
    }
}

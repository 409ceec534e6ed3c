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

//! Entity Merge Service
//!
//! Finds likely duplicates within a project and folds source entities into a
//! target: properties are combined per strategy, relations are re-pointed at
//! the target, and the sources are deleted.

use crate::similarity::SimilarityScorer;
use kgraph_core::{Entity, EntityType, GraphStore, KgraphError, MergeConfig, Properties, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// How target and source properties are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Target properties unchanged
    KeepTarget,
    /// Currently identical to `KeepTarget`
    KeepNewest,
    /// Add source keys missing on the target; target wins on conflict
    #[default]
    MergeAll,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::KeepTarget => "keep_target",
            MergeStrategy::KeepNewest => "keep_newest",
            MergeStrategy::MergeAll => "merge_all",
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = KgraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keep_target" => Ok(MergeStrategy::KeepTarget),
            "keep_newest" => Ok(MergeStrategy::KeepNewest),
            "merge_all" => Ok(MergeStrategy::MergeAll),
            other => Err(KgraphError::validation(format!(
                "Invalid merge strategy: {other}"
            ))),
        }
    }
}

/// Candidate search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateQuery {
    pub project_id: String,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    pub similarity_threshold: f64,
    pub limit: usize,
}

impl CandidateQuery {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self::from_config(project_id, &MergeConfig::default())
    }

    pub fn from_config(project_id: impl Into<String>, config: &MergeConfig) -> Self {
        Self {
            project_id: project_id.into(),
            entity_type: None,
            similarity_threshold: config.similarity_threshold,
            limit: config.candidate_limit,
        }
    }

    pub fn with_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMergeCandidate {
    pub entity_id: String,
    pub entity_text: String,
    pub entity_type: EntityType,
    /// Against the first member of the group; the first member has 1.0
    pub similarity: f64,
}

impl EntityMergeCandidate {
    fn of(entity: &Entity, similarity: f64) -> Self {
        Self {
            entity_id: entity.id.clone(),
            entity_text: entity.external_id.clone(),
            entity_type: entity.entity_type,
            similarity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCommand {
    pub project_id: String,
    #[serde(default)]
    pub owner_id: String,
    /// The entity that survives
    pub target_entity_id: String,
    pub source_entity_ids: Vec<String>,
    /// keep_target, keep_newest or merge_all
    #[serde(default = "default_strategy")]
    pub merge_strategy: String,
}

fn default_strategy() -> String {
    MergeStrategy::default().as_str().to_string()
}

impl MergeCommand {
    pub fn new(
        project_id: impl Into<String>,
        target_entity_id: impl Into<String>,
        source_entity_ids: Vec<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            owner_id: String::new(),
            target_entity_id: target_entity_id.into(),
            source_entity_ids,
            merge_strategy: default_strategy(),
        }
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy.as_str().to_string();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub merged_entity_id: String,
    pub properties_updated: bool,
    pub transferred_relations: usize,
    /// Relations between the target and a source, deleted instead of moved
    pub dropped_relations: usize,
    pub deleted_entities: usize,
    pub errors: Vec<String>,
}

/// Result of [`EntityMergeService::merge`]
#[derive(Debug)]
pub enum MergeOutcome {
    Completed(MergeReport),
    /// Relations moved but some sources could not be deleted
    Partial(MergeReport),
    Failed(KgraphError),
}

impl MergeOutcome {
    /// True unless the merge failed outright
    pub fn success(&self) -> bool {
        !matches!(self, MergeOutcome::Failed(_))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, MergeOutcome::Partial(_))
    }

    pub fn report(&self) -> Option<&MergeReport> {
        match self {
            MergeOutcome::Completed(report) | MergeOutcome::Partial(report) => Some(report),
            MergeOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&KgraphError> {
        match self {
            MergeOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

pub struct EntityMergeService {
    store: Arc<dyn GraphStore>,
    scorer: SimilarityScorer,
}

impl EntityMergeService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_config(store, &MergeConfig::default())
    }

    pub fn with_config(store: Arc<dyn GraphStore>, config: &MergeConfig) -> Self {
        Self {
            store,
            scorer: SimilarityScorer::new(config.similarity_mode),
        }
    }

    /// Groups of likely duplicates, compared within each entity type.
    ///
    /// Each entity opens a group with every later entity of its type that
    /// scores at or above the threshold. At most `query.limit` groups.
    #[tracing::instrument(skip(self, query), fields(project = %query.project_id))]
    pub async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Vec<EntityMergeCandidate>>> {
        let entities = self
            .store
            .list_entities(&query.project_id, query.entity_type)
            .await?;

        let mut by_type: Vec<(EntityType, Vec<&Entity>)> = Vec::new();
        for entity in &entities {
            match by_type.iter_mut().find(|(t, _)| *t == entity.entity_type) {
                Some((_, members)) => members.push(entity),
                None => by_type.push((entity.entity_type, vec![entity])),
            }
        }

        let mut groups = Vec::new();
        'types: for (_, members) in &by_type {
            for (i, head) in members.iter().enumerate() {
                if groups.len() >= query.limit {
                    break 'types;
                }
                let group: Vec<EntityMergeCandidate> = members[i + 1..]
                    .iter()
                    .filter_map(|other| {
                        let score = self
                            .scorer
                            .score_with_containment(&head.external_id, &other.external_id);
                        (score >= query.similarity_threshold)
                            .then(|| EntityMergeCandidate::of(other, score))
                    })
                    .collect();

                if !group.is_empty() {
                    let mut full = Vec::with_capacity(group.len() + 1);
                    full.push(EntityMergeCandidate::of(head, 1.0));
                    full.extend(group);
                    groups.push(full);
                }
            }
        }

        tracing::info!(groups = groups.len(), scanned = entities.len(), "Merge candidates found");
        Ok(groups)
    }

    /// Merge `source_entity_ids` into `target_entity_id`
    #[tracing::instrument(skip(self, command), fields(project = %command.project_id, target = %command.target_entity_id))]
    pub async fn merge(&self, command: &MergeCommand) -> MergeOutcome {
        match self.try_merge(command).await {
            Ok(report) if report.errors.is_empty() => {
                tracing::info!(
                    transferred = report.transferred_relations,
                    deleted = report.deleted_entities,
                    "Merge completed"
                );
                MergeOutcome::Completed(report)
            }
            Ok(report) => {
                tracing::warn!(errors = report.errors.len(), "Merge completed with errors");
                MergeOutcome::Partial(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Merge failed");
                MergeOutcome::Failed(e)
            }
        }
    }

    async fn try_merge(&self, command: &MergeCommand) -> Result<MergeReport> {
        let strategy: MergeStrategy = command.merge_strategy.parse()?;
        let project = command.project_id.as_str();

        let mut target = self
            .store
            .get_entity(project, &command.target_entity_id)
            .await?
            .ok_or_else(|| KgraphError::entity_not_found(&command.target_entity_id))?;

        // Resolve every source before touching anything
        let mut sources = Vec::with_capacity(command.source_entity_ids.len());
        for id in &command.source_entity_ids {
            if *id == target.id {
                return Err(KgraphError::validation(format!(
                    "Entity {id} cannot be merged into itself"
                )));
            }
            let source = self
                .store
                .get_entity(project, id)
                .await?
                .ok_or_else(|| KgraphError::entity_not_found(id))?;
            sources.push(source);
        }

        let mut report = MergeReport {
            merged_entity_id: target.id.clone(),
            ..Default::default()
        };

        let merged = merge_properties(&target, &sources, strategy);
        if merged != target.properties {
            target.update_properties(merged);
            self.store.merge_entity(&target).await?;
            report.properties_updated = true;
        }

        let source_ids: HashSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();
        for source in &sources {
            for mut relation in self.store.relations_of(project, &source.id).await? {
                if source_ids.contains(relation.source_id.as_str()) {
                    relation.source_id = target.id.clone();
                }
                if source_ids.contains(relation.target_id.as_str()) {
                    relation.target_id = target.id.clone();
                }

                if relation.source_id == relation.target_id {
                    self.store.delete_relation(project, &relation.id).await?;
                    report.dropped_relations += 1;
                } else {
                    self.store.merge_relation(&relation).await?;
                    report.transferred_relations += 1;
                }
            }
        }

        for source in &sources {
            match self.store.delete_entity(project, &source.id).await {
                Ok(true) => report.deleted_entities += 1,
                Ok(false) => report
                    .errors
                    .push(format!("Entity {} was already deleted", source.id)),
                Err(e) => report
                    .errors
                    .push(format!("Failed to delete entity {}: {e}", source.id)),
            }
        }

        Ok(report)
    }
}

fn merge_properties(target: &Entity, sources: &[Entity], strategy: MergeStrategy) -> Properties {
    let mut merged = target.properties.clone();
    if strategy == MergeStrategy::MergeAll {
        for source in sources {
            for (key, value) in &source.properties {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }
    merged
}

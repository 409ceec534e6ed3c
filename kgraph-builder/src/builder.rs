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

//! Graph Builder
//!
//! Turns extracted mentions into persisted entities and relations.
//!
//! ```text
//! entities ──normalize──▶ dedupe (batch only) ──▶ merge_entity ──┐
//!                                                               │ text → id
//! relations ──trim──▶ resolve endpoints ──▶ merge_relation ◀────┘
//! ```
//!
//! Per-item failures are collected in [`BuildGraphResult::failed_items`];
//! only a rejected command sets `success = false`.

use crate::normalizer::EntityNormalizer;
use crate::similarity::SimilarityScorer;
use kgraph_core::{
    BuilderConfig, Entity, EntityType, GraphStore, KgraphError, Properties, Relation,
    RelationType, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An entity mention produced by extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub text: String,
    /// Raw type label, kept as the entity's only label
    pub entity_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl ExtractedEntity {
    pub fn new(text: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entity_type: entity_type.into(),
            properties: Properties::new(),
        }
    }
}

/// A relation mention between two entity texts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub source_text: String,
    pub target_text: String,
    pub relation_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl ExtractedRelation {
    pub fn new(
        source_text: impl Into<String>,
        target_text: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            target_text: target_text.into(),
            relation_type: relation_type.into(),
            properties: Properties::new(),
        }
    }
}

fn default_merge_duplicates() -> bool {
    true
}

fn default_duplicate_threshold() -> f64 {
    0.85
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildGraphCommand {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relations: Vec<ExtractedRelation>,
    #[serde(default = "default_merge_duplicates")]
    pub merge_duplicates: bool,
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,
}

impl BuildGraphCommand {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            owner_id: String::new(),
            entities: Vec::new(),
            relations: Vec::new(),
            merge_duplicates: default_merge_duplicates(),
            duplicate_threshold: default_duplicate_threshold(),
        }
    }

    /// Take the dedupe settings from configuration
    pub fn with_config(mut self, config: &BuilderConfig) -> Self {
        self.merge_duplicates = config.merge_duplicates;
        self.duplicate_threshold = config.duplicate_threshold;
        self
    }

    pub fn with_entity(mut self, entity: ExtractedEntity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_relation(mut self, relation: ExtractedRelation) -> Self {
        self.relations.push(relation);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Entity,
    Relation,
}

/// An input item that could not be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub data: Value,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildGraphResult {
    pub success: bool,
    pub created_entities: usize,
    pub created_relations: usize,
    pub merged_entities: usize,
    pub failed_items: Vec<FailedItem>,
    pub errors: Vec<String>,
}

impl BuildGraphResult {
    /// Succeeded overall, but some items were rejected
    pub fn is_partial(&self) -> bool {
        self.success && !self.failed_items.is_empty()
    }

    fn fail(&mut self, kind: ItemKind, data: &impl Serialize, error: impl Into<String>) {
        self.failed_items.push(FailedItem {
            kind,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
            error: error.into(),
        });
    }
}

/// Normalized text to entity id, in insertion order
#[derive(Debug, Default)]
struct TextIndex {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl TextIndex {
    fn insert(&mut self, text: String, id: String) {
        match self.positions.get(&text) {
            Some(&pos) => self.entries[pos].1 = id,
            None => {
                self.positions.insert(text.clone(), self.entries.len());
                self.entries.push((text, id));
            }
        }
    }

    fn get(&self, text: &str) -> Option<&str> {
        self.positions.get(text).map(|&pos| self.entries[pos].1.as_str())
    }

    /// First entry scoring at least `threshold` against `text`
    fn find_similar(&self, text: &str, threshold: f64, scorer: &SimilarityScorer) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| scorer.score(text, existing) >= threshold)
            .map(|(_, id)| id.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    normalizer: EntityNormalizer,
    scorer: SimilarityScorer,
}

impl GraphBuilder {
    pub fn new(scorer: SimilarityScorer) -> Self {
        Self {
            normalizer: EntityNormalizer::new(),
            scorer,
        }
    }

    /// Build the command's mentions into `store`
    #[tracing::instrument(skip(self, command, store), fields(project = %command.project_id))]
    pub async fn build(&self, command: &BuildGraphCommand, store: &dyn GraphStore) -> BuildGraphResult {
        let mut result = BuildGraphResult {
            success: true,
            ..Default::default()
        };

        if let Err(e) = validate(command) {
            result.success = false;
            result.errors.push(e.to_string());
            return result;
        }

        let index = self.process_entities(command, store, &mut result).await;
        self.process_relations(command, store, &index, &mut result).await;

        tracing::info!(
            created_entities = result.created_entities,
            merged_entities = result.merged_entities,
            created_relations = result.created_relations,
            failed = result.failed_items.len(),
            "Graph build finished"
        );
        if result.is_partial() {
            tracing::warn!(failed = result.failed_items.len(), "Some items were not built");
        }
        result
    }

    async fn process_entities(
        &self,
        command: &BuildGraphCommand,
        store: &dyn GraphStore,
        result: &mut BuildGraphResult,
    ) -> TextIndex {
        let mut index = TextIndex::default();

        for item in &command.entities {
            let parsed = item.entity_type.parse::<EntityType>().ok();
            let text = self.normalizer.normalize(&item.text, parsed);

            if command.merge_duplicates {
                let existing = index
                    .find_similar(&text, command.duplicate_threshold, &self.scorer)
                    .map(str::to_string);
                if let Some(id) = existing {
                    tracing::debug!(text = %text, id = %id, "Merged duplicate mention");
                    index.insert(text, id);
                    result.merged_entities += 1;
                    continue;
                }
            }

            let entity = Entity::new(
                &command.project_id,
                &text,
                parsed.unwrap_or(EntityType::Enterprise),
            )
            .with_label(&item.entity_type)
            .with_properties(item.properties.clone());

            match store.merge_entity(&entity).await {
                Ok(saved) => {
                    index.insert(text, saved.id);
                    result.created_entities += 1;
                }
                Err(e) => result.fail(ItemKind::Entity, item, e.to_string()),
            }
        }

        index
    }

    async fn process_relations(
        &self,
        command: &BuildGraphCommand,
        store: &dyn GraphStore,
        index: &TextIndex,
        result: &mut BuildGraphResult,
    ) {
        for item in &command.relations {
            let source = self.normalizer.normalize(&item.source_text, None);
            let target = self.normalizer.normalize(&item.target_text, None);

            let (Some(source_id), Some(target_id)) = (index.get(&source), index.get(&target)) else {
                result.fail(ItemKind::Relation, item, "Source or target entity not found");
                continue;
            };

            let relation_type = item
                .relation_type
                .parse::<RelationType>()
                .unwrap_or(RelationType::Owns);

            let persisted = match Relation::new(&command.project_id, source_id, target_id, relation_type) {
                Ok(relation) => {
                    store
                        .merge_relation(&relation.with_properties(item.properties.clone()))
                        .await
                }
                Err(e) => Err(e),
            };

            match persisted {
                Ok(_) => result.created_relations += 1,
                Err(e) => result.fail(ItemKind::Relation, item, e.to_string()),
            }
        }
    }
}

fn validate(command: &BuildGraphCommand) -> Result<()> {
    if command.project_id.trim().is_empty() {
        return Err(KgraphError::validation("project_id must not be empty"));
    }
    if !(0.0..=1.0).contains(&command.duplicate_threshold) {
        return Err(KgraphError::validation(format!(
            "duplicate_threshold must be within [0, 1], got {}",
            command.duplicate_threshold
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_core::InMemoryGraphStore;

    #[tokio::test]
    async fn test_unknown_types_fall_back() {
        let store = InMemoryGraphStore::new();
        let command = BuildGraphCommand::new("p")
            .with_entity(ExtractedEntity::new("甲", "OTHER"))
            .with_entity(ExtractedEntity::new("乙", "PERSON"))
            .with_relation(ExtractedRelation::new("甲", "乙", "RELATED_TO"));

        let result = GraphBuilder::default().build(&command, &store).await;
        assert!(result.success);
        assert_eq!(result.created_entities, 2);
        assert_eq!(result.created_relations, 1);

        let entities = store.list_entities("p", None).await.unwrap();
        assert_eq!(entities[0].entity_type, EntityType::Enterprise);
        assert_eq!(entities[0].labels, vec!["OTHER"]);
        let relations = store.list_relations("p", None).await.unwrap();
        assert_eq!(relations[0].relation_type, RelationType::Owns);
    }

    #[tokio::test]
    async fn test_unresolved_endpoint_is_failed_item() {
        let store = InMemoryGraphStore::new();
        let command = BuildGraphCommand::new("p")
            .with_entity(ExtractedEntity::new("甲", "ENTERPRISE"))
            .with_relation(ExtractedRelation::new("甲", "丙", "OWNS"));

        let result = GraphBuilder::default().build(&command, &store).await;
        assert!(result.is_partial());
        assert_eq!(result.failed_items[0].kind, ItemKind::Relation);
        assert_eq!(result.failed_items[0].error, "Source or target entity not found");
    }

    #[tokio::test]
    async fn test_merged_mentions_self_loop_rejected() {
        let store = InMemoryGraphStore::new();
        let command = BuildGraphCommand::new("p")
            .with_entity(ExtractedEntity::new("Acme", "ENTERPRISE"))
            .with_entity(ExtractedEntity::new("Acme ", "ENTERPRISE"))
            .with_relation(ExtractedRelation::new("Acme", " Acme", "CONTROLS"));

        let result = GraphBuilder::default().build(&command, &store).await;
        assert_eq!(result.created_relations, 0);
        assert_eq!(result.failed_items.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_command() {
        let store = InMemoryGraphStore::new();
        let mut command = BuildGraphCommand::new("p");
        command.duplicate_threshold = 2.0;

        let result = GraphBuilder::default().build(&command, &store).await;
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_no_dedupe_when_disabled() {
        let store = InMemoryGraphStore::new();
        let mut command = BuildGraphCommand::new("p")
            .with_entity(ExtractedEntity::new("Acme", "ENTERPRISE"))
            .with_entity(ExtractedEntity::new("Acme", "ENTERPRISE"));
        command.merge_duplicates = false;

        let result = GraphBuilder::default().build(&command, &store).await;
        assert_eq!(result.created_entities, 2);
        assert_eq!(result.merged_entities, 0);
    }

    fn near_pair() -> BuildGraphCommand {
        BuildGraphCommand::new("p")
            .with_entity(ExtractedEntity::new("abcd", "PRODUCT"))
            .with_entity(ExtractedEntity::new("abce", "PRODUCT"))
    }

    #[tokio::test]
    async fn test_default_threshold_keeps_near_pair() {
        let store = InMemoryGraphStore::new();
        let result = GraphBuilder::default().build(&near_pair(), &store).await;
        assert_eq!(result.created_entities, 2);
        assert_eq!(result.merged_entities, 0);
    }

    #[tokio::test]
    async fn test_configured_threshold_merges_near_pair() {
        let store = InMemoryGraphStore::new();
        let config = BuilderConfig {
            duplicate_threshold: 0.5,
            merge_duplicates: true,
        };
        let command = near_pair().with_config(&config);
        assert_eq!(command.duplicate_threshold, 0.5);

        let result = GraphBuilder::default().build(&command, &store).await;
        assert_eq!(result.created_entities, 1);
        assert_eq!(result.merged_entities, 1);
    }

    #[tokio::test]
    async fn test_config_can_disable_dedupe() {
        let store = InMemoryGraphStore::new();
        let config = BuilderConfig {
            merge_duplicates: false,
            ..BuilderConfig::default()
        };
        let command = BuildGraphCommand::new("p")
            .with_entity(ExtractedEntity::new("Acme", "ENTERPRISE"))
            .with_entity(ExtractedEntity::new("Acme", "ENTERPRISE"))
            .with_config(&config);

        let result = GraphBuilder::default().build(&command, &store).await;
        assert_eq!(result.created_entities, 2);
    }

    #[tokio::test]
    async fn test_type_labels_parse_case_insensitively() {
        let store = InMemoryGraphStore::new();
        let command = BuildGraphCommand::new("p")
            .with_entity(ExtractedEntity::new("李四先生", "person"))
            .with_entity(ExtractedEntity::new("华夏", "Enterprise"))
            .with_relation(ExtractedRelation::new("李四", "华夏", "controls"));

        let result = GraphBuilder::default().build(&command, &store).await;
        assert_eq!(result.created_relations, 1);

        let entities = store.list_entities("p", None).await.unwrap();
        assert_eq!(entities[0].entity_type, EntityType::Person);
        assert_eq!(entities[0].external_id, "李四");
        assert_eq!(entities[0].labels, vec!["person"]);
        let relations = store.list_relations("p", None).await.unwrap();
        assert_eq!(relations[0].relation_type, RelationType::Controls);
    }
}

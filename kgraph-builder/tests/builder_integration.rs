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

//! Integration tests for building and merging

use kgraph_builder::{
    BuildGraphCommand, EntityMergeService, ExtractedEntity, ExtractedRelation, GraphBuilder,
    MergeCommand, MergeStrategy, SimilarityScorer,
};
use kgraph_core::{Entity, EntityType, GraphStore, InMemoryGraphStore, Relation, RelationType, SimilarityMode};
use serde_json::json;
use std::sync::Arc;

/// A mention differing only by trailing whitespace is merged, not created
#[tokio::test]
async fn test_trailing_space_duplicate_merged() {
    let store = InMemoryGraphStore::new();
    let command = BuildGraphCommand::new("p")
        .with_entity(ExtractedEntity::new("阿里巴巴", "ENTERPRISE"))
        .with_entity(ExtractedEntity::new("阿里巴巴 ", "ENTERPRISE"));

    let result = GraphBuilder::default().build(&command, &store).await;

    assert!(result.success);
    assert_eq!(result.created_entities, 1);
    assert_eq!(result.merged_entities, 1);
    assert_eq!(store.entity_count(), 1);
    let entities = store.list_entities("p", None).await.unwrap();
    assert_eq!(entities[0].external_id, "阿里巴巴");
}

/// Person honorifics collapse onto the bare name, and relations between
/// built entities land in the store
#[tokio::test]
async fn test_build_people_and_companies() {
    let store = InMemoryGraphStore::new();
    let command = BuildGraphCommand::new("p")
        .with_entity(ExtractedEntity::new("张三", "PERSON"))
        .with_entity(ExtractedEntity::new("张三先生", "PERSON"))
        .with_entity(ExtractedEntity::new("华夏科技有限公司", "ENTERPRISE"))
        .with_relation(ExtractedRelation::new("张三", "华夏科技有限公司", "CONTROLS"));

    let result = GraphBuilder::default().build(&command, &store).await;

    assert_eq!(result.created_entities, 2);
    assert_eq!(result.merged_entities, 1);
    assert_eq!(result.created_relations, 1);
    assert!(!result.is_partial());

    let relations = store.list_relations("p", Some(RelationType::Controls)).await.unwrap();
    assert_eq!(relations.len(), 1);
}

/// Jaccard scoring is selectable per builder
#[tokio::test]
async fn test_jaccard_builder_dedupes_anagrams() {
    let store = InMemoryGraphStore::new();
    let command = BuildGraphCommand::new("p")
        .with_entity(ExtractedEntity::new("abcd", "PRODUCT"))
        .with_entity(ExtractedEntity::new("dcba", "PRODUCT"));

    let builder = GraphBuilder::new(SimilarityScorer::new(SimilarityMode::Jaccard));
    let result = builder.build(&command, &store).await;
    assert_eq!(result.merged_entities, 1);
}

/// Retrying a completed merge fails on the missing source and leaves the
/// target untouched
#[tokio::test]
async fn test_merge_retry_not_found() {
    let store = Arc::new(InMemoryGraphStore::new());
    for id in ["T", "S", "X"] {
        store
            .merge_entity(&Entity::new("p", id, EntityType::Enterprise).with_id(id))
            .await
            .unwrap();
    }
    let rel = Relation::new("p", "S", "X", RelationType::Supplies).unwrap().with_id("r1");
    store.merge_relation(&rel).await.unwrap();

    let service = EntityMergeService::new(store.clone());
    let command = MergeCommand::new("p", "T", vec!["S".into()]);
    let first = service.merge(&command).await;
    assert!(first.success());
    assert!(!first.is_partial());

    let before = store.get_entity("p", "T").await.unwrap().unwrap();
    let second = service.merge(&command).await;
    assert!(!second.success());
    assert!(second.error().unwrap().is_not_found());
    assert!(second.error().unwrap().to_string().contains('S'));

    let after = store.get_entity("p", "T").await.unwrap().unwrap();
    assert_eq!(before, after);
    assert_eq!(store.relations_of("p", "T").await.unwrap().len(), 1);
}

async fn seed_merge_store(sources: Vec<(&str, Vec<(&str, serde_json::Value)>)>) -> Arc<InMemoryGraphStore> {
    let store = Arc::new(InMemoryGraphStore::new());
    store
        .merge_entity(
            &Entity::new("p", "T", EntityType::Enterprise)
                .with_id("T")
                .with_property("city", json!("北京")),
        )
        .await
        .unwrap();
    store
        .merge_entity(&Entity::new("p", "X", EntityType::Enterprise).with_id("X"))
        .await
        .unwrap();
    for (id, props) in sources {
        let mut entity = Entity::new("p", id, EntityType::Enterprise).with_id(id);
        for (key, value) in props {
            entity = entity.with_property(key, value);
        }
        store.merge_entity(&entity).await.unwrap();
        let rel = Relation::new("p", id, "X", RelationType::Supplies)
            .unwrap()
            .with_id(format!("{id}->X"));
        store.merge_relation(&rel).await.unwrap();
    }
    store
}

/// A source that cannot be deleted is reported while the later sources are
/// still deleted
#[tokio::test]
async fn test_failed_delete_does_not_stop_later_sources() {
    let store = seed_merge_store(vec![("S1", vec![]), ("S2", vec![])]).await;
    store.fail_deletes_for(["S1"]);

    let service = EntityMergeService::new(store.clone());
    let outcome = service
        .merge(&MergeCommand::new("p", "T", vec!["S1".into(), "S2".into()]))
        .await;

    assert!(outcome.success());
    assert!(outcome.is_partial());
    let report = outcome.report().unwrap();
    assert_eq!(report.transferred_relations, 2);
    assert_eq!(report.deleted_entities, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("S1"));

    assert!(store.get_entity("p", "S1").await.unwrap().is_some());
    assert!(store.get_entity("p", "S2").await.unwrap().is_none());
    assert_eq!(store.relations_of("p", "T").await.unwrap().len(), 2);
}

/// merge_all keeps target values, and the first source wins a key that
/// several sources carry
#[tokio::test]
async fn test_merge_all_first_source_wins() {
    let store = seed_merge_store(vec![
        ("S1", vec![("city", json!("上海")), ("sector", json!("energy"))]),
        ("S2", vec![("sector", json!("retail")), ("founded", json!(1999))]),
    ])
    .await;

    let service = EntityMergeService::new(store.clone());
    let command = MergeCommand::new("p", "T", vec!["S1".into(), "S2".into()])
        .with_strategy(MergeStrategy::MergeAll);
    let outcome = service.merge(&command).await;

    assert!(!outcome.is_partial());
    assert!(outcome.report().unwrap().properties_updated);
    let target = store.get_entity("p", "T").await.unwrap().unwrap();
    assert_eq!(target.properties.get("city"), Some(&json!("北京")));
    assert_eq!(target.properties.get("sector"), Some(&json!("energy")));
    assert_eq!(target.properties.get("founded"), Some(&json!(1999)));
    assert_eq!(target.version, 2);
}

/// keep_newest leaves the target's properties as they were
#[tokio::test]
async fn test_keep_newest_keeps_target_properties() {
    let store = seed_merge_store(vec![("S1", vec![("sector", json!("energy"))])]).await;
    let before = store.get_entity("p", "T").await.unwrap().unwrap();

    let service = EntityMergeService::new(store.clone());
    let command = MergeCommand::new("p", "T", vec!["S1".into()])
        .with_strategy(MergeStrategy::KeepNewest);
    let outcome = service.merge(&command).await;

    assert!(outcome.success());
    let report = outcome.report().unwrap();
    assert!(!report.properties_updated);
    assert_eq!(report.deleted_entities, 1);
    let after = store.get_entity("p", "T").await.unwrap().unwrap();
    assert_eq!(after.properties, before.properties);
    assert_eq!(after.version, before.version);
    assert_eq!(store.relations_of("p", "T").await.unwrap().len(), 1);
}

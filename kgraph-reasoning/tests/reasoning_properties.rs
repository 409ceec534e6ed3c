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

//! Integration tests for kgraph-reasoning
//!
//! Run against an in-memory store through the public service surface.

use kgraph_core::{
    Condition, Entity, EntityType, FraudType, GraphStore, InMemoryGraphStore, Operator,
    ReasoningConfig, Relation, RelationType, RiskLevel, Rule, RuleType,
};
use kgraph_reasoning::{
    DrugInteraction, InMemoryKnowledge, ReasoningService, RunFraudDetectionCommand,
    RunHealthcareCheckCommand, RunReasoningCommand, RunRiskPropagationCommand, SymptomDiseaseLink,
};
use serde_json::json;
use std::sync::Arc;

const PROJECT: &str = "itest";

async fn graph(nodes: &[(&str, EntityType)], edges: &[(&str, &str, RelationType)]) -> Arc<InMemoryGraphStore> {
    let store = Arc::new(InMemoryGraphStore::new());
    for (id, kind) in nodes {
        let entity = Entity::new(PROJECT, *id, *kind)
            .with_id(*id)
            .with_property("name", json!(format!("{id} Co")));
        store.merge_entity(&entity).await.unwrap();
    }
    for (i, (a, b, t)) in edges.iter().enumerate() {
        let rel = Relation::new(PROJECT, *a, *b, *t).unwrap().with_id(format!("r{i}"));
        store.merge_relation(&rel).await.unwrap();
    }
    store
}

fn enterprises(ids: &[&'static str]) -> Vec<(&'static str, EntityType)> {
    ids.iter().map(|id| (*id, EntityType::Enterprise)).collect()
}

fn service(store: Arc<InMemoryGraphStore>) -> ReasoningService {
    ReasoningService::new(store, Arc::new(InMemoryKnowledge::new()), ReasoningConfig::default())
}

fn fraud(types: &[&str], targets: &[&str]) -> RunFraudDetectionCommand {
    RunFraudDetectionCommand {
        project_id: PROJECT.into(),
        detection_types: types.iter().map(|s| s.to_string()).collect(),
        target_entity_ids: targets.iter().map(|s| s.to_string()).collect(),
    }
}

/// A guarantee ring of three enterprises is one cycle of length three
#[tokio::test]
async fn test_guarantee_ring_single_cycle() {
    let store = graph(
        &enterprises(&["A", "B", "C"]),
        &[
            ("A", "B", RelationType::Guarantees),
            ("B", "C", RelationType::Guarantees),
            ("C", "A", RelationType::Guarantees),
        ],
    )
    .await;
    let results = service(store)
        .run_fraud_detection(&fraud(&["CIRCULAR_GUARANTEE"], &["A"]))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let found = &results[0];
    assert_eq!(found.fraud_type, FraudType::CircularGuarantee);
    assert_eq!(found.base.details["cycle_count"], 1);
    let cycle = found.base.details["cycles"][0].as_array().unwrap();
    // Closed path lists the start twice
    assert_eq!(cycle.len(), 4);
    let mut members = found.involved_entities.clone();
    members.sort();
    assert_eq!(members, vec!["A", "B", "C"]);
    assert_eq!(found.base.risk_level, Some(RiskLevel::High));
}

/// An open guarantee chain is not a cycle
#[tokio::test]
async fn test_guarantee_chain_not_detected() {
    let store = graph(
        &enterprises(&["A", "B", "C"]),
        &[
            ("A", "B", RelationType::Guarantees),
            ("B", "C", RelationType::Guarantees),
        ],
    )
    .await;
    let results = service(store)
        .run_fraud_detection(&fraud(&["CIRCULAR_GUARANTEE"], &["A", "B", "C"]))
        .await
        .unwrap();
    assert!(results.is_empty());
}

/// Transfers around a ring come back to the start in edge order
#[tokio::test]
async fn test_money_circulation_path() {
    let store = graph(
        &enterprises(&["A", "B", "C"]),
        &[
            ("A", "B", RelationType::TransferredTo),
            ("B", "C", RelationType::TransferredTo),
            ("C", "A", RelationType::TransferredTo),
        ],
    )
    .await;
    let results = service(store)
        .run_fraud_detection(&fraud(&["MONEY_CIRCULATION"], &["A"]))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].base.details["paths"], json!([["A", "B", "C", "A"]]));
    assert_eq!(results[0].base.risk_level, Some(RiskLevel::Critical));
}

/// Reversing one transfer breaks the circulation
#[tokio::test]
async fn test_money_circulation_reversed_edge() {
    let store = graph(
        &enterprises(&["A", "B", "C"]),
        &[
            ("A", "B", RelationType::TransferredTo),
            ("C", "B", RelationType::TransferredTo),
            ("C", "A", RelationType::TransferredTo),
        ],
    )
    .await;
    let results = service(store)
        .run_fraud_detection(&fraud(&["MONEY_CIRCULATION"], &["A", "B", "C"]))
        .await
        .unwrap();
    assert!(results.is_empty());
}

/// Critical risk fades by one level per hop and stops at LOW
#[tokio::test]
async fn test_risk_propagation_decay() {
    let store = graph(
        &enterprises(&["A", "B", "C", "D", "E"]),
        &[
            ("A", "B", RelationType::Controls),
            ("B", "C", RelationType::Controls),
            ("C", "D", RelationType::Controls),
            ("D", "E", RelationType::Controls),
        ],
    )
    .await;
    let result = service(store)
        .run_risk_propagation(&RunRiskPropagationCommand {
            project_id: PROJECT.into(),
            source_entity_id: "A".into(),
            risk_level: "CRITICAL".into(),
            max_depth: None,
        })
        .await
        .unwrap();

    let observed: Vec<(usize, i32)> = result
        .affected_entities
        .iter()
        .map(|a| (a.distance, a.risk_level.priority()))
        .collect();
    assert_eq!(observed, vec![(1, 3), (2, 2), (3, 1)]);
    assert!(result.affected_entities.iter().all(|a| a.entity_id != "E"));
    assert_eq!(result.propagation_paths[2], vec!["A", "B", "C", "D"]);
}

/// A rule matches when any of its conditions matches
#[tokio::test]
async fn test_rule_conditions_are_alternatives() {
    let store = Arc::new(InMemoryGraphStore::new());
    let e1 = Entity::new(PROJECT, "e1", EntityType::Enterprise)
        .with_id("E1")
        .with_property("amount", json!(50));
    store.merge_entity(&e1).await.unwrap();

    let rule = Rule::new(PROJECT, "either", RuleType::Custom)
        .with_condition(Condition::new("entity.properties.amount", Operator::Gt, 100))
        .with_condition(Condition::new("entity.type", Operator::Equals, "ENTERPRISE"));
    let results = service(store)
        .run_rules(&RunReasoningCommand {
            project_id: PROJECT.into(),
            rules: vec![rule],
            target_entity_ids: vec!["E1".into()],
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(results[0].matched);
    assert_eq!(results[0].matched_entities, vec!["E1"]);
}

/// Detection over an unknown entity surfaces as not found
#[tokio::test]
async fn test_unknown_target_not_found() {
    let store = graph(&enterprises(&["A"]), &[]).await;
    let err = service(store)
        .run_fraud_detection(&fraud(&["RELATED_TRANSACTION"], &["ghost"]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

/// Drug pairs, symptom ranking and compliance in one healthcare command
#[test]
fn test_healthcare_check_end_to_end() {
    tokio_test::block_on(async {
        let store = Arc::new(InMemoryGraphStore::new());
        let entities = [
            Entity::new(PROJECT, "patient", EntityType::Person).with_id("P"),
            Entity::new(PROJECT, "warfarin", EntityType::Drug)
                .with_id("D1")
                .with_property("name", json!("warfarin")),
            Entity::new(PROJECT, "aspirin", EntityType::Drug)
                .with_id("D2")
                .with_property("name", json!("aspirin")),
            Entity::new(PROJECT, "fever", EntityType::Symptom)
                .with_id("S1")
                .with_property("name", json!("fever")),
            Entity::new(PROJECT, "flu", EntityType::Disease)
                .with_id("X")
                .with_property("name", json!("flu")),
        ];
        for entity in &entities {
            store.merge_entity(entity).await.unwrap();
        }

        let knowledge = InMemoryKnowledge::new()
            .with_interaction(DrugInteraction {
                drug1: "warfarin".into(),
                drug2: "aspirin".into(),
                interaction_type: "warning".into(),
                severity: "high".into(),
                mechanism: "additive bleeding risk".into(),
                recommendation: "avoid combination".into(),
            })
            .with_symptom_link(
                "fever",
                SymptomDiseaseLink {
                    disease_id: "X".into(),
                    disease_name: "flu".into(),
                    weight: 1.0,
                    total_symptoms: 2,
                },
            );
        let service = ReasoningService::new(store, Arc::new(knowledge), ReasoningConfig::default());

        let report = service
            .run_healthcare_check(&RunHealthcareCheckCommand {
                project_id: PROJECT.into(),
                drug_ids: vec!["D1".into(), "D2".into()],
                symptom_ids: vec!["S1".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(report.drug_interactions.len(), 1);
        assert_eq!(report.drug_interactions[0].severity, "high");
        let symptoms = report.symptom_match.unwrap();
        assert_eq!(symptoms.matched_diseases.len(), 1);
        assert!((symptoms.matched_diseases[0].match_ratio - 0.5).abs() < 1e-9);
        assert!(report.compliance.is_none());
    });
}

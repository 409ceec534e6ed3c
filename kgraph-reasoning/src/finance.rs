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

//! Finance Reasoning Module
//!
//! Fraud pattern detectors and risk propagation. Each operation loads a
//! [`RuleContext`] from the store once, then traverses it in memory.
//!
//! | detector              | edges                    | walk               |
//! |-----------------------|--------------------------|--------------------|
//! | circular guarantee    | GUARANTEES, undirected   | closed paths (DFS) |
//! | money circulation     | TRANSFERRED_TO, forward  | closed paths (DFS) |
//! | related party         | CONTROLS/GUARANTEES      | BFS                |
//! | risk propagation      | CONTROLS/GUARANTEES      | BFS with decay     |
//! | fictitious transaction| none                     | threshold rule     |

use crate::context::RuleContext;
use crate::engine::RuleEngine;
use crate::traversal::{breadth_first, closed_paths, Adjacency, ClosedPath, Direction};
use kgraph_core::{
    AffectedEntity, Condition, Entity, EntityType, FraudDetectionResult, FraudType, GraphStore,
    KgraphError, Operator, ReasoningConfig, RelationType, Result, RiskLevel,
    RiskPropagationResult, Rule, RuleEvaluationResult, RuleType,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Hard cap on money circulation search depth
pub const MAX_CIRCULATION_DEPTH: usize = 5;

pub const CIRCULAR_GUARANTEE_RULE: &str = "circular_guarantee_detection";
pub const MONEY_CIRCULATION_RULE: &str = "money_circulation_detection";
pub const FICTITIOUS_TRANSACTION_RULE: &str = "fictitious_transaction_detection";
pub const RELATED_TRANSACTION_RULE: &str = "related_transaction_detection";

/// Fraud detection and risk propagation over a [`GraphStore`]
pub struct FinanceReasoner {
    store: Arc<dyn GraphStore>,
    engine: RuleEngine,
    config: ReasoningConfig,
}

impl FinanceReasoner {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_config(store, ReasoningConfig::default())
    }

    pub fn with_config(store: Arc<dyn GraphStore>, config: ReasoningConfig) -> Self {
        Self {
            store,
            engine: RuleEngine::new(),
            config,
        }
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    /// Neighborhood of an existing entity. Missing entity is `NotFound`.
    async fn load_context(&self, project_id: &str, entity_id: &str, depth: usize) -> Result<RuleContext> {
        let hood = self.store.find_neighbors(project_id, entity_id, depth).await?;
        if hood.is_empty() {
            return Err(KgraphError::entity_not_found(entity_id));
        }
        Ok(RuleContext::from_neighborhood(project_id, hood))
    }

    /// Guarantee cycles through `entity_id`, GUARANTEES treated as undirected.
    ///
    /// Cycles sharing the same relation set (the two traversal directions of
    /// one ring) are reported once.
    #[tracing::instrument(skip(self))]
    pub async fn detect_circular_guarantee(
        &self,
        project_id: &str,
        entity_id: &str,
        max_depth: usize,
    ) -> Result<Option<FraudDetectionResult>> {
        let ctx = self.load_context(project_id, entity_id, max_depth).await?;
        let adjacency = Adjacency::build(&ctx, Direction::Undirected, |r| {
            r.relation_type == RelationType::Guarantees
        });

        let mut seen = HashSet::new();
        let cycles: Vec<ClosedPath> = closed_paths(&adjacency, entity_id, 2, max_depth)
            .into_iter()
            .filter(|cycle| {
                let mut key = cycle.relations.clone();
                key.sort();
                seen.insert(key)
            })
            .collect();

        if cycles.is_empty() {
            tracing::debug!("No guarantee cycle");
            return Ok(None);
        }

        let count = cycles.len();
        let confidence = (0.4 + 0.3 * count as f64).min(1.0);
        let involved = union_nodes(&cycles);
        let relations = union_relations(&cycles);
        tracing::info!(cycles = count, "Circular guarantee detected");

        let base = RuleEvaluationResult::new(CIRCULAR_GUARANTEE_RULE, "Circular guarantee detection", true)
            .with_entities(involved.clone())
            .with_relations(relations)
            .with_risk(RiskLevel::High)
            .with_message(format!("Detected {count} circular guarantee chain(s)"))
            .with_detail("cycles", paths_value(&cycles))
            .with_detail("cycle_count", count);

        Ok(Some(FraudDetectionResult {
            base,
            fraud_type: FraudType::CircularGuarantee,
            confidence_score: confidence,
            involved_entities: involved,
            suspicious_amount: None,
        }))
    }

    /// Closed TRANSFERRED_TO paths leaving and re-entering `entity_id`,
    /// following edges forward only. `max_depth` is clamped to 5.
    #[tracing::instrument(skip(self))]
    pub async fn detect_money_circulation(
        &self,
        project_id: &str,
        entity_id: &str,
        max_depth: usize,
    ) -> Result<Option<FraudDetectionResult>> {
        let max_depth = max_depth.min(MAX_CIRCULATION_DEPTH);
        let ctx = self.load_context(project_id, entity_id, max_depth).await?;
        let adjacency = Adjacency::build(&ctx, Direction::Forward, |r| {
            r.relation_type == RelationType::TransferredTo
        });

        let mut seen = HashSet::new();
        let paths: Vec<ClosedPath> = closed_paths(&adjacency, entity_id, 2, max_depth)
            .into_iter()
            .filter(|path| seen.insert(path.relations.clone()))
            .collect();

        if paths.is_empty() {
            return Ok(None);
        }

        let count = paths.len();
        let confidence = (0.6 + 0.2 * count as f64).min(1.0);
        let involved = union_nodes(&paths);
        let relations = union_relations(&paths);
        let amount = sum_amounts(
            relations
                .iter()
                .filter_map(|id| ctx.relations().iter().find(|r| &r.id == id))
                .filter_map(|r| r.number("amount")),
        );
        tracing::info!(paths = count, "Money circulation detected");

        let base = RuleEvaluationResult::new(MONEY_CIRCULATION_RULE, "Money circulation detection", true)
            .with_entities(involved.clone())
            .with_relations(relations)
            .with_risk(RiskLevel::Critical)
            .with_message(format!("Detected {count} money circulation path(s)"))
            .with_detail("paths", paths_value(&paths))
            .with_detail("path_count", count);

        Ok(Some(FraudDetectionResult {
            base,
            fraud_type: FraudType::MoneyCirculation,
            confidence_score: confidence,
            involved_entities: involved,
            suspicious_amount: amount,
        }))
    }

    /// The large-transaction screening rule used by
    /// [`FinanceReasoner::detect_fictitious_transaction`]
    pub fn fictitious_transaction_rule(&self, project_id: &str) -> Rule {
        Rule::new(project_id, "Fictitious transaction detection", RuleType::FinanceFraud)
            .with_id(FICTITIOUS_TRANSACTION_RULE)
            .with_description("transaction amount above the large-transaction threshold")
            .with_priority(100)
            .with_condition(Condition::new(
                "entity.properties.amount",
                Operator::Gt,
                self.config.large_transaction_threshold,
            ))
    }

    /// Flag TRANSACTION entities whose amount exceeds the threshold.
    ///
    /// With `entity_ids` only those entities are screened (non-transactions
    /// among them are ignored); otherwise every transaction in the project.
    #[tracing::instrument(skip(self, entity_ids))]
    pub async fn detect_fictitious_transaction(
        &self,
        project_id: &str,
        entity_ids: Option<&[String]>,
    ) -> Result<Vec<FraudDetectionResult>> {
        let transactions: Vec<Entity> = match entity_ids {
            Some(ids) => {
                let mut found = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(entity) = self.store.get_entity(project_id, id).await? {
                        if entity.entity_type == EntityType::Transaction {
                            found.push(entity);
                        }
                    }
                }
                found
            }
            None => {
                self.store
                    .list_entities(project_id, Some(EntityType::Transaction))
                    .await?
            }
        };

        let ctx = RuleContext::build(project_id, transactions, Vec::new(), Default::default());
        let rule = self.fictitious_transaction_rule(project_id);
        let result = self.engine.evaluate_rule(&rule, &ctx)?;
        if !result.matched {
            return Ok(Vec::new());
        }

        let amount = sum_amounts(
            result
                .matched_entities
                .iter()
                .filter_map(|id| ctx.entity(id))
                .filter_map(|e| e.number("amount")),
        );
        let involved = result.matched_entities.clone();
        let count = involved.len();
        tracing::info!(transactions = count, "Large transactions flagged");

        let base = result
            .with_risk(RiskLevel::High)
            .with_message(format!("Detected {count} suspicious large transaction(s)"))
            .with_detail("threshold", self.config.large_transaction_threshold);

        Ok(vec![FraudDetectionResult {
            base,
            fraud_type: FraudType::FictitiousTransaction,
            confidence_score: 0.75,
            involved_entities: involved,
            suspicious_amount: amount,
        }])
    }

    /// Transfers touching entities linked to `entity_id` by control or
    /// guarantee.
    #[tracing::instrument(skip(self))]
    pub async fn detect_related_party_transaction(
        &self,
        project_id: &str,
        entity_id: &str,
    ) -> Result<Option<FraudDetectionResult>> {
        let ctx = self
            .load_context(project_id, entity_id, self.config.context_depth)
            .await?;
        let adjacency = Adjacency::build(&ctx, Direction::Undirected, |r| {
            r.relation_type.propagates_risk()
        });

        let related: Vec<String> = breadth_first(&adjacency, entity_id, |_| true)
            .into_iter()
            .map(|d| d.node.to_string())
            .collect();
        let related_set: HashSet<&str> = related.iter().map(String::as_str).collect();

        let transactions: Vec<String> = ctx
            .relations()
            .iter()
            .filter(|r| r.relation_type == RelationType::TransferredTo)
            .filter(|r| {
                related_set.contains(r.source_id.as_str()) || related_set.contains(r.target_id.as_str())
            })
            .map(|r| r.id.clone())
            .collect();

        if transactions.is_empty() {
            return Ok(None);
        }

        let mut involved = vec![entity_id.to_string()];
        involved.extend(related.iter().cloned());
        let amount = sum_amounts(
            ctx.relations()
                .iter()
                .filter(|r| transactions.contains(&r.id))
                .filter_map(|r| r.number("amount")),
        );
        tracing::info!(transactions = transactions.len(), "Related party transactions detected");

        let base = RuleEvaluationResult::new(RELATED_TRANSACTION_RULE, "Related party transaction detection", true)
            .with_entities(involved.clone())
            .with_relations(transactions.clone())
            .with_risk(RiskLevel::Medium)
            .with_message(format!(
                "Detected {} related party transaction(s)",
                transactions.len()
            ))
            .with_detail("related_entities", related)
            .with_detail("transactions", transactions);

        Ok(Some(FraudDetectionResult {
            base,
            fraud_type: FraudType::RelatedTransaction,
            confidence_score: 0.8,
            involved_entities: involved,
            suspicious_amount: amount,
        }))
    }

    /// Spread `risk_level` from `source_id` over control and guarantee edges.
    ///
    /// Every hop lowers the priority by one. A node is reported once, at the
    /// distance it was first reached. The source always reaches its direct
    /// neighbors; beyond that only nodes still above LOW pass risk on.
    /// `max_depth` defaults to the configured propagation depth.
    #[tracing::instrument(skip(self))]
    pub async fn analyze_risk_propagation(
        &self,
        project_id: &str,
        source_id: &str,
        risk_level: RiskLevel,
        max_depth: Option<usize>,
    ) -> Result<RiskPropagationResult> {
        let max_depth = max_depth.unwrap_or(self.config.propagation_max_depth);
        let ctx = self.load_context(project_id, source_id, max_depth).await?;
        let adjacency = Adjacency::build(&ctx, Direction::Undirected, |r| {
            r.relation_type.propagates_risk()
        });

        let source_priority = risk_level.priority();
        let decayed = |distance: usize| (source_priority - distance as i32).max(1);
        let discoveries = breadth_first(&adjacency, source_id, |distance| {
            distance < max_depth && (distance == 0 || decayed(distance) > 1)
        });

        let mut affected = Vec::with_capacity(discoveries.len());
        let mut paths = Vec::with_capacity(discoveries.len());
        for found in discoveries {
            affected.push(AffectedEntity {
                entity_id: found.node.to_string(),
                entity_name: ctx.entity(found.node).and_then(Entity::name).map(str::to_string),
                distance: found.distance,
                risk_level: RiskLevel::from_priority(decayed(found.distance)),
                relation_type: found.via.relation_type,
            });
            paths.push(found.path.iter().map(|n| n.to_string()).collect());
        }
        tracing::info!(affected = affected.len(), "Risk propagation complete");

        Ok(RiskPropagationResult {
            source_entity: source_id.to_string(),
            risk_level,
            affected_entities: affected,
            propagation_paths: paths,
        })
    }
}

fn union_nodes(paths: &[ClosedPath]) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .flat_map(|p| p.nodes.iter())
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

fn union_relations(paths: &[ClosedPath]) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .flat_map(|p| p.relations.iter())
        .filter(|r| seen.insert(r.as_str()))
        .cloned()
        .collect()
}

fn paths_value(paths: &[ClosedPath]) -> Value {
    Value::from(
        paths
            .iter()
            .map(|p| Value::from(p.nodes.clone()))
            .collect::<Vec<_>>(),
    )
}

/// `None` when no value was present
fn sum_amounts(amounts: impl Iterator<Item = f64>) -> Option<f64> {
    amounts.fold(None, |acc, x| Some(acc.unwrap_or(0.0) + x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_core::{InMemoryGraphStore, Relation};

    async fn store_with(edges: &[(&str, &str, RelationType)]) -> Arc<InMemoryGraphStore> {
        let store = Arc::new(InMemoryGraphStore::new());
        for (a, b, t) in edges {
            for id in [a, b] {
                let entity = Entity::new("p", *id, EntityType::Enterprise)
                    .with_id(*id)
                    .with_property("name", format!("{id} Ltd"));
                store.merge_entity(&entity).await.unwrap();
            }
            let rel = Relation::new("p", *a, *b, *t)
                .unwrap()
                .with_id(format!("{a}->{b}"))
                .with_property("amount", 100);
            store.merge_relation(&rel).await.unwrap();
        }
        store
    }

    fn reasoner(store: Arc<InMemoryGraphStore>) -> FinanceReasoner {
        FinanceReasoner::new(store)
    }

    #[tokio::test]
    async fn test_guarantee_triangle_reported_once() {
        let store = store_with(&[
            ("A", "B", RelationType::Guarantees),
            ("B", "C", RelationType::Guarantees),
            ("C", "A", RelationType::Guarantees),
        ])
        .await;
        let result = reasoner(store)
            .detect_circular_guarantee("p", "A", 5)
            .await
            .unwrap()
            .expect("cycle");
        assert_eq!(result.base.details["cycle_count"], 1);
        let mut involved = result.involved_entities.clone();
        involved.sort();
        assert_eq!(involved, vec!["A", "B", "C"]);
        assert!((result.confidence_score - 0.7).abs() < 1e-9);
        assert_eq!(result.base.risk_level, Some(RiskLevel::High));
    }

    #[tokio::test]
    async fn test_guarantee_chain_has_no_cycle() {
        let store = store_with(&[
            ("A", "B", RelationType::Guarantees),
            ("B", "C", RelationType::Guarantees),
        ])
        .await;
        assert!(reasoner(store)
            .detect_circular_guarantee("p", "A", 5)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_mutual_guarantee_is_a_two_cycle() {
        let store = store_with(&[
            ("A", "B", RelationType::Guarantees),
            ("B", "A", RelationType::Guarantees),
        ])
        .await;
        let result = reasoner(store)
            .detect_circular_guarantee("p", "A", 5)
            .await
            .unwrap()
            .expect("two-cycle");
        assert_eq!(result.base.details["cycle_count"], 1);
    }

    #[tokio::test]
    async fn test_missing_entity_is_not_found() {
        let store = Arc::new(InMemoryGraphStore::new());
        let err = reasoner(store)
            .detect_circular_guarantee("p", "nobody", 5)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_money_circulation_forward_only() {
        let store = store_with(&[
            ("A", "B", RelationType::TransferredTo),
            ("B", "C", RelationType::TransferredTo),
            ("C", "A", RelationType::TransferredTo),
        ])
        .await;
        let result = reasoner(store)
            .detect_money_circulation("p", "A", 5)
            .await
            .unwrap()
            .expect("circulation");
        assert_eq!(
            result.base.details["paths"],
            serde_json::json!([["A", "B", "C", "A"]])
        );
        assert_eq!(result.suspicious_amount, Some(300.0));
        assert!((result.confidence_score - 0.8).abs() < 1e-9);

        let reversed = store_with(&[
            ("A", "B", RelationType::TransferredTo),
            ("C", "B", RelationType::TransferredTo),
            ("C", "A", RelationType::TransferredTo),
        ])
        .await;
        assert!(reasoner(reversed)
            .detect_money_circulation("p", "A", 5)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_parallel_transfers_are_separate_paths() {
        let store = store_with(&[
            ("A", "B", RelationType::TransferredTo),
            ("B", "A", RelationType::TransferredTo),
        ])
        .await;
        let second = Relation::new("p", "B", "A", RelationType::TransferredTo)
            .unwrap()
            .with_id("B->A#2")
            .with_property("amount", 50);
        store.merge_relation(&second).await.unwrap();

        let found = reasoner(store)
            .detect_money_circulation("p", "A", 5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.base.details["path_count"], 2);
        assert!((found.confidence_score - 1.0).abs() < 1e-9);
        assert_eq!(found.suspicious_amount, Some(250.0));
        assert_eq!(found.involved_entities, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_money_circulation_depth_is_clamped() {
        let ids = ["A", "B", "C", "D", "E", "F"];
        let mut edges: Vec<(&str, &str, RelationType)> = ids
            .windows(2)
            .map(|w| (w[0], w[1], RelationType::TransferredTo))
            .collect();
        edges.push(("F", "A", RelationType::TransferredTo));
        let store = store_with(&edges).await;
        // Six hops never fit under the cap of five
        assert!(reasoner(store)
            .detect_money_circulation("p", "A", 10)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_fictitious_transaction() {
        let store = Arc::new(InMemoryGraphStore::new());
        for (id, amount) in [("t1", 5_000_000), ("t2", 10), ("t3", 1_000_001)] {
            let tx = Entity::new("p", id, EntityType::Transaction)
                .with_id(id)
                .with_property("amount", amount);
            store.merge_entity(&tx).await.unwrap();
        }
        let big_company = Entity::new("p", "co", EntityType::Enterprise)
            .with_id("co")
            .with_property("amount", 9_000_000);
        store.merge_entity(&big_company).await.unwrap();

        let results = reasoner(store)
            .detect_fictitious_transaction("p", None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.involved_entities, vec!["t1", "t3"]);
        assert_eq!(result.confidence_score, 0.75);
        assert_eq!(result.suspicious_amount, Some(6_000_001.0));
        assert_eq!(result.base.risk_level, Some(RiskLevel::High));
    }

    #[tokio::test]
    async fn test_related_party_transaction() {
        let store = store_with(&[
            ("A", "B", RelationType::Controls),
            ("C", "B", RelationType::Guarantees),
            ("B", "X", RelationType::TransferredTo),
            ("Y", "Z", RelationType::TransferredTo),
        ])
        .await;
        let result = reasoner(store)
            .detect_related_party_transaction("p", "A")
            .await
            .unwrap()
            .expect("related");
        assert_eq!(result.base.matched_relations, vec!["B->X"]);
        assert_eq!(result.involved_entities, vec!["A", "B", "C"]);
        assert_eq!(result.base.risk_level, Some(RiskLevel::Medium));
    }

    #[tokio::test]
    async fn test_risk_decay_over_chain() {
        let store = store_with(&[
            ("S", "N1", RelationType::Controls),
            ("N1", "N2", RelationType::Controls),
            ("N2", "N3", RelationType::Controls),
            ("N3", "N4", RelationType::Controls),
        ])
        .await;
        let result = reasoner(store)
            .analyze_risk_propagation("p", "S", RiskLevel::Critical, None)
            .await
            .unwrap();
        let got: Vec<_> = result
            .affected_entities
            .iter()
            .map(|a| (a.entity_id.as_str(), a.distance, a.risk_level.priority()))
            .collect();
        assert_eq!(got, vec![("N1", 1, 3), ("N2", 2, 2), ("N3", 3, 1)]);
        assert_eq!(result.propagation_paths[2], vec!["S", "N1", "N2", "N3"]);
        assert_eq!(result.affected_entities[0].entity_name.as_deref(), Some("N1 Ltd"));
    }

    #[tokio::test]
    async fn test_low_source_reaches_direct_neighbors_only() {
        let store = store_with(&[
            ("S", "N1", RelationType::Controls),
            ("N1", "N2", RelationType::Controls),
        ])
        .await;
        let result = reasoner(store)
            .analyze_risk_propagation("p", "S", RiskLevel::Low, None)
            .await
            .unwrap();
        let got: Vec<_> = result
            .affected_entities
            .iter()
            .map(|a| (a.entity_id.as_str(), a.distance, a.risk_level))
            .collect();
        assert_eq!(got, vec![("N1", 1, RiskLevel::Low)]);
        assert_eq!(result.propagation_paths, vec![vec!["S".to_string(), "N1".to_string()]]);
    }
}

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

//! Healthcare Reasoning Module
//!
//! Drug interaction screening, symptom to disease matching and diagnosis
//! compliance checks. Medical facts come from an injected
//! [`MedicalKnowledge`]; patient data comes from the graph store.

use crate::context::RuleContext;
use crate::engine::RuleEngine;
use crate::knowledge::MedicalKnowledge;
use kgraph_core::{
    ComplianceViolation, Condition, DiagnosisComplianceResult, DiseaseMatch,
    DrugInteractionResult, Entity, EntityType, GraphStore, Operator, ReasoningConfig, Result,
    RiskLevel, Rule, RuleEvaluationResult, RuleType, SymptomDiseaseMatchResult, ViolationKind,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const DRUG_INTERACTION_RULE: &str = "drug_interaction_check";
pub const SYMPTOM_MATCH_RULE: &str = "symptom_disease_match";
pub const DIAGNOSIS_COMPLIANCE_RULE: &str = "diagnosis_compliance";

/// Depth of the patient neighborhood loaded for compliance checks
const PATIENT_CONTEXT_DEPTH: usize = 2;

/// Diseases listed in `details.top_diseases`
const TOP_DISEASES: usize = 5;

pub struct HealthcareReasoner {
    store: Arc<dyn GraphStore>,
    knowledge: Arc<dyn MedicalKnowledge>,
    engine: RuleEngine,
    config: ReasoningConfig,
}

impl HealthcareReasoner {
    pub fn new(store: Arc<dyn GraphStore>, knowledge: Arc<dyn MedicalKnowledge>) -> Self {
        Self::with_config(store, knowledge, ReasoningConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn GraphStore>,
        knowledge: Arc<dyn MedicalKnowledge>,
        config: ReasoningConfig,
    ) -> Self {
        Self {
            store,
            knowledge,
            engine: RuleEngine::new(),
            config,
        }
    }

    /// Load entities by id, skipping ids the store does not know
    async fn load_entities(&self, project_id: &str, ids: &[String]) -> Result<Vec<Entity>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get_entity(project_id, id).await? {
                Some(entity) => found.push(entity),
                None => tracing::debug!(entity = %id, "Skipping unknown entity"),
            }
        }
        Ok(found)
    }

    /// Pairwise interaction check over drug entities
    #[tracing::instrument(skip(self, drug_ids), fields(drugs = drug_ids.len()))]
    pub async fn check_drug_interactions(
        &self,
        project_id: &str,
        drug_ids: &[String],
    ) -> Result<Vec<DrugInteractionResult>> {
        let drugs = self.load_entities(project_id, drug_ids).await?;
        self.interactions_among(&drugs).await
    }

    /// One result per known interacting pair `(i, j)`, `i < j`. Unknown pairs
    /// are skipped. Drug names come from the `name` property, else the id.
    pub async fn interactions_among(&self, drugs: &[Entity]) -> Result<Vec<DrugInteractionResult>> {
        let mut results = Vec::new();
        for (i, first) in drugs.iter().enumerate() {
            for second in &drugs[i + 1..] {
                let (name_a, name_b) = (first.display_name(), second.display_name());
                let Some(interaction) = self.knowledge.drug_interaction(name_a, name_b).await? else {
                    continue;
                };

                let details = match serde_json::to_value(&interaction)? {
                    Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                let mut base = RuleEvaluationResult::new(DRUG_INTERACTION_RULE, "Drug interaction check", true)
                    .with_entities(vec![first.id.clone(), second.id.clone()])
                    .with_risk(RiskLevel::from_severity(&interaction.severity))
                    .with_message(format!("Drug interaction detected: {name_a} + {name_b}"));
                base.details = details;

                results.push(DrugInteractionResult {
                    base,
                    drug1: name_a.to_string(),
                    drug2: name_b.to_string(),
                    interaction_type: interaction.interaction_type,
                    severity: interaction.severity,
                    mechanism: interaction.mechanism,
                    recommendation: interaction.recommendation,
                });
            }
        }
        if !results.is_empty() {
            tracing::info!(interactions = results.len(), "Drug interactions found");
        }
        Ok(results)
    }

    /// Rank diseases by how well `symptom_ids` cover their symptom lists.
    ///
    /// `min_match_ratio` defaults to the configured ratio (0.5).
    #[tracing::instrument(skip(self, symptom_ids), fields(symptoms = symptom_ids.len()))]
    pub async fn match_symptoms_to_diseases(
        &self,
        project_id: &str,
        symptom_ids: &[String],
        min_match_ratio: Option<f64>,
    ) -> Result<SymptomDiseaseMatchResult> {
        let threshold = min_match_ratio.unwrap_or(self.config.min_symptom_match_ratio);
        let symptoms = self.load_entities(project_id, symptom_ids).await?;
        let names: Vec<String> = symptoms.iter().map(|s| s.display_name().to_string()).collect();

        struct Tally {
            disease_id: String,
            disease_name: String,
            total: u32,
            weight_sum: f64,
            matched: Vec<String>,
        }

        let mut order: Vec<Tally> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for name in &names {
            for link in self.knowledge.diseases_for_symptom(name).await? {
                let pos = *index.entry(link.disease_id.clone()).or_insert_with(|| {
                    order.push(Tally {
                        disease_id: link.disease_id.clone(),
                        disease_name: link.disease_name.clone(),
                        total: link.total_symptoms,
                        weight_sum: 0.0,
                        matched: Vec::new(),
                    });
                    order.len() - 1
                });
                let tally = &mut order[pos];
                tally.matched.push(name.clone());
                tally.weight_sum += link.weight;
            }
        }

        let mut kept: Vec<DiseaseMatch> = order
            .into_iter()
            .filter(|t| t.total > 0)
            .filter_map(|t| {
                let total = f64::from(t.total);
                let ratio = t.matched.len() as f64 / total;
                (ratio >= threshold).then(|| DiseaseMatch {
                    missing: (t.total as usize).saturating_sub(t.matched.len()),
                    disease_id: t.disease_id,
                    disease_name: t.disease_name,
                    match_ratio: ratio,
                    confidence: (t.weight_sum / total).min(1.0),
                    matched_symptoms: t.matched,
                })
            })
            .collect();
        kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let overall = if kept.is_empty() {
            0.0
        } else {
            kept.iter().map(|d| d.confidence).sum::<f64>() / kept.len() as f64
        };
        let top = serde_json::to_value(&kept[..kept.len().min(TOP_DISEASES)])?;

        let base = RuleEvaluationResult::new(SYMPTOM_MATCH_RULE, "Symptom to disease match", !kept.is_empty())
            .with_entities(symptoms.iter().map(|s| s.id.clone()).collect())
            .with_message(format!("Matched {} candidate disease(s)", kept.len()))
            .with_detail("top_diseases", top);

        Ok(SymptomDiseaseMatchResult {
            base,
            symptoms: names,
            matched_diseases: kept,
            confidence_score: overall,
        })
    }

    /// Check a patient's recorded care against three rules: symptoms present,
    /// no interacting drug pairs, no drug contraindicated for a recorded
    /// disease.
    #[tracing::instrument(skip(self))]
    pub async fn check_diagnosis_compliance(
        &self,
        project_id: &str,
        patient_id: &str,
        diagnosis_id: &str,
    ) -> Result<DiagnosisComplianceResult> {
        let hood = self
            .store
            .find_neighbors(project_id, patient_id, PATIENT_CONTEXT_DEPTH)
            .await?;
        let ctx = RuleContext::from_neighborhood(project_id, hood);

        if !ctx.contains(patient_id) {
            return Ok(DiagnosisComplianceResult {
                base: RuleEvaluationResult::new(DIAGNOSIS_COMPLIANCE_RULE, "Diagnosis compliance check", false)
                    .with_message("Patient not found"),
                compliance_type: "diagnosis".into(),
                violations: Vec::new(),
                recommendations: Vec::new(),
            });
        }

        let mut violations = Vec::new();
        let mut recommendations = Vec::new();

        if ctx.entities_of_type(EntityType::Symptom).next().is_none() {
            violations.push(ComplianceViolation {
                kind: ViolationKind::MissingSymptoms,
                severity: "high".into(),
                message: "Diagnosis is not supported by any recorded symptom".into(),
                entities: vec![patient_id.to_string()],
            });
            recommendations.push("Record the patient's symptoms".to_string());
        }

        let drugs: Vec<Entity> = ctx.entities_of_type(EntityType::Drug).cloned().collect();
        if drugs.len() >= 2 {
            for hit in self.interactions_among(&drugs).await? {
                violations.push(ComplianceViolation {
                    kind: ViolationKind::DrugInteraction,
                    severity: hit.severity.clone(),
                    message: hit.base.message.clone(),
                    entities: hit.base.matched_entities.clone(),
                });
                recommendations.push(format!("Caution: {}", hit.recommendation));
            }
        }

        let diseases: Vec<&Entity> = ctx.entities_of_type(EntityType::Disease).collect();
        for drug in &drugs {
            let drug_name = drug.display_name();
            let mut banned = self.knowledge.contraindications(drug_name).await?;
            banned.extend(property_strings(drug.properties.get("contraindications")));

            for disease in &diseases {
                let Some(disease_name) = disease.name() else {
                    continue;
                };
                if banned.iter().any(|b| b == disease_name) {
                    violations.push(ComplianceViolation {
                        kind: ViolationKind::DrugContraindication,
                        severity: "critical".into(),
                        message: format!("{drug_name} is contraindicated for {disease_name}"),
                        entities: vec![drug.id.clone(), disease.id.clone()],
                    });
                    recommendations.push(format!("Replace the medication treating {disease_name}"));
                }
            }
        }

        let risk = violations
            .iter()
            .map(|v| RiskLevel::from_severity(&v.severity))
            .max()
            .unwrap_or(RiskLevel::Low);
        let count = violations.len();
        if count > 0 {
            tracing::warn!(violations = count, risk = %risk, "Compliance issues found");
        }

        let message = if count > 0 {
            format!("Found {count} compliance issue(s)")
        } else {
            "Diagnosis and treatment are compliant".to_string()
        };
        let base = RuleEvaluationResult::new(DIAGNOSIS_COMPLIANCE_RULE, "Diagnosis compliance check", count > 0)
            .with_entities(vec![patient_id.to_string(), diagnosis_id.to_string()])
            .with_risk(risk)
            .with_message(message)
            .with_detail("violation_count", count);

        Ok(DiagnosisComplianceResult {
            base,
            compliance_type: "diagnosis".into(),
            violations,
            recommendations,
        })
    }

    /// Built-in screening rules for drug entities
    pub fn builtin_rules(project_id: &str) -> Vec<Rule> {
        vec![
            Rule::new(project_id, "Prescription drug screen", RuleType::HealthcareDrug)
                .with_id("drug_indication_check")
                .with_description("drugs that require a prescription")
                .with_priority(90)
                .with_condition(Condition::new("entity.type", Operator::Equals, "DRUG"))
                .with_condition(Condition::new(
                    "entity.properties.requires_prescription",
                    Operator::Equals,
                    true,
                )),
            Rule::new(project_id, "Duplicate drug screen", RuleType::HealthcareDrug)
                .with_id("duplicate_drug_check")
                .with_description("drugs recorded for the patient")
                .with_priority(85)
                .with_condition(Condition::new("entity.type", Operator::Equals, "DRUG")),
        ]
    }

    /// Run [`HealthcareReasoner::builtin_rules`] over `ctx`, returning only
    /// matched results in priority order
    pub fn run_healthcare_rules(&self, ctx: &RuleContext) -> Result<Vec<RuleEvaluationResult>> {
        let rules = Self::builtin_rules(&ctx.project_id);
        Ok(self
            .engine
            .evaluate_all_rules(&rules, ctx)?
            .into_iter()
            .filter(|r| r.matched)
            .collect())
    }
}

/// A string or an array of strings
fn property_strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

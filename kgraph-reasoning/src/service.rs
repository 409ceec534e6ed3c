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

//! Reasoning service
//!
//! Dispatches reasoning commands to the finance and healthcare reasoners
//! and to the generic rule engine.

use crate::context::RuleContext;
use crate::engine::RuleEngine;
use crate::finance::FinanceReasoner;
use crate::healthcare::HealthcareReasoner;
use crate::knowledge::MedicalKnowledge;
use kgraph_core::{
    DiagnosisComplianceResult, DrugInteractionResult, EntityType, FraudDetectionResult, FraudType,
    GraphStore, KgraphError, Neighborhood, ReasoningConfig, Result, RiskLevel,
    RiskPropagationResult, Rule, RuleEvaluationResult, SymptomDiseaseMatchResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

/// Run fraud detectors over target entities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFraudDetectionCommand {
    pub project_id: String,
    /// Empty runs every detector
    #[serde(default)]
    pub detection_types: Vec<String>,
    /// Empty targets every enterprise and company in the project
    #[serde(default)]
    pub target_entity_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRiskPropagationCommand {
    pub project_id: String,
    pub source_entity_id: String,
    pub risk_level: String,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Healthcare checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthcareCheckType {
    DrugInteraction,
    SymptomMatch,
    DiagnosisCompliance,
}

impl FromStr for HealthcareCheckType {
    type Err = KgraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRUG_INTERACTION" => Ok(HealthcareCheckType::DrugInteraction),
            "SYMPTOM_MATCH" => Ok(HealthcareCheckType::SymptomMatch),
            "DIAGNOSIS_COMPLIANCE" => Ok(HealthcareCheckType::DiagnosisCompliance),
            _ => Err(KgraphError::validation(format!("Unknown check type: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunHealthcareCheckCommand {
    pub project_id: String,
    /// Empty runs every check whose inputs are present
    #[serde(default)]
    pub check_types: Vec<String>,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub diagnosis_id: Option<String>,
    #[serde(default)]
    pub drug_ids: Vec<String>,
    #[serde(default)]
    pub symptom_ids: Vec<String>,
}

/// Combined output of a healthcare command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthcareReport {
    pub drug_interactions: Vec<DrugInteractionResult>,
    pub symptom_match: Option<SymptomDiseaseMatchResult>,
    pub compliance: Option<DiagnosisComplianceResult>,
}

/// Evaluate caller-supplied rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReasoningCommand {
    pub project_id: String,
    pub rules: Vec<Rule>,
    /// Context is the union of these neighborhoods; empty loads the project
    #[serde(default)]
    pub target_entity_ids: Vec<String>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

pub struct ReasoningService {
    store: Arc<dyn GraphStore>,
    finance: FinanceReasoner,
    healthcare: HealthcareReasoner,
    engine: RuleEngine,
    config: ReasoningConfig,
}

impl ReasoningService {
    pub fn new(
        store: Arc<dyn GraphStore>,
        knowledge: Arc<dyn MedicalKnowledge>,
        config: ReasoningConfig,
    ) -> Self {
        Self {
            finance: FinanceReasoner::with_config(store.clone(), config.clone()),
            healthcare: HealthcareReasoner::with_config(store.clone(), knowledge, config.clone()),
            engine: RuleEngine::new(),
            store,
            config,
        }
    }

    pub fn finance(&self) -> &FinanceReasoner {
        &self.finance
    }

    pub fn healthcare(&self) -> &HealthcareReasoner {
        &self.healthcare
    }

    #[tracing::instrument(skip(self, command), fields(project = %command.project_id))]
    pub async fn run_fraud_detection(
        &self,
        command: &RunFraudDetectionCommand,
    ) -> Result<Vec<FraudDetectionResult>> {
        let requested = command
            .detection_types
            .iter()
            .map(|t| t.parse::<FraudType>())
            .collect::<Result<Vec<_>>>()?;
        let wants = |t: FraudType| requested.is_empty() || requested.contains(&t);
        let project = command.project_id.as_str();

        let targets = if command.target_entity_ids.is_empty() {
            let mut ids = Vec::new();
            for kind in [EntityType::Enterprise, EntityType::Company] {
                ids.extend(
                    self.store
                        .list_entities(project, Some(kind))
                        .await?
                        .into_iter()
                        .map(|e| e.id),
                );
            }
            ids
        } else {
            command.target_entity_ids.clone()
        };
        tracing::info!(targets = targets.len(), "Running fraud detection");

        let mut results = Vec::new();
        for entity_id in &targets {
            if wants(FraudType::CircularGuarantee) {
                results.extend(
                    self.finance
                        .detect_circular_guarantee(project, entity_id, self.config.guarantee_max_depth)
                        .await?,
                );
            }
            if wants(FraudType::MoneyCirculation) {
                results.extend(
                    self.finance
                        .detect_money_circulation(project, entity_id, self.config.circulation_max_depth)
                        .await?,
                );
            }
            if wants(FraudType::RelatedTransaction) {
                results.extend(
                    self.finance
                        .detect_related_party_transaction(project, entity_id)
                        .await?,
                );
            }
        }

        if wants(FraudType::FictitiousTransaction) {
            let scope = (!command.target_entity_ids.is_empty())
                .then_some(command.target_entity_ids.as_slice());
            results.extend(self.finance.detect_fictitious_transaction(project, scope).await?);
        }

        tracing::info!(findings = results.len(), "Fraud detection finished");
        Ok(results)
    }

    pub async fn run_risk_propagation(
        &self,
        command: &RunRiskPropagationCommand,
    ) -> Result<RiskPropagationResult> {
        let level = RiskLevel::from_str(&command.risk_level)?;
        self.finance
            .analyze_risk_propagation(
                &command.project_id,
                &command.source_entity_id,
                level,
                command.max_depth,
            )
            .await
    }

    #[tracing::instrument(skip(self, command), fields(project = %command.project_id))]
    pub async fn run_healthcare_check(
        &self,
        command: &RunHealthcareCheckCommand,
    ) -> Result<HealthcareReport> {
        let requested = command
            .check_types
            .iter()
            .map(|t| t.parse::<HealthcareCheckType>())
            .collect::<Result<Vec<_>>>()?;
        let explicit = |t: HealthcareCheckType| requested.contains(&t);
        let project = command.project_id.as_str();
        let mut report = HealthcareReport::default();

        let run_drugs = explicit(HealthcareCheckType::DrugInteraction)
            || (requested.is_empty() && command.drug_ids.len() >= 2);
        if run_drugs {
            report.drug_interactions = self
                .healthcare
                .check_drug_interactions(project, &command.drug_ids)
                .await?;
        }

        let run_symptoms = explicit(HealthcareCheckType::SymptomMatch)
            || (requested.is_empty() && !command.symptom_ids.is_empty());
        if run_symptoms {
            report.symptom_match = Some(
                self.healthcare
                    .match_symptoms_to_diseases(project, &command.symptom_ids, None)
                    .await?,
            );
        }

        let run_compliance = explicit(HealthcareCheckType::DiagnosisCompliance)
            || (requested.is_empty() && command.patient_id.is_some());
        if run_compliance {
            let patient = command
                .patient_id
                .as_deref()
                .ok_or_else(|| KgraphError::validation("patient_id is required for DIAGNOSIS_COMPLIANCE"))?;
            let diagnosis = command.diagnosis_id.as_deref().ok_or_else(|| {
                KgraphError::validation("diagnosis_id is required for DIAGNOSIS_COMPLIANCE")
            })?;
            report.compliance = Some(
                self.healthcare
                    .check_diagnosis_compliance(project, patient, diagnosis)
                    .await?,
            );
        }

        Ok(report)
    }

    /// Evaluate `command.rules` in priority order over the loaded context
    #[tracing::instrument(skip(self, command), fields(project = %command.project_id, rules = command.rules.len()))]
    pub async fn run_rules(&self, command: &RunReasoningCommand) -> Result<Vec<RuleEvaluationResult>> {
        let project = command.project_id.as_str();
        let hood = if command.target_entity_ids.is_empty() {
            Neighborhood {
                entities: self.store.list_entities(project, None).await?,
                relations: self.store.list_relations(project, None).await?,
            }
        } else {
            let mut merged = Neighborhood::default();
            for id in &command.target_entity_ids {
                merged.absorb(
                    self.store
                        .find_neighbors(project, id, self.config.context_depth)
                        .await?,
                );
            }
            merged
        };

        let ctx = RuleContext::build(
            project,
            hood.entities,
            hood.relations,
            command.parameters.clone(),
        );
        self.engine.evaluate_all_rules(&command.rules, &ctx)
    }
}

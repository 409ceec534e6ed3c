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

//! Reasoning result family
//!
//! ```text
//! RuleEvaluationResult
//!   ├── FraudDetectionResult         (fraud type, confidence, amount)
//!   ├── DrugInteractionResult        (pair, severity, recommendation)
//!   ├── SymptomDiseaseMatchResult    (ranked diseases)
//!   └── DiagnosisComplianceResult    (violations)
//! RiskPropagationResult              (stand-alone)
//! ```
//!
//! Domain results embed the base result and serialize it flattened.

use crate::error::{KgraphError, Result};
use crate::model::RelationType;
use crate::risk::RiskLevel;
use crate::rule::Rule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome of evaluating one rule against a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluationResult {
    pub rule_id: String,
    pub rule_name: String,
    pub matched: bool,
    /// Deduplicated, in first-match order
    pub matched_entities: Vec<String>,
    pub matched_relations: Vec<String>,
    pub risk_level: Option<RiskLevel>,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Map<String, Value>,
    pub triggered_at: DateTime<Utc>,
}

impl RuleEvaluationResult {
    pub fn new(rule_id: impl Into<String>, rule_name: impl Into<String>, matched: bool) -> Self {
        Self {
            rule_id: rule_id.into(),
            rule_name: rule_name.into(),
            matched,
            matched_entities: Vec::new(),
            matched_relations: Vec::new(),
            risk_level: None,
            message: String::new(),
            details: serde_json::Map::new(),
            triggered_at: Utc::now(),
        }
    }

    /// Non-matching result for `rule` with an explanatory message
    pub fn no_match(rule: &Rule, message: impl Into<String>) -> Self {
        Self::new(&rule.id, &rule.name, false).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.matched_entities = entities;
        self
    }

    pub fn with_relations(mut self, relations: Vec<String>) -> Self {
        self.matched_relations = relations;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Fraud patterns recognised by the finance module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudType {
    CircularGuarantee,
    FictitiousTransaction,
    MoneyCirculation,
    RelatedTransaction,
}

impl FraudType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudType::CircularGuarantee => "CIRCULAR_GUARANTEE",
            FraudType::FictitiousTransaction => "FICTITIOUS_TRANSACTION",
            FraudType::MoneyCirculation => "MONEY_CIRCULATION",
            FraudType::RelatedTransaction => "RELATED_TRANSACTION",
        }
    }
}

impl std::str::FromStr for FraudType {
    type Err = KgraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CIRCULAR_GUARANTEE" => Ok(FraudType::CircularGuarantee),
            "FICTITIOUS_TRANSACTION" => Ok(FraudType::FictitiousTransaction),
            "MONEY_CIRCULATION" => Ok(FraudType::MoneyCirculation),
            "RELATED_TRANSACTION" => Ok(FraudType::RelatedTransaction),
            _ => Err(KgraphError::validation(format!("Unknown detection type: {s}"))),
        }
    }
}

impl fmt::Display for FraudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudDetectionResult {
    #[serde(flatten)]
    pub base: RuleEvaluationResult,
    pub fraud_type: FraudType,
    /// In `[0, 1]`
    pub confidence_score: f64,
    pub involved_entities: Vec<String>,
    pub suspicious_amount: Option<f64>,
}

/// One node reached by risk propagation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedEntity {
    pub entity_id: String,
    pub entity_name: Option<String>,
    /// Hops from the source
    pub distance: usize,
    pub risk_level: RiskLevel,
    /// Type of the edge the node was first reached through
    pub relation_type: RelationType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPropagationResult {
    pub source_entity: String,
    pub risk_level: RiskLevel,
    pub affected_entities: Vec<AffectedEntity>,
    /// `[source, .., affected]` per affected node, same order
    pub propagation_paths: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugInteractionResult {
    #[serde(flatten)]
    pub base: RuleEvaluationResult,
    pub drug1: String,
    pub drug2: String,
    /// contraindication, warning or caution
    pub interaction_type: String,
    /// high, moderate or low
    pub severity: String,
    pub mechanism: String,
    pub recommendation: String,
}

/// A candidate disease for a symptom set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseMatch {
    pub disease_id: String,
    pub disease_name: String,
    /// matched / total symptoms of the disease
    pub match_ratio: f64,
    pub confidence: f64,
    pub matched_symptoms: Vec<String>,
    /// Symptoms of the disease the patient does not show
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomDiseaseMatchResult {
    #[serde(flatten)]
    pub base: RuleEvaluationResult,
    pub symptoms: Vec<String>,
    /// Sorted by confidence, highest first
    pub matched_diseases: Vec<DiseaseMatch>,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingSymptoms,
    DrugInteraction,
    DrugContraindication,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub kind: ViolationKind,
    /// critical, high, moderate or low
    pub severity: String,
    pub message: String,
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisComplianceResult {
    #[serde(flatten)]
    pub base: RuleEvaluationResult,
    pub compliance_type: String,
    pub violations: Vec<ComplianceViolation>,
    pub recommendations: Vec<String>,
}

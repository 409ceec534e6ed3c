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

//! kgraph core
//!
//! Shared vocabulary for the kgraph workspace: the project-scoped graph model,
//! reasoning rules, the result family, and the [`GraphStore`] port that every
//! analysis goes through.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      kgraph-core                        │
//! ├──────────────┬──────────────┬──────────────┬────────────┤
//! │    model     │     rule     │    result    │   store    │
//! │ Entity       │ Rule         │ RuleEval...  │ GraphStore │
//! │ Relation     │ Condition    │ Fraud...     │ InMemory   │
//! │ RiskLevel    │ Operator     │ RiskProp...  │ Snapshot   │
//! └──────────────┴──────────────┴──────────────┴────────────┘
//!        ▲                ▲                        ▲
//!        │                │                        │
//!  kgraph-builder   kgraph-reasoning          kgraph-cli
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod result;
pub mod risk;
pub mod rule;
pub mod store;

pub use config::{BuilderConfig, KgraphConfig, MergeConfig, ReasoningConfig, SimilarityMode};
pub use error::{KgraphError, Result};
pub use memory::{GraphSnapshot, InMemoryGraphStore};
pub use model::{Entity, EntityType, Properties, Relation, RelationType};
pub use result::{
    AffectedEntity, ComplianceViolation, DiagnosisComplianceResult, DiseaseMatch,
    DrugInteractionResult, FraudDetectionResult, FraudType, RiskPropagationResult,
    RuleEvaluationResult, SymptomDiseaseMatchResult, ViolationKind,
};
pub use risk::RiskLevel;
pub use rule::{Action, Condition, Operator, Rule, RuleType};
pub use store::{GraphStore, Neighborhood};

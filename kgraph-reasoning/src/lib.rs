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

//! kgraph reasoning
//!
//! Rule evaluation and domain reasoning over project-scoped graphs.
//!
//! # Architecture
//!
//! ```text
//!                  ReasoningService
//!        ┌────────────────┼─────────────────┐
//!        ▼                ▼                 ▼
//!  FinanceReasoner  HealthcareReasoner  RuleEngine
//!   guarantees       drug pairs          conditions
//!   circulation      symptom ranking     priority order
//!   propagation      compliance
//!        │                │                 │
//!    traversal     MedicalKnowledge   field / operators
//!        └────────────────┼─────────────────┘
//!                         ▼
//!           RuleContext ◀── GraphStore (kgraph-core)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kgraph_core::{InMemoryGraphStore, ReasoningConfig};
//! use kgraph_reasoning::{InMemoryKnowledge, ReasoningService, RunFraudDetectionCommand};
//!
//! # async fn run() -> kgraph_core::Result<()> {
//! let store = Arc::new(InMemoryGraphStore::new());
//! let service = ReasoningService::new(
//!     store,
//!     Arc::new(InMemoryKnowledge::new()),
//!     ReasoningConfig::default(),
//! );
//! let findings = service
//!     .run_fraud_detection(&RunFraudDetectionCommand {
//!         project_id: "demo".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{} findings", findings.len());
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod engine;
pub mod field;
pub mod finance;
pub mod healthcare;
pub mod knowledge;
pub mod operators;
pub mod service;
pub mod traversal;

pub use context::RuleContext;
pub use engine::{CompiledRule, RuleEngine};
pub use field::{FieldPath, FieldValue, PathTarget};
pub use finance::FinanceReasoner;
pub use healthcare::HealthcareReasoner;
pub use knowledge::{
    DrugInteraction, InMemoryKnowledge, KnowledgeDataset, MedicalKnowledge, SymptomDiseaseLink,
};
pub use operators::CompiledCondition;
pub use service::{
    HealthcareCheckType, HealthcareReport, ReasoningService, RunFraudDetectionCommand,
    RunHealthcareCheckCommand, RunReasoningCommand, RunRiskPropagationCommand,
};

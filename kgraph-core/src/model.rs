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

//! Entity and Relation Types
//!
//! Project-scoped graph nodes and directed, typed edges. Property values are
//! arbitrary JSON so rules can reach into nested objects.

use crate::error::{KgraphError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity and relation property map
pub type Properties = serde_json::Map<String, Value>;

/// Entity types in the knowledge graph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Enterprise,
    Organization,
    Company,
    Person,
    Account,
    Transaction,
    Supplier,
    Drug,
    Disease,
    Symptom,
    Location,
    Date,
    Time,
    Money,
    Percent,
    Product,
    Event,
    Unknown,
}

impl EntityType {
    pub const ALL: [EntityType; 18] = [
        EntityType::Enterprise,
        EntityType::Organization,
        EntityType::Company,
        EntityType::Person,
        EntityType::Account,
        EntityType::Transaction,
        EntityType::Supplier,
        EntityType::Drug,
        EntityType::Disease,
        EntityType::Symptom,
        EntityType::Location,
        EntityType::Date,
        EntityType::Time,
        EntityType::Money,
        EntityType::Percent,
        EntityType::Product,
        EntityType::Event,
        EntityType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Enterprise => "ENTERPRISE",
            EntityType::Organization => "ORGANIZATION",
            EntityType::Company => "COMPANY",
            EntityType::Person => "PERSON",
            EntityType::Account => "ACCOUNT",
            EntityType::Transaction => "TRANSACTION",
            EntityType::Supplier => "SUPPLIER",
            EntityType::Drug => "DRUG",
            EntityType::Disease => "DISEASE",
            EntityType::Symptom => "SYMPTOM",
            EntityType::Location => "LOCATION",
            EntityType::Date => "DATE",
            EntityType::Time => "TIME",
            EntityType::Money => "MONEY",
            EntityType::Percent => "PERCENT",
            EntityType::Product => "PRODUCT",
            EntityType::Event => "EVENT",
            EntityType::Unknown => "UNKNOWN",
        }
    }

    /// Drug, disease and symptom nodes
    pub fn is_healthcare(&self) -> bool {
        matches!(
            self,
            EntityType::Drug | EntityType::Disease | EntityType::Symptom
        )
    }

    pub fn is_financial(&self) -> bool {
        matches!(
            self,
            EntityType::Enterprise
                | EntityType::Company
                | EntityType::Account
                | EntityType::Transaction
                | EntityType::Supplier
                | EntityType::Money
        )
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = KgraphError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| KgraphError::validation(format!("Unknown entity type: {s}")))
    }
}

/// Relation types in the knowledge graph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Shareholding or ownership
    Owns,
    /// Actual control over another entity
    Controls,
    /// Funds moved from source to target
    TransferredTo,
    /// Source guarantees the debts of target
    Guarantees,
    /// Supply chain edge
    Supplies,
}

impl RelationType {
    pub const ALL: [RelationType; 5] = [
        RelationType::Owns,
        RelationType::Controls,
        RelationType::TransferredTo,
        RelationType::Guarantees,
        RelationType::Supplies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Owns => "OWNS",
            RelationType::Controls => "CONTROLS",
            RelationType::TransferredTo => "TRANSFERRED_TO",
            RelationType::Guarantees => "GUARANTEES",
            RelationType::Supplies => "SUPPLIES",
        }
    }

    /// Edges that carry risk and related-party links
    pub fn propagates_risk(&self) -> bool {
        matches!(self, RelationType::Controls | RelationType::Guarantees)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = KgraphError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        RelationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| KgraphError::validation(format!("Unknown relation type: {s}")))
    }
}

/// A node in a project's knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Text the entity was extracted from (normalized)
    pub external_id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
    /// Starts at 1, bumped on every property update
    #[serde(default = "default_version")]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> u64 {
    1
}

impl Entity {
    /// Create a new entity with a random id
    pub fn new(
        project_id: impl Into<String>,
        external_id: impl Into<String>,
        entity_type: EntityType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            external_id: external_id.into(),
            entity_type,
            labels: Vec::new(),
            properties: Properties::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// The `name` property, when it is a string
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_str)
    }

    /// `name` property, falling back to the entity id
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or(&self.id)
    }

    /// Numeric property lookup; numeric strings are accepted
    pub fn number(&self, key: &str) -> Option<f64> {
        property_number(&self.properties, key)
    }

    /// Replace the property map, bumping version and `updated_at`
    pub fn update_properties(&mut self, properties: Properties) {
        self.properties = properties;
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// A directed, typed edge between two entities of the same project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub project_id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    #[serde(default)]
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    /// Create a relation. Self-loops are rejected.
    pub fn new(
        project_id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: RelationType,
    ) -> Result<Self> {
        let source_id = source_id.into();
        let target_id = target_id.into();
        if source_id == target_id {
            return Err(KgraphError::validation(format!(
                "Relation source and target must differ: {source_id}"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            source_id,
            target_id,
            relation_type,
            properties: Properties::new(),
            created_at: Utc::now(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// True when `entity_id` is either endpoint
    pub fn touches(&self, entity_id: &str) -> bool {
        self.source_id == entity_id || self.target_id == entity_id
    }

    /// The endpoint opposite `entity_id`, if it is attached at all
    pub fn other_end(&self, entity_id: &str) -> Option<&str> {
        if self.source_id == entity_id {
            Some(&self.target_id)
        } else if self.target_id == entity_id {
            Some(&self.source_id)
        } else {
            None
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        property_number(&self.properties, key)
    }
}

fn property_number(properties: &Properties, key: &str) -> Option<f64> {
    match properties.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

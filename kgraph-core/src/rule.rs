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

//! Reasoning rules
//!
//! A rule is an ordered list of conditions over a dotted field path
//! (`entity.properties.amount`, `relation.type`, ...). Conditions are
//! OR-combined by the engine. Actions are carried along but never executed.

use crate::error::{KgraphError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Rule categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    FinanceFraud,
    FinanceRisk,
    FinanceAssociation,
    HealthcareDrug,
    HealthcareDiagnosis,
    HealthcareSymptom,
    Custom,
}

/// Comparison operators available to conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Regex,
    Exists,
    NotExists,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::Regex => "regex",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = KgraphError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "contains" => Operator::Contains,
            "regex" => Operator::Regex,
            "exists" => Operator::Exists,
            "not_exists" => Operator::NotExists,
            other => {
                return Err(KgraphError::validation(format!(
                    "Unknown operator: {other}"
                )))
            }
        })
    }
}

/// One field test inside a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path, first segment `entity` or `relation`
    pub field: String,
    pub operator: Operator,
    /// Right-hand side; ignored by `exists`/`not_exists`
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Action attached to a rule (recorded, not executed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

/// A reasoning rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rule_type: RuleType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Higher runs first
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Rule {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>, rule_type: RuleType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            name: name.into(),
            description: String::new(),
            rule_type,
            conditions: Vec::new(),
            actions: Vec::new(),
            priority: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

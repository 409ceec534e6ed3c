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

//! Condition operators
//!
//! [`CompiledCondition`] pairs a [`FieldPath`] with its operator and, for
//! `regex`, the compiled pattern.

use crate::field::{FieldPath, FieldValue};
use kgraph_core::{Condition, KgraphError, Operator, Result};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// A condition ready for repeated evaluation
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub path: FieldPath,
    operator: Operator,
    expected: Value,
    pattern: Option<Regex>,
}

impl CompiledCondition {
    /// Compile a condition. Fails on an invalid `regex` pattern.
    pub fn compile(condition: &Condition) -> Result<Self> {
        let pattern = match condition.operator {
            Operator::Regex => {
                let raw = condition.value.as_str().ok_or_else(|| {
                    KgraphError::validation(format!(
                        "regex condition on {} needs a string pattern",
                        condition.field
                    ))
                })?;
                // Anchored on both ends: full-string match
                let anchored = format!("^(?:{raw})$");
                Some(Regex::new(&anchored).map_err(|e| {
                    KgraphError::validation(format!("invalid regex {raw:?}: {e}"))
                })?)
            }
            _ => None,
        };
        Ok(Self {
            path: FieldPath::compile(&condition.field),
            operator: condition.operator,
            expected: condition.value.clone(),
            pattern,
        })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Apply the operator to a resolved field. A missing field compares as
    /// `null`: it satisfies `not_equals`, `not_in` and `equals null`, and
    /// fails every ordering, `contains` and `regex`.
    pub fn test(&self, actual: &FieldValue<'_>) -> bool {
        match self.operator {
            Operator::Exists => actual.is_present(),
            Operator::NotExists => !actual.is_present(),
            _ => self.test_value(actual.value().unwrap_or(&Value::Null)),
        }
    }

    fn test_value(&self, actual: &Value) -> bool {
        let expected = &self.expected;
        match self.operator {
            Operator::Equals => values_equal(actual, expected),
            Operator::NotEquals => !values_equal(actual, expected),
            Operator::In => is_member(actual, expected),
            Operator::NotIn => !is_member(actual, expected),
            Operator::Gt => compare(actual, expected) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => compare(actual, expected) == Some(Ordering::Less),
            Operator::Lte => matches!(
                compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Contains => match (actual.as_str(), expected.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            Operator::Regex => match (&self.pattern, actual.as_str()) {
                (Some(re), Some(text)) => re.is_match(text),
                _ => false,
            },
            Operator::Exists => !actual.is_null(),
            Operator::NotExists => actual.is_null(),
        }
    }
}

/// JSON equality with numbers compared by value (`1 == 1.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Array right side: membership. Scalar right side: equality.
fn is_member(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(items) => items.iter().any(|item| values_equal(actual, item)),
        scalar => values_equal(actual, scalar),
    }
}

/// Ordering for number/number and string/string pairs; anything else is
/// incomparable, including nulls
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(op: Operator, expected: Value, actual: Value) -> bool {
        let cond = CompiledCondition::compile(&Condition::new("entity.x", op, expected)).unwrap();
        cond.test(&FieldValue::Found(std::borrow::Cow::Owned(actual)))
    }

    #[test]
    fn test_equality_numeric() {
        assert!(check(Operator::Equals, json!(1), json!(1.0)));
        assert!(check(Operator::NotEquals, json!("a"), json!("b")));
    }

    #[test]
    fn test_membership() {
        assert!(check(Operator::In, json!(["DRUG", "DISEASE"]), json!("DRUG")));
        assert!(check(Operator::NotIn, json!(["DRUG"]), json!("SYMPTOM")));
        // Scalar right side falls back to equality
        assert!(check(Operator::In, json!("DRUG"), json!("DRUG")));
    }

    #[test]
    fn test_ordering_requires_comparable() {
        assert!(check(Operator::Gt, json!(1_000_000), json!(2_000_000)));
        assert!(!check(Operator::Gt, json!(1_000_000), json!("2000000")));
        assert!(!check(Operator::Lt, json!(5), json!(null)));
        assert!(check(Operator::Lte, json!("2024-01-01"), json!("2023-12-31")));
        assert!(check(Operator::Gte, json!(3), json!(3)));
    }

    #[test]
    fn test_contains_and_regex() {
        assert!(check(Operator::Contains, json!("shell"), json!("seashells")));
        assert!(!check(Operator::Contains, json!(1), json!("1")));
        assert!(check(Operator::Regex, json!("ACC-\\d+"), json!("ACC-123")));
        // Full match only
        assert!(!check(Operator::Regex, json!("ACC-\\d+"), json!("xACC-123")));
        assert!(!check(Operator::Regex, json!("ACC"), json!("ACC-123")));
    }

    #[test]
    fn test_invalid_regex_is_validation_error() {
        let err = CompiledCondition::compile(&Condition::new("entity.x", Operator::Regex, "(")).unwrap_err();
        assert!(matches!(err, KgraphError::Validation(_)));
    }

    #[test]
    fn test_exists() {
        let cond = CompiledCondition::compile(&Condition::new(
            "entity.x",
            Operator::Exists,
            Value::Null,
        ))
        .unwrap();
        assert!(!cond.test(&FieldValue::Missing));
        assert!(!cond.test(&FieldValue::Found(std::borrow::Cow::Owned(Value::Null))));
        assert!(cond.test(&FieldValue::Found(std::borrow::Cow::Owned(json!(0)))));

        let cond = CompiledCondition::compile(&Condition::new(
            "entity.x",
            Operator::NotExists,
            Value::Null,
        ))
        .unwrap();
        assert!(cond.test(&FieldValue::Missing));
    }

    fn check_missing(op: Operator, expected: Value) -> bool {
        let cond = CompiledCondition::compile(&Condition::new(
            "entity.properties.status",
            op,
            expected,
        ))
        .unwrap();
        cond.test(&FieldValue::Missing)
    }

    #[test]
    fn test_missing_satisfies_not_equals() {
        assert!(check_missing(Operator::NotEquals, json!("closed")));
    }

    #[test]
    fn test_missing_satisfies_not_in() {
        assert!(check_missing(Operator::NotIn, json!(["closed", "frozen"])));
    }

    #[test]
    fn test_missing_equals_null() {
        assert!(check_missing(Operator::Equals, Value::Null));
        assert!(!check_missing(Operator::Equals, json!("closed")));
    }

    #[test]
    fn test_missing_fails_ordering_and_text() {
        assert!(!check_missing(Operator::Gt, json!(0)));
        assert!(!check_missing(Operator::Lte, json!(0)));
        assert!(!check_missing(Operator::In, json!(["closed"])));
        assert!(!check_missing(Operator::Contains, json!("c")));
        assert!(!check_missing(Operator::Regex, json!(".*")));
    }
}

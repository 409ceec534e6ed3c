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

//! Compiled field paths
//!
//! A condition's field string (`entity.properties.address.city`) is parsed
//! once into a [`FieldPath`]. Resolving it against an entity or relation
//! yields [`FieldValue::Found`] or [`FieldValue::Missing`]; no segment is
//! re-parsed per evaluation.

use kgraph_core::{Entity, Relation};
use serde_json::Value;
use std::borrow::Cow;

/// Which context collection a path addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTarget {
    Entity,
    Relation,
    /// Prefix is neither `entity` nor `relation`; matches nothing
    Unsupported,
}

/// Top-level attribute a path starts from
#[derive(Debug, Clone, PartialEq, Eq)]
enum Root {
    Id,
    ProjectId,
    ExternalId,
    SourceId,
    TargetId,
    Type,
    Labels,
    Properties,
    Version,
    CreatedAt,
    UpdatedAt,
    /// Bare key resolved inside `properties` (`entity.name`)
    Property(String),
}

impl Root {
    fn parse(segment: &str) -> Self {
        match segment {
            "id" => Root::Id,
            "project_id" => Root::ProjectId,
            "external_id" => Root::ExternalId,
            "source_id" => Root::SourceId,
            "target_id" => Root::TargetId,
            "type" => Root::Type,
            "labels" => Root::Labels,
            "properties" => Root::Properties,
            "version" => Root::Version,
            "created_at" => Root::CreatedAt,
            "updated_at" => Root::UpdatedAt,
            other => Root::Property(other.to_string()),
        }
    }
}

/// Result of resolving a path
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Found(Cow<'a, Value>),
    Missing,
}

impl<'a> FieldValue<'a> {
    /// Found and not JSON null
    pub fn is_present(&self) -> bool {
        matches!(self, FieldValue::Found(v) if !v.is_null())
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            FieldValue::Found(v) => Some(v.as_ref()),
            FieldValue::Missing => None,
        }
    }

    fn owned(value: Value) -> Self {
        FieldValue::Found(Cow::Owned(value))
    }
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    target: PathTarget,
    root: Option<Root>,
    rest: Vec<String>,
}

impl FieldPath {
    pub fn compile(path: &str) -> Self {
        let mut segments = path.split('.').map(str::trim);
        let target = match segments.next() {
            Some("entity") => PathTarget::Entity,
            Some("relation") => PathTarget::Relation,
            _ => PathTarget::Unsupported,
        };
        let root = segments.next().filter(|s| !s.is_empty()).map(Root::parse);
        let rest = segments.map(str::to_string).collect();
        Self { target, root, rest }
    }

    pub fn target(&self) -> PathTarget {
        self.target
    }

    pub fn resolve_entity<'a>(&self, entity: &'a Entity) -> FieldValue<'a> {
        if self.target != PathTarget::Entity {
            return FieldValue::Missing;
        }
        let Some(root) = &self.root else {
            return FieldValue::Missing;
        };
        let base = match root {
            Root::Id => FieldValue::owned(Value::from(entity.id.as_str())),
            Root::ProjectId => FieldValue::owned(Value::from(entity.project_id.as_str())),
            Root::ExternalId => FieldValue::owned(Value::from(entity.external_id.as_str())),
            Root::Type => FieldValue::owned(Value::from(entity.entity_type.as_str())),
            Root::Labels => FieldValue::owned(Value::from(entity.labels.clone())),
            Root::Version => FieldValue::owned(Value::from(entity.version)),
            Root::CreatedAt => FieldValue::owned(Value::from(entity.created_at.to_rfc3339())),
            Root::UpdatedAt => FieldValue::owned(Value::from(entity.updated_at.to_rfc3339())),
            Root::Properties => return walk_map(&entity.properties, &self.rest),
            Root::Property(key) => {
                return match entity.properties.get(key) {
                    Some(v) => walk(v, &self.rest),
                    None => FieldValue::Missing,
                }
            }
            Root::SourceId | Root::TargetId => FieldValue::Missing,
        };
        descend_owned(base, &self.rest)
    }

    pub fn resolve_relation<'a>(&self, relation: &'a Relation) -> FieldValue<'a> {
        if self.target != PathTarget::Relation {
            return FieldValue::Missing;
        }
        let Some(root) = &self.root else {
            return FieldValue::Missing;
        };
        let base = match root {
            Root::Id => FieldValue::owned(Value::from(relation.id.as_str())),
            Root::ProjectId => FieldValue::owned(Value::from(relation.project_id.as_str())),
            Root::SourceId => FieldValue::owned(Value::from(relation.source_id.as_str())),
            Root::TargetId => FieldValue::owned(Value::from(relation.target_id.as_str())),
            Root::Type => FieldValue::owned(Value::from(relation.relation_type.as_str())),
            Root::CreatedAt => FieldValue::owned(Value::from(relation.created_at.to_rfc3339())),
            Root::Properties => return walk_map(&relation.properties, &self.rest),
            Root::Property(key) => {
                return match relation.properties.get(key) {
                    Some(v) => walk(v, &self.rest),
                    None => FieldValue::Missing,
                }
            }
            Root::ExternalId | Root::Labels | Root::Version | Root::UpdatedAt => {
                FieldValue::Missing
            }
        };
        descend_owned(base, &self.rest)
    }
}

fn walk_map<'a>(map: &'a serde_json::Map<String, Value>, rest: &[String]) -> FieldValue<'a> {
    match rest.split_first() {
        None => FieldValue::Missing,
        Some((head, tail)) => match map.get(head) {
            Some(v) => walk(v, tail),
            None => FieldValue::Missing,
        },
    }
}

fn walk<'a>(mut current: &'a Value, rest: &[String]) -> FieldValue<'a> {
    for segment in rest {
        match current.get(segment.as_str()) {
            Some(next) => current = next,
            None => return FieldValue::Missing,
        }
    }
    FieldValue::Found(Cow::Borrowed(current))
}

/// Scalar roots have no children
fn descend_owned<'a>(base: FieldValue<'a>, rest: &[String]) -> FieldValue<'a> {
    if rest.is_empty() {
        base
    } else {
        FieldValue::Missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_core::{EntityType, RelationType};
    use serde_json::json;

    fn sample() -> Entity {
        Entity::new("p", "Acme", EntityType::Enterprise)
            .with_id("e1")
            .with_property("amount", 42)
            .with_property("address", json!({"city": "Hangzhou"}))
    }

    #[test]
    fn test_nested_property() {
        let entity = sample();
        let path = FieldPath::compile("entity.properties.address.city");
        assert_eq!(path.resolve_entity(&entity).value(), Some(&json!("Hangzhou")));
    }

    #[test]
    fn test_missing_segment() {
        let entity = sample();
        for raw in [
            "entity.properties.address.zip",
            "entity.properties.nope",
            "entity.properties",
            "entity.id.length",
            "entity",
        ] {
            let path = FieldPath::compile(raw);
            assert_eq!(path.resolve_entity(&entity), FieldValue::Missing, "{raw}");
        }
    }

    #[test]
    fn test_struct_fields() {
        let entity = sample();
        assert_eq!(
            FieldPath::compile("entity.type").resolve_entity(&entity).value(),
            Some(&json!("ENTERPRISE"))
        );
        assert_eq!(
            FieldPath::compile("entity.version").resolve_entity(&entity).value(),
            Some(&json!(1))
        );
        assert_eq!(
            FieldPath::compile("entity.amount").resolve_entity(&entity).value(),
            Some(&json!(42))
        );
    }

    #[test]
    fn test_relation_paths() {
        let rel = kgraph_core::Relation::new("p", "a", "b", RelationType::TransferredTo)
            .unwrap()
            .with_property("amount", 10);
        let path = FieldPath::compile("relation.properties.amount");
        assert_eq!(path.resolve_relation(&rel).value(), Some(&json!(10)));
        assert_eq!(
            FieldPath::compile("relation.type").resolve_relation(&rel).value(),
            Some(&json!("TRANSFERRED_TO"))
        );
        // Entity paths never resolve against relations
        assert_eq!(
            FieldPath::compile("entity.id").resolve_relation(&rel),
            FieldValue::Missing
        );
    }

    #[test]
    fn test_unsupported_prefix() {
        let path = FieldPath::compile("node.id");
        assert_eq!(path.target(), PathTarget::Unsupported);
        assert_eq!(path.resolve_entity(&sample()), FieldValue::Missing);
    }

    #[test]
    fn test_null_is_found_but_not_present() {
        let entity = sample().with_property("deleted", Value::Null);
        let value = FieldPath::compile("entity.properties.deleted").resolve_entity(&entity);
        assert!(matches!(value, FieldValue::Found(_)));
        assert!(!value.is_present());
    }
}

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

//! Rule context
//!
//! A per-call, read-only snapshot of part of a project's graph. Entities keep
//! insertion order so every traversal over a context is deterministic.

use kgraph_core::{Entity, EntityType, Neighborhood, Relation};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub project_id: String,
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
    relations: Vec<Relation>,
    relation_ids: HashSet<String>,
    parameters: serde_json::Map<String, Value>,
}

impl RuleContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Context holding exactly the given entities, relations and parameters
    pub fn build(
        project_id: impl Into<String>,
        entities: impl IntoIterator<Item = Entity>,
        relations: impl IntoIterator<Item = Relation>,
        parameters: serde_json::Map<String, Value>,
    ) -> Self {
        let mut ctx = Self::new(project_id);
        for entity in entities {
            ctx.add_entity(entity);
        }
        for relation in relations {
            ctx.add_relation(relation);
        }
        ctx.parameters = parameters;
        ctx
    }

    pub fn from_neighborhood(project_id: impl Into<String>, hood: Neighborhood) -> Self {
        Self::build(
            project_id,
            hood.entities,
            hood.relations,
            serde_json::Map::new(),
        )
    }

    /// Insert or replace by id; replacement keeps the original position
    pub fn add_entity(&mut self, entity: Entity) {
        match self.index.get(&entity.id) {
            Some(&pos) => self.entities[pos] = entity,
            None => {
                self.index.insert(entity.id.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    /// Duplicate relation ids are ignored
    pub fn add_relation(&mut self, relation: Relation) {
        if self.relation_ids.insert(relation.id.clone()) {
            self.relations.push(relation);
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.index.get(id).map(|&pos| &self.entities[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.id.clone()).collect()
    }

    pub fn entities_of_type(&self, entity_type: EntityType) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |e| e.entity_type == entity_type)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relations with `entity_id` at either end
    pub fn entity_relations(&self, entity_id: &str) -> Vec<&Relation> {
        self.relations
            .iter()
            .filter(|r| r.touches(entity_id))
            .collect()
    }

    /// Distinct entities one hop away, in relation order
    pub fn neighbors(&self, entity_id: &str) -> Vec<&Entity> {
        let mut seen = HashSet::new();
        self.relations
            .iter()
            .filter_map(|r| r.other_end(entity_id))
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.entity(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_core::RelationType;

    fn entity(id: &str) -> Entity {
        Entity::new("p", id, EntityType::Person).with_id(id)
    }

    #[test]
    fn test_neighbors_and_relations() {
        let mut ctx = RuleContext::new("p");
        for id in ["a", "b", "c"] {
            ctx.add_entity(entity(id));
        }
        ctx.add_relation(Relation::new("p", "a", "b", RelationType::Controls).unwrap());
        ctx.add_relation(Relation::new("p", "c", "a", RelationType::Guarantees).unwrap());
        ctx.add_relation(Relation::new("p", "b", "a", RelationType::Owns).unwrap());

        assert_eq!(ctx.entity_relations("a").len(), 3);
        let ids: Vec<_> = ctx.neighbors("a").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_replace_keeps_order() {
        let mut ctx = RuleContext::new("p");
        ctx.add_entity(entity("a"));
        ctx.add_entity(entity("b"));
        ctx.add_entity(entity("a").with_property("name", "Alice"));
        assert_eq!(ctx.entity_ids(), vec!["a", "b"]);
        assert_eq!(ctx.entity("a").and_then(Entity::name), Some("Alice"));
    }

    #[test]
    fn test_parameters() {
        let ctx = RuleContext::new("p").with_parameter("threshold", 5);
        assert_eq!(ctx.parameter("threshold"), Some(&Value::from(5)));
        assert!(ctx.parameter("missing").is_none());
    }
}

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

//! Graph Store Port
//!
//! Every reasoning and merge operation reaches the graph through this trait.
//! Implementations own persistence; the core never holds a connection.
//!
//! ```text
//!  ┌────────────┐   find_neighbors    ┌──────────────┐
//!  │ reasoning  │ ──────────────────▶ │              │
//!  └────────────┘                     │  GraphStore  │
//!  ┌────────────┐   merge / delete    │   (trait)    │
//!  │ merge/build│ ──────────────────▶ │              │
//!  └────────────┘                     └──────────────┘
//! ```

use crate::error::Result;
use crate::model::{Entity, EntityType, Relation, RelationType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A bounded subgraph around one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    /// Includes the start entity first when it exists
    pub entities: Vec<Entity>,
    /// Relations whose endpoints are both in `entities`
    pub relations: Vec<Relation>,
}

impl Neighborhood {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Fold another neighborhood in, skipping ids already present
    pub fn absorb(&mut self, other: Neighborhood) {
        for entity in other.entities {
            if !self.entities.iter().any(|e| e.id == entity.id) {
                self.entities.push(entity);
            }
        }
        for relation in other.relations {
            if !self.relations.iter().any(|r| r.id == relation.id) {
                self.relations.push(relation);
            }
        }
    }
}

/// Persistence boundary for project-scoped graphs
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert or replace an entity by id
    async fn merge_entity(&self, entity: &Entity) -> Result<Entity>;

    /// Insert or replace a relation by id
    async fn merge_relation(&self, relation: &Relation) -> Result<Relation>;

    async fn get_entity(&self, project_id: &str, entity_id: &str) -> Result<Option<Entity>>;

    /// Delete an entity and every relation attached to it.
    /// Returns false when the entity did not exist.
    async fn delete_entity(&self, project_id: &str, entity_id: &str) -> Result<bool>;

    async fn delete_relation(&self, project_id: &str, relation_id: &str) -> Result<bool>;

    /// Entities within `depth` hops of `entity_id` (either direction)
    async fn find_neighbors(
        &self,
        project_id: &str,
        entity_id: &str,
        depth: usize,
    ) -> Result<Neighborhood>;

    async fn list_entities(
        &self,
        project_id: &str,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<Entity>>;

    async fn list_relations(
        &self,
        project_id: &str,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<Relation>>;

    /// Relations with `entity_id` as source or target
    async fn relations_of(&self, project_id: &str, entity_id: &str) -> Result<Vec<Relation>>;
}

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

//! In-memory graph store
//!
//! A [`GraphStore`] backed by concurrent maps. Used by the CLI (loaded from a
//! JSON snapshot) and by tests. Listing order is insertion order; replacing
//! an entity keeps its original position.

use crate::error::{KgraphError, Result};
use crate::model::{Entity, EntityType, Relation, RelationType};
use crate::store::{GraphStore, Neighborhood};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Serializable dump of one or more projects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl GraphSnapshot {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    seq: u64,
    value: T,
}

type Key = (String, String);

fn key(project_id: &str, id: &str) -> Key {
    (project_id.to_string(), id.to_string())
}

/// Concurrent in-memory [`GraphStore`]
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    /// (project, entity id) -> entity
    entities: DashMap<Key, Slot<Entity>>,
    /// (project, relation id) -> relation
    relations: DashMap<Key, Slot<Relation>>,
    next_seq: AtomicU64,
    /// Entity ids whose deletion is forced to fail
    failing_deletes: RwLock<HashSet<String>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated from a snapshot
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let store = Self::new();
        store.load_snapshot(snapshot);
        store
    }

    pub fn load_snapshot(&self, snapshot: GraphSnapshot) {
        for entity in snapshot.entities {
            self.put_entity(entity);
        }
        for relation in snapshot.relations {
            self.put_relation(relation);
        }
        tracing::debug!(
            entities = self.entities.len(),
            relations = self.relations.len(),
            "Loaded graph snapshot"
        );
    }

    /// Dump one project
    pub fn snapshot(&self, project_id: &str) -> GraphSnapshot {
        GraphSnapshot {
            entities: self.entities_sorted(project_id, None),
            relations: self.relations_sorted(project_id, None),
        }
    }

    /// Make `delete_entity` fail for these ids
    pub fn fail_deletes_for<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_deletes
            .write()
            .extend(ids.into_iter().map(Into::into));
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn put_entity(&self, entity: Entity) -> Entity {
        let k = key(&entity.project_id, &entity.id);
        let existing = self.entities.get(&k).map(|slot| slot.seq);
        let seq = existing.unwrap_or_else(|| self.seq());
        self.entities.insert(
            k,
            Slot {
                seq,
                value: entity.clone(),
            },
        );
        entity
    }

    fn put_relation(&self, relation: Relation) -> Relation {
        let k = key(&relation.project_id, &relation.id);
        let existing = self.relations.get(&k).map(|slot| slot.seq);
        let seq = existing.unwrap_or_else(|| self.seq());
        self.relations.insert(
            k,
            Slot {
                seq,
                value: relation.clone(),
            },
        );
        relation
    }

    fn entities_sorted(&self, project_id: &str, entity_type: Option<EntityType>) -> Vec<Entity> {
        let mut found: Vec<(u64, Entity)> = self
            .entities
            .iter()
            .filter(|e| e.key().0 == project_id)
            .filter(|e| entity_type.map_or(true, |t| e.value.entity_type == t))
            .map(|e| (e.seq, e.value.clone()))
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, e)| e).collect()
    }

    fn relations_sorted(
        &self,
        project_id: &str,
        relation_type: Option<RelationType>,
    ) -> Vec<Relation> {
        let mut found: Vec<(u64, Relation)> = self
            .relations
            .iter()
            .filter(|r| r.key().0 == project_id)
            .filter(|r| relation_type.map_or(true, |t| r.value.relation_type == t))
            .map(|r| (r.seq, r.value.clone()))
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, r)| r).collect()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn merge_entity(&self, entity: &Entity) -> Result<Entity> {
        Ok(self.put_entity(entity.clone()))
    }

    async fn merge_relation(&self, relation: &Relation) -> Result<Relation> {
        if relation.source_id == relation.target_id {
            return Err(KgraphError::validation(format!(
                "Relation {} is a self-loop",
                relation.id
            )));
        }
        for endpoint in [&relation.source_id, &relation.target_id] {
            if !self
                .entities
                .contains_key(&key(&relation.project_id, endpoint))
            {
                return Err(KgraphError::entity_not_found(endpoint.as_str()));
            }
        }
        Ok(self.put_relation(relation.clone()))
    }

    async fn get_entity(&self, project_id: &str, entity_id: &str) -> Result<Option<Entity>> {
        Ok(self
            .entities
            .get(&key(project_id, entity_id))
            .map(|slot| slot.value.clone()))
    }

    async fn delete_entity(&self, project_id: &str, entity_id: &str) -> Result<bool> {
        if self.failing_deletes.read().contains(entity_id) {
            return Err(KgraphError::Store(format!(
                "delete rejected for entity {entity_id}"
            )));
        }
        if self.entities.remove(&key(project_id, entity_id)).is_none() {
            return Ok(false);
        }
        self.relations
            .retain(|k, slot| k.0 != project_id || !slot.value.touches(entity_id));
        Ok(true)
    }

    async fn delete_relation(&self, project_id: &str, relation_id: &str) -> Result<bool> {
        Ok(self.relations.remove(&key(project_id, relation_id)).is_some())
    }

    async fn find_neighbors(
        &self,
        project_id: &str,
        entity_id: &str,
        depth: usize,
    ) -> Result<Neighborhood> {
        let Some(start) = self.get_entity(project_id, entity_id).await? else {
            return Ok(Neighborhood::default());
        };

        let relations = self.relations_sorted(project_id, None);
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for rel in &relations {
            adjacency
                .entry(rel.source_id.as_str())
                .or_default()
                .push(rel.target_id.as_str());
            adjacency
                .entry(rel.target_id.as_str())
                .or_default()
                .push(rel.source_id.as_str());
        }

        let mut order: Vec<String> = vec![start.id.clone()];
        let mut seen: HashSet<&str> = HashSet::from([entity_id]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(entity_id, 0)]);
        while let Some((node, dist)) = queue.pop_front() {
            if dist >= depth {
                continue;
            }
            for &next in adjacency.get(node).into_iter().flatten() {
                if seen.insert(next) {
                    order.push(next.to_string());
                    queue.push_back((next, dist + 1));
                }
            }
        }

        let members: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut entities = Vec::with_capacity(order.len());
        for id in &order {
            if let Some(slot) = self.entities.get(&key(project_id, id)) {
                entities.push(slot.value.clone());
            }
        }
        let relations = relations
            .iter()
            .filter(|r| {
                members.contains(r.source_id.as_str()) && members.contains(r.target_id.as_str())
            })
            .cloned()
            .collect();

        Ok(Neighborhood {
            entities,
            relations,
        })
    }

    async fn list_entities(
        &self,
        project_id: &str,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<Entity>> {
        Ok(self.entities_sorted(project_id, entity_type))
    }

    async fn list_relations(
        &self,
        project_id: &str,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<Relation>> {
        Ok(self.relations_sorted(project_id, relation_type))
    }

    async fn relations_of(&self, project_id: &str, entity_id: &str) -> Result<Vec<Relation>> {
        Ok(self
            .relations_sorted(project_id, None)
            .into_iter()
            .filter(|r| r.touches(entity_id))
            .collect())
    }
}

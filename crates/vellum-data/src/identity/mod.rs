// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The identity registry: a bidirectional map between live entities and the
//! persistent ids that survive a save/restore cycle.

use std::collections::HashMap;

use uuid::Uuid;
use vellum_core::scene::{EntityHandle, IdentityTag, SceneBackend};

/// Maps persistent ids to live entities and back.
///
/// At most one live entity is bound to an id, and an entity has at most one id.
/// Entries whose entity died are lazily dropped on lookup.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    by_id: HashMap<String, EntityHandle>,
    by_entity: HashMap<EntityHandle, String>,
}

impl IdentityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of an entity, assigning one on first access.
    ///
    /// A tag's explicit persistent id wins, unless another live entity is
    /// already bound to it; otherwise a fresh unique id is generated.
    /// Returns `None` for dead entities.
    pub fn get_or_assign(&mut self, scene: &dyn SceneBackend, entity: EntityHandle) -> Option<String> {
        if !scene.is_alive(entity) {
            return None;
        }
        if let Some(id) = self.by_entity.get(&entity) {
            return Some(id.clone());
        }

        let explicit = scene
            .identity_tag(entity)
            .and_then(|tag| tag.persistent_id)
            .filter(|id| match self.by_id.get(id) {
                Some(owner) => !scene.is_alive(*owner),
                None => true,
            });
        let id = match explicit {
            Some(id) => id,
            None => {
                if let Some(wanted) = scene.identity_tag(entity).and_then(|t| t.persistent_id) {
                    log::warn!(
                        "Persistent id '{}' is already bound to another live entity, generating a new one",
                        wanted
                    );
                }
                Uuid::new_v4().to_string()
            }
        };
        self.bind(entity, id.clone());
        Some(id)
    }

    /// The id bound to an entity, without assigning one.
    pub fn id_of(&self, entity: EntityHandle) -> Option<&str> {
        self.by_entity.get(&entity).map(String::as_str)
    }

    /// The entity bound to an id, without checking that it is still alive.
    pub fn lookup(&self, id: &str) -> Option<EntityHandle> {
        self.by_id.get(id).copied()
    }

    /// The live entity bound to an id.
    ///
    /// Falls back to searching the scene for an entity tagged with that id and
    /// binds it when found.
    pub fn resolve(&mut self, scene: &dyn SceneBackend, id: &str) -> Option<EntityHandle> {
        if let Some(entity) = self.by_id.get(id).copied() {
            if scene.is_alive(entity) {
                return Some(entity);
            }
            self.remove(entity);
        }
        let found = scene.find_entity_by_id(id)?;
        if self.by_entity.get(&found).is_some_and(|bound| bound != id) {
            return None;
        }
        self.bind(found, id.to_string());
        Some(found)
    }

    /// Rebinds an entity to the given id, dropping the previous bindings of
    /// both the entity and the id.
    pub fn set_id(&mut self, entity: EntityHandle, id: impl Into<String>) {
        let id = id.into();
        self.remove(entity);
        if let Some(previous) = self.by_id.remove(&id) {
            self.by_entity.remove(&previous);
        }
        self.bind(entity, id);
    }

    /// Forgets an entity.
    pub fn remove(&mut self, entity: EntityHandle) {
        if let Some(id) = self.by_entity.remove(&entity) {
            self.by_id.remove(&id);
        }
    }

    /// Drops every binding whose entity is no longer alive.
    pub fn prune(&mut self, scene: &dyn SceneBackend) {
        let dead: Vec<EntityHandle> = self
            .by_entity
            .keys()
            .copied()
            .filter(|e| !scene.is_alive(*e))
            .collect();
        for entity in dead {
            self.remove(entity);
        }
    }

    /// Every live tagged entity in discovery order, with its (possibly just
    /// assigned) id and tag.
    pub fn tagged_entities(&mut self, scene: &dyn SceneBackend) -> Vec<(EntityHandle, String, IdentityTag)> {
        let mut out = Vec::new();
        for entity in scene.entities() {
            let Some(tag) = scene.identity_tag(entity) else {
                continue;
            };
            if let Some(id) = self.get_or_assign(scene, entity) {
                out.push((entity, id, tag));
            }
        }
        out
    }

    /// The number of bindings.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn bind(&mut self, entity: EntityHandle, id: String) {
        self.by_id.insert(id.clone(), entity);
        self.by_entity.insert(entity, id);
    }
}

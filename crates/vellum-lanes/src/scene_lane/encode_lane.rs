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

//! The graph encoder: one synchronous pass from a live scene to a [`LevelData`].

use std::collections::{BTreeSet, HashSet};

use vellum_core::{
    lane::{Lane, LaneKind},
    progress::{PhaseProgress, ProgressSink},
    scene::{ComponentId, EntityHandle, SceneBackend},
};
use vellum_data::{AssetStore, IdentityRegistry, LevelData, StoredData, StoredItem};

use super::{is_within, store_capable_descendants, tagged_descendants, ON_SERIALIZING};
use crate::serializer_lane::{EncodeContext, SerializerRegistry};

/// A host callback deciding whether an entity takes part in a snapshot.
pub type StoreFilter = dyn Fn(&dyn SceneBackend, EntityHandle) -> bool + Send + Sync;

/// Narrows what an encode pass stores.
#[derive(Default, Clone, Copy)]
pub struct EncodeOptions<'a> {
    /// Restricts the pass to the entity with this id and its descendants.
    pub scope: Option<&'a str>,
    /// Component types never stored.
    pub ignore_types: Option<&'a HashSet<String>>,
    /// Host veto over individual entities.
    pub filter: Option<&'a StoreFilter>,
}

/// An error that aborts an encode pass.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The requested scope root does not exist.
    #[error("No live entity has the id '{0}'")]
    UnknownScope(String),
}

struct PendingRecord {
    entity_id: String,
    type_name: String,
    class_id: String,
    component: ComponentId,
}

/// Walks a live scene into a [`LevelData`].
///
/// Per-component failures are logged and the component is dropped from the
/// snapshot; they never abort the pass.
pub struct GraphEncoder<'a> {
    serializers: &'a SerializerRegistry,
    assets: &'a AssetStore,
}

impl Lane for GraphEncoder<'_> {
    fn strategy_name(&self) -> &'static str {
        "VL_GRAPH_ENCODE_V1"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Encode
    }
}

impl<'a> GraphEncoder<'a> {
    /// Creates an encoder over the given serializers and asset store.
    pub fn new(serializers: &'a SerializerRegistry, assets: &'a AssetStore) -> Self {
        Self { serializers, assets }
    }

    /// Encodes the scene, or the subtree selected by `options.scope`.
    pub fn encode(
        &self,
        scene: &mut dyn SceneBackend,
        identity: &mut IdentityRegistry,
        options: EncodeOptions<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<LevelData, EncodeError> {
        identity.prune(&*scene);
        let tagged = identity.tagged_entities(&*scene);
        let scope_root = match options.scope {
            Some(id) => Some(
                identity
                    .resolve(&*scene, id)
                    .ok_or_else(|| EncodeError::UnknownScope(id.to_string()))?,
            ),
            None => None,
        };

        let mut manifest = Vec::new();
        let mut pending = Vec::new();

        for (entity, id, tag) in &tagged {
            let entity = *entity;
            if scope_root.is_some_and(|root| !is_within(&*scene, entity, root)) {
                continue;
            }
            if !Self::wants_entity(&*scene, entity, options.filter) {
                log::trace!("Entity '{}' opted out of the snapshot", id);
                continue;
            }

            if tag.stores_data() {
                scene.send_message(entity, ON_SERIALIZING);
            }

            let component_ids = scene.components(entity);
            let components: BTreeSet<String> = component_ids
                .iter()
                .filter_map(|cid| scene.component(*cid))
                .map(|c| c.type_name().to_string())
                .collect();

            let mut item = StoredItem {
                name: id.clone(),
                active: scene.is_active(entity),
                parent_name: scene
                    .parent(entity)
                    .and_then(|parent| identity.id_of(parent))
                    .map(str::to_string),
                class_id: if tag.is_template_root() {
                    tag.class_id.clone()
                } else {
                    String::new()
                },
                game_object_name: scene.name(entity),
                components,
                ..StoredItem::default()
            };

            if tag.is_template_root() {
                // Every tagged entity the template creates, so a fresh instance
                // takes over all of their ids.
                for child in tagged_descendants(&*scene, entity) {
                    if let Some(child_id) = identity.get_or_assign(&*scene, child) {
                        item.child_ids.push(child_id);
                    }
                }
                for child in store_capable_descendants(&*scene, entity) {
                    let class_id = scene
                        .identity_tag(child)
                        .map(|t| t.class_id)
                        .unwrap_or_default();
                    if let Some(child_id) = identity.get_or_assign(&*scene, child) {
                        item.push_child(&class_id, child_id);
                    }
                }
            }
            manifest.push(item);

            if !tag.stores_data() {
                continue;
            }
            for cid in component_ids {
                let Some(component) = scene.component(cid) else {
                    continue;
                };
                let type_name = component.type_name();
                let ignored = options.ignore_types.is_some_and(|set| set.contains(type_name));
                let opted_out = self
                    .serializers
                    .types()
                    .get(type_name)
                    .is_some_and(|info| info.is_do_not_serialize());
                if ignored || opted_out || !component.should_save() || !tag.stores_component(type_name) {
                    continue;
                }
                pending.push(PendingRecord {
                    entity_id: id.clone(),
                    type_name: type_name.to_string(),
                    class_id: tag.class_id.clone(),
                    component: cid,
                });
            }
        }

        // Stable: components of the same type keep their attachment order.
        pending.sort_by(|a, b| (&a.entity_id, &a.type_name).cmp(&(&b.entity_id, &b.type_name)));

        let mut storing = PhaseProgress::new(progress, "Storing");
        let total = pending.len();
        let mut stored_items = Vec::with_capacity(total);
        for (done, record) in pending.into_iter().enumerate() {
            if let Some(data) = self.store_component(&*scene, identity, &record) {
                stored_items.push(StoredData {
                    name: record.entity_id,
                    type_name: record.type_name,
                    class_id: record.class_id,
                    data,
                });
            }
            storing.advance(done + 1, total);
        }
        if total == 0 {
            storing.set(1.0);
        }

        log::debug!(
            "Encoded {} entities and {} component records",
            manifest.len(),
            stored_items.len()
        );
        Ok(LevelData {
            name: scene.loaded_level(),
            stored_object_names: manifest,
            stored_items,
        })
    }

    fn wants_entity(scene: &dyn SceneBackend, entity: EntityHandle, filter: Option<&StoreFilter>) -> bool {
        let decided = scene
            .components(entity)
            .into_iter()
            .filter_map(|cid| scene.component(cid))
            .find_map(|c| c.should_save_whole_object());
        if decided == Some(false) {
            return false;
        }
        filter.map_or(true, |f| f(scene, entity))
    }

    fn store_component(
        &self,
        scene: &dyn SceneBackend,
        identity: &IdentityRegistry,
        record: &PendingRecord,
    ) -> Option<Vec<u8>> {
        let Some(plugin) = self.serializers.resolve(&record.type_name) else {
            log::warn!(
                "No serializer for '{}' on '{}'; the component is not stored",
                record.type_name,
                record.entity_id
            );
            return None;
        };
        let component = scene.component(record.component)?;
        let cx = EncodeContext {
            identity,
            assets: self.assets,
            types: self.serializers.types(),
            serializers: self.serializers,
            entity_id: &record.entity_id,
        };
        match plugin.serialize(component, &cx) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!(
                    "Failed to store '{}' on '{}' with {}: {:#}",
                    record.type_name,
                    record.entity_id,
                    plugin.name(),
                    e
                );
                None
            }
        }
    }
}

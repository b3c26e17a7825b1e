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

//! Groups the contracts describing the live scene the snapshot engine operates on.
//!
//! The engine never owns entities. It reaches the host's scene graph through the
//! narrow [`SceneBackend`] interface, and addresses entities and components with
//! the opaque handles defined here.

mod format;

pub use format::*;

use crate::component::Component;

/// An opaque handle to a live entity, issued by the [`SceneBackend`].
///
/// Handles are only meaningful for the backend that issued them, and only for
/// as long as the entity is alive. Stable, portable identity is the job of the
/// identity registry, not of this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub u64);

/// An opaque handle to a live component, issued by the [`SceneBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

/// The kind of identity marker an entity carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdentityRole {
    /// The entity takes part in the manifest but stores no component data.
    #[default]
    Unique,
    /// The entity's component data is stored, possibly restricted to a list of types.
    StoreInformation,
    /// The entity was instantiated from a template and can be re-instantiated
    /// by its class id. Template roots always store component data.
    TemplateRoot,
}

/// The identity marker attached to an entity by the host.
///
/// Only entities carrying a tag are seen by the snapshot engine. Untagged
/// entities are invisible to it, except as intermediate nodes of a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTag {
    /// What the tag allows the engine to do with the entity.
    pub role: IdentityRole,
    /// The template identity. Meaningful for template roots and for the
    /// store-capable children of a template.
    pub class_id: String,
    /// An explicit, caller-chosen identifier that survives save/restore.
    /// Entities without one get a generated id on first access.
    pub persistent_id: Option<String>,
    /// When `false`, only the types in `stored_components` are stored.
    pub store_all_components: bool,
    /// Fully qualified type names to store when `store_all_components` is off.
    pub stored_components: Vec<String>,
}

impl Default for IdentityTag {
    fn default() -> Self {
        Self {
            role: IdentityRole::Unique,
            class_id: String::new(),
            persistent_id: None,
            store_all_components: true,
            stored_components: Vec::new(),
        }
    }
}

impl IdentityTag {
    /// A plain unique identifier with an explicit persistent id.
    pub fn persistent(id: impl Into<String>) -> Self {
        Self {
            persistent_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// A store-information marker.
    pub fn store() -> Self {
        Self {
            role: IdentityRole::StoreInformation,
            ..Self::default()
        }
    }

    /// A template root marker for the given class id.
    pub fn template(class_id: impl Into<String>) -> Self {
        Self {
            role: IdentityRole::TemplateRoot,
            class_id: class_id.into(),
            ..Self::default()
        }
    }

    /// Sets the persistent id, builder style.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.persistent_id = Some(id.into());
        self
    }

    /// Sets the class id, builder style.
    pub fn with_class(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = class_id.into();
        self
    }

    /// Restricts the stored components to the given type names.
    pub fn storing_only(mut self, types: &[&str]) -> Self {
        self.store_all_components = false;
        self.stored_components = types.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Returns `true` if the engine stores component data for this entity.
    pub fn stores_data(&self) -> bool {
        self.role != IdentityRole::Unique
    }

    /// Returns `true` if the entity is the root of a template instance.
    pub fn is_template_root(&self) -> bool {
        self.role == IdentityRole::TemplateRoot
    }

    /// Returns `true` if a component of the given type should be stored.
    pub fn stores_component(&self, type_name: &str) -> bool {
        self.store_all_components || self.stored_components.iter().any(|t| t == type_name)
    }
}

/// The narrow interface through which the snapshot engine drives the host's scene graph.
///
/// Implementations wrap the host engine's entity/component API. Every method
/// must tolerate stale handles: operations on a dead entity or component are
/// no-ops, and queries on them return empty results.
pub trait SceneBackend {
    /// The identifier of the currently loaded level.
    fn loaded_level(&self) -> String;

    /// Asks the host to load the given level. Completion is observed by the
    /// caller through subsequent ticks; the default does nothing.
    fn load_level(&mut self, _name: &str) {}

    /// All live entities, in a stable discovery order.
    fn entities(&self) -> Vec<EntityHandle>;

    /// Returns `true` while the entity is alive.
    fn is_alive(&self, entity: EntityHandle) -> bool;

    /// Instantiates the template registered under `class_id`.
    fn instantiate(&mut self, class_id: &str) -> Option<EntityHandle>;

    /// Destroys an entity and its whole subtree.
    fn destroy(&mut self, entity: EntityHandle);

    /// The current parent of an entity.
    fn parent(&self, entity: EntityHandle) -> Option<EntityHandle>;

    /// Reparents an entity; `None` makes it a root.
    fn set_parent(&mut self, child: EntityHandle, parent: Option<EntityHandle>);

    /// Direct children of an entity, in order.
    fn children(&self, entity: EntityHandle) -> Vec<EntityHandle>;

    /// Whether the entity is active.
    fn is_active(&self, entity: EntityHandle) -> bool;

    /// Activates or deactivates an entity.
    fn set_active(&mut self, entity: EntityHandle, active: bool);

    /// A display-only name for the entity.
    fn name(&self, entity: EntityHandle) -> String;

    /// The identity marker of the entity, if it has one.
    fn identity_tag(&self, entity: EntityHandle) -> Option<IdentityTag>;

    /// The components attached to an entity, in attachment order.
    fn components(&self, entity: EntityHandle) -> Vec<ComponentId>;

    /// Shared access to a component.
    fn component(&self, id: ComponentId) -> Option<&dyn Component>;

    /// Exclusive access to a component.
    fn component_mut(&mut self, id: ComponentId) -> Option<&mut dyn Component>;

    /// Attaches a default-constructed component of the named type.
    /// Returns `None` when the host refuses.
    fn add_component(&mut self, entity: EntityHandle, type_name: &str) -> Option<ComponentId>;

    /// Detaches and drops a component.
    fn remove_component(&mut self, id: ComponentId);

    /// Finds an entity whose tag carries the given persistent id.
    fn find_entity_by_id(&self, _id: &str) -> Option<EntityHandle> {
        None
    }

    /// Delivers a message to every component of an entity.
    fn send_message(&mut self, entity: EntityHandle, message: &str) {
        for id in self.components(entity) {
            if let Some(component) = self.component_mut(id) {
                component.on_message(message);
            }
        }
    }
}

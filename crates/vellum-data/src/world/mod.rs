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

//! An in-memory scene host.
//!
//! [`SceneWorld`] implements [`SceneBackend`] over plain collections. It is the
//! reference host for tests and tools: templates are registered as trees of
//! [`TemplateNode`], components are default-constructed through the
//! [`TypeRegistry`], and level loads are only recorded.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use vellum_core::{
    scene::{ComponentId, EntityHandle, IdentityRole, IdentityTag, SceneBackend},
    Component,
};

use crate::reflect::TypeRegistry;

/// One node of a template tree.
#[derive(Debug, Clone, Default)]
pub struct TemplateNode {
    /// Display name of the instantiated entity.
    pub name: String,
    /// Identity marker given to the instantiated entity.
    pub tag: Option<IdentityTag>,
    /// Type names of the components to default-construct.
    pub components: Vec<&'static str>,
    /// Child nodes, in order.
    pub children: Vec<TemplateNode>,
}

impl TemplateNode {
    /// Creates an untagged node without components.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the identity marker, builder style.
    pub fn tagged(mut self, tag: IdentityTag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Adds a component type, builder style.
    pub fn with_component(mut self, type_name: &'static str) -> Self {
        self.components.push(type_name);
        self
    }

    /// Adds a child node, builder style.
    pub fn with_child(mut self, child: TemplateNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug)]
struct EntityRecord {
    name: String,
    active: bool,
    parent: Option<EntityHandle>,
    children: Vec<EntityHandle>,
    components: Vec<ComponentId>,
    tag: Option<IdentityTag>,
}

struct ComponentSlot {
    owner: EntityHandle,
    value: Box<dyn Component>,
}

/// The in-memory host scene.
pub struct SceneWorld {
    types: Arc<TypeRegistry>,
    level: String,
    next_entity: u64,
    next_component: u64,
    entities: BTreeMap<EntityHandle, EntityRecord>,
    components: HashMap<ComponentId, ComponentSlot>,
    templates: HashMap<String, TemplateNode>,
    refused: HashSet<String>,
    level_requests: Vec<String>,
}

impl SceneWorld {
    /// Creates an empty scene for the given level.
    pub fn new(level: impl Into<String>, types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            level: level.into(),
            next_entity: 1,
            next_component: 1,
            entities: BTreeMap::new(),
            components: HashMap::new(),
            templates: HashMap::new(),
            refused: HashSet::new(),
            level_requests: Vec::new(),
        }
    }

    /// Spawns a root entity.
    pub fn spawn(&mut self, name: impl Into<String>, tag: Option<IdentityTag>) -> EntityHandle {
        let handle = EntityHandle(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(
            handle,
            EntityRecord {
                name: name.into(),
                active: true,
                parent: None,
                children: Vec::new(),
                components: Vec::new(),
                tag,
            },
        );
        handle
    }

    /// Spawns an entity under a parent.
    pub fn spawn_child(
        &mut self,
        parent: EntityHandle,
        name: impl Into<String>,
        tag: Option<IdentityTag>,
    ) -> EntityHandle {
        let child = self.spawn(name, tag);
        self.set_parent(child, Some(parent));
        child
    }

    /// Attaches an already constructed component.
    pub fn attach<C: Component>(&mut self, entity: EntityHandle, component: C) -> Option<ComponentId> {
        self.attach_boxed(entity, Box::new(component))
    }

    /// The first component of type `C` on an entity.
    pub fn get<C: Component>(&self, entity: EntityHandle) -> Option<&C> {
        self.components_of::<C>(entity).into_iter().next()
    }

    /// Exclusive access to the first component of type `C` on an entity.
    pub fn get_mut<C: Component>(&mut self, entity: EntityHandle) -> Option<&mut C> {
        let id = self.components(entity).into_iter().find(|id| {
            self.components
                .get(id)
                .is_some_and(|slot| slot.value.as_any().is::<C>())
        })?;
        self.components
            .get_mut(&id)?
            .value
            .as_any_mut()
            .downcast_mut::<C>()
    }

    /// Every component of type `C` on an entity, in attachment order.
    pub fn components_of<C: Component>(&self, entity: EntityHandle) -> Vec<&C> {
        let Some(record) = self.entities.get(&entity) else {
            return Vec::new();
        };
        record
            .components
            .iter()
            .filter_map(|id| self.components.get(id))
            .filter_map(|slot| slot.value.as_any().downcast_ref::<C>())
            .collect()
    }

    /// Replaces the identity marker of an entity.
    pub fn set_tag(&mut self, entity: EntityHandle, tag: Option<IdentityTag>) {
        if let Some(record) = self.entities.get_mut(&entity) {
            record.tag = tag;
        }
    }

    /// Registers a template under a class id.
    pub fn register_template(&mut self, class_id: impl Into<String>, template: TemplateNode) {
        self.templates.insert(class_id.into(), template);
    }

    /// Makes `add_component` refuse the given type.
    pub fn refuse_component(&mut self, type_name: impl Into<String>) {
        self.refused.insert(type_name.into());
    }

    /// Levels requested through [`SceneBackend::load_level`], in order.
    pub fn level_requests(&self) -> &[String] {
        &self.level_requests
    }

    /// Finds the first live entity with the given display name.
    pub fn find_by_name(&self, name: &str) -> Option<EntityHandle> {
        self.entities
            .iter()
            .find(|(_, record)| record.name == name)
            .map(|(handle, _)| *handle)
    }

    /// The number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the scene holds no entity.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn attach_boxed(&mut self, entity: EntityHandle, value: Box<dyn Component>) -> Option<ComponentId> {
        let record = self.entities.get_mut(&entity)?;
        let id = ComponentId(self.next_component);
        self.next_component += 1;
        record.components.push(id);
        self.components.insert(id, ComponentSlot { owner: entity, value });
        Some(id)
    }

    fn build(&mut self, node: &TemplateNode, parent: Option<EntityHandle>) -> EntityHandle {
        let entity = self.spawn(node.name.clone(), node.tag.clone());
        if parent.is_some() {
            self.set_parent(entity, parent);
        }
        for type_name in &node.components {
            if self.add_component(entity, type_name).is_none() {
                log::warn!("Template component '{}' could not be constructed", type_name);
            }
        }
        for child in &node.children {
            self.build(child, Some(entity));
        }
        entity
    }
}

impl SceneBackend for SceneWorld {
    fn loaded_level(&self) -> String {
        self.level.clone()
    }

    fn load_level(&mut self, name: &str) {
        self.level_requests.push(name.to_string());
        self.level = name.to_string();
    }

    fn entities(&self) -> Vec<EntityHandle> {
        self.entities.keys().copied().collect()
    }

    fn is_alive(&self, entity: EntityHandle) -> bool {
        self.entities.contains_key(&entity)
    }

    fn instantiate(&mut self, class_id: &str) -> Option<EntityHandle> {
        if class_id.is_empty() {
            return Some(self.spawn("Entity", Some(IdentityTag::store())));
        }
        let template = self.templates.get(class_id)?.clone();
        let root = self.build(&template, None);
        if let Some(record) = self.entities.get_mut(&root) {
            let tag = record.tag.take().unwrap_or_default();
            record.tag = Some(IdentityTag {
                role: IdentityRole::TemplateRoot,
                class_id: class_id.to_string(),
                ..tag
            });
        }
        Some(root)
    }

    fn destroy(&mut self, entity: EntityHandle) {
        let Some(record) = self.entities.remove(&entity) else {
            return;
        };
        if let Some(parent) = record.parent.and_then(|p| self.entities.get_mut(&p)) {
            parent.children.retain(|c| *c != entity);
        }
        for id in record.components {
            self.components.remove(&id);
        }
        for child in record.children {
            self.destroy(child);
        }
    }

    fn parent(&self, entity: EntityHandle) -> Option<EntityHandle> {
        self.entities.get(&entity)?.parent
    }

    fn set_parent(&mut self, child: EntityHandle, parent: Option<EntityHandle>) {
        if !self.entities.contains_key(&child) || parent.is_some_and(|p| !self.entities.contains_key(&p)) {
            return;
        }
        // Refuse cycles: the new parent must not be inside the child's subtree.
        let mut cursor = parent;
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return;
            }
            cursor = self.entities.get(&ancestor).and_then(|r| r.parent);
        }

        let previous = self.entities.get(&child).and_then(|r| r.parent);
        if let Some(old) = previous.and_then(|p| self.entities.get_mut(&p)) {
            old.children.retain(|c| *c != child);
        }
        if let Some(new) = parent.and_then(|p| self.entities.get_mut(&p)) {
            new.children.push(child);
        }
        if let Some(record) = self.entities.get_mut(&child) {
            record.parent = parent;
        }
    }

    fn children(&self, entity: EntityHandle) -> Vec<EntityHandle> {
        self.entities
            .get(&entity)
            .map(|r| r.children.clone())
            .unwrap_or_default()
    }

    fn is_active(&self, entity: EntityHandle) -> bool {
        self.entities.get(&entity).is_some_and(|r| r.active)
    }

    fn set_active(&mut self, entity: EntityHandle, active: bool) {
        if let Some(record) = self.entities.get_mut(&entity) {
            record.active = active;
        }
    }

    fn name(&self, entity: EntityHandle) -> String {
        self.entities
            .get(&entity)
            .map(|r| r.name.clone())
            .unwrap_or_default()
    }

    fn identity_tag(&self, entity: EntityHandle) -> Option<IdentityTag> {
        self.entities.get(&entity)?.tag.clone()
    }

    fn components(&self, entity: EntityHandle) -> Vec<ComponentId> {
        self.entities
            .get(&entity)
            .map(|r| r.components.clone())
            .unwrap_or_default()
    }

    fn component(&self, id: ComponentId) -> Option<&dyn Component> {
        self.components.get(&id).map(|slot| slot.value.as_ref())
    }

    fn component_mut(&mut self, id: ComponentId) -> Option<&mut dyn Component> {
        self.components.get_mut(&id).map(|slot| slot.value.as_mut())
    }

    fn add_component(&mut self, entity: EntityHandle, type_name: &str) -> Option<ComponentId> {
        if self.refused.contains(type_name) {
            return None;
        }
        let value = self.types.get(type_name)?.instantiate()?;
        self.attach_boxed(entity, value)
    }

    fn remove_component(&mut self, id: ComponentId) {
        if let Some(slot) = self.components.remove(&id) {
            if let Some(record) = self.entities.get_mut(&slot.owner) {
                record.components.retain(|c| *c != id);
            }
        }
    }

    fn find_entity_by_id(&self, id: &str) -> Option<EntityHandle> {
        self.entities
            .iter()
            .find(|(_, record)| {
                record
                    .tag
                    .as_ref()
                    .and_then(|t| t.persistent_id.as_deref())
                    .is_some_and(|pid| pid == id)
            })
            .map(|(handle, _)| *handle)
    }
}

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

//! The deferred reference queue.
//!
//! While components are being decoded, references to other entities may point
//! at entities that do not exist yet. Plugins record such references as
//! [`DeferredRef`]s instead of resolving them. Once every entity and component
//! exists, the decoder drains the [`FixupQueue`] in FIFO order, resolving each
//! entry through the [`ResolverTable`] and writing the result to its target.

use std::collections::{HashMap, VecDeque};

use vellum_core::scene::{ComponentId, EntityHandle, SceneBackend};
use vellum_data::{AssetStore, IdentityRegistry, StoredValue, Value};

use crate::serializer_lane::live_value;

/// Selects the resolver of a deferred reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    /// A single entity reference.
    Entity,
    /// A value tree with entity references nested anywhere inside it.
    Graph,
    /// A host-registered resolver.
    Custom(&'static str),
}

/// Where the resolved value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixupTarget {
    /// A reflective field of a live component.
    Field {
        /// The component to write to.
        component: ComponentId,
        /// The field name.
        field: String,
    },
    /// Resolve for side effects only.
    Discard,
}

/// A reference to resolve once the whole graph exists.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredRef {
    /// Which resolver to use.
    pub kind: ResolverKind,
    /// The stored form of the reference.
    pub args: StoredValue,
    /// Where to write the resolved value.
    pub target: FixupTarget,
}

/// The records of a plugin that defers all of its decoding to the fixup phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredGroup {
    /// The owning entity's persistent id.
    pub entity_id: String,
    /// The component type name.
    pub type_name: String,
    /// The data records, in stored order.
    pub records: Vec<Vec<u8>>,
}

/// One entry of the fixup queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Fixup {
    /// Resolve a reference and write it to its target.
    Resolve(DeferredRef),
    /// Decode a group of records whose plugin defers mutation.
    Deserialize(DeferredGroup),
}

/// A FIFO queue of fixups, scoped to one decode.
#[derive(Debug, Default)]
pub struct FixupQueue {
    items: VecDeque<Fixup>,
}

impl FixupQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a deferred reference.
    pub fn push_ref(&mut self, reference: DeferredRef) {
        self.items.push_back(Fixup::Resolve(reference));
    }

    /// Queues a deferred record group.
    pub fn push_group(&mut self, group: DeferredGroup) {
        self.items.push_back(Fixup::Deserialize(group));
    }

    /// Takes the oldest entry.
    pub fn pop(&mut self) -> Option<Fixup> {
        self.items.pop_front()
    }

    /// Inspects the queued entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Fixup> {
        self.items.iter()
    }

    /// Drops every queued entry.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// The number of queued entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A read-only view of the rebuilt graph, handed to resolvers.
pub struct LiveIndex<'a> {
    /// The live scene.
    pub scene: &'a dyn SceneBackend,
    /// The identity registry.
    pub identity: &'a IdentityRegistry,
    /// The asset store.
    pub assets: &'a AssetStore,
}

impl LiveIndex<'_> {
    /// The live entity bound to a persistent id.
    pub fn entity(&self, id: &str) -> Option<EntityHandle> {
        self.identity
            .lookup(id)
            .filter(|entity| self.scene.is_alive(*entity))
            .or_else(|| self.scene.find_entity_by_id(id))
    }
}

/// Turns the stored form of a reference into a live value.
pub type Resolver = fn(&StoredValue, &LiveIndex<'_>) -> Option<Value>;

/// The table of resolvers, keyed by [`ResolverKind`].
pub struct ResolverTable {
    resolvers: HashMap<ResolverKind, Resolver>,
}

impl Default for ResolverTable {
    fn default() -> Self {
        let mut table = Self {
            resolvers: HashMap::new(),
        };
        table.register(ResolverKind::Entity, resolve_entity);
        table.register(ResolverKind::Graph, resolve_graph);
        table
    }
}

impl ResolverTable {
    /// Creates a table with the built-in entity and graph resolvers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a resolver.
    pub fn register(&mut self, kind: ResolverKind, resolver: Resolver) {
        self.resolvers.insert(kind, resolver);
    }

    /// Resolves a reference. Returns `None` when no resolver is registered for
    /// its kind or the resolver gives up.
    pub fn resolve(&self, reference: &DeferredRef, live: &LiveIndex<'_>) -> Option<Value> {
        let Some(resolver) = self.resolvers.get(&reference.kind) else {
            log::warn!("No resolver registered for {:?}", reference.kind);
            return None;
        };
        resolver(&reference.args, live)
    }
}

fn resolve_entity(args: &StoredValue, live: &LiveIndex<'_>) -> Option<Value> {
    match args {
        StoredValue::Entity(None) => Some(Value::Entity(None)),
        StoredValue::Entity(Some(id)) => {
            let found = live.entity(id);
            if found.is_none() {
                log::warn!("Referenced entity '{}' does not exist; leaving the reference null", id);
            }
            Some(Value::Entity(found))
        }
        _ => None,
    }
}

fn resolve_graph(args: &StoredValue, live: &LiveIndex<'_>) -> Option<Value> {
    Some(live_value(args, live.assets, &mut |id| live.entity(id)))
}

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

//! Runtime type descriptors.
//!
//! Rust has no runtime reflection, so every component type the engine may meet
//! is described once, at startup, by a [`TypeInfo`]: its name, its supertypes
//! and capabilities (used to resolve serializers), its serializable fields and
//! a factory to default-construct it. The [`TypeRegistry`] is the single source
//! of truth for these descriptors.

mod value;

pub use value::*;

use std::{collections::HashMap, fmt, sync::Arc};

use vellum_core::Component;

type Getter = Arc<dyn Fn(&dyn Component) -> Option<Value> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Component, Value) -> bool + Send + Sync>;
type Factory = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// Reads and writes one serializable field of a component type.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    get: Getter,
    set: Setter,
}

impl FieldDescriptor {
    /// The field name, as written into snapshots.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reads the field. Returns `None` if the component is not of the described type.
    pub fn get(&self, component: &dyn Component) -> Option<Value> {
        (self.get)(component)
    }

    /// Writes the field. Returns `false` if the component is not of the
    /// described type or the value has the wrong shape.
    pub fn set(&self, component: &mut dyn Component, value: Value) -> bool {
        (self.set)(component, value)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Describes one component or asset type.
#[derive(Clone)]
pub struct TypeInfo {
    name: &'static str,
    supertypes: Vec<&'static str>,
    capabilities: Vec<&'static str>,
    do_not_serialize: bool,
    fields: Vec<FieldDescriptor>,
    factory: Option<Factory>,
}

impl TypeInfo {
    /// Describes a default-constructible component type.
    pub fn component<T: Component + Default>(name: &'static str) -> Self {
        Self {
            factory: Some(Arc::new(|| Box::new(T::default()) as Box<dyn Component>)),
            ..Self::named(name)
        }
    }

    /// Describes a type that the engine can never construct, such as an asset
    /// type or an abstract supertype.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            supertypes: Vec::new(),
            capabilities: Vec::new(),
            do_not_serialize: false,
            fields: Vec::new(),
            factory: None,
        }
    }

    /// Declares a direct supertype. Call in order, nearest first.
    pub fn extends(mut self, supertype: &'static str) -> Self {
        self.supertypes.push(supertype);
        self
    }

    /// Declares a capability (an interface the type implements).
    pub fn implements(mut self, capability: &'static str) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Marks the type as never serializable.
    pub fn do_not_serialize(mut self) -> Self {
        self.do_not_serialize = true;
        self
    }

    /// Declares a serializable field through typed accessors.
    pub fn field<T: Component>(
        mut self,
        name: &'static str,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: impl Fn(&mut T, Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        let getter: Getter = Arc::new(move |c: &dyn Component| c.as_any().downcast_ref::<T>().map(&get));
        let setter: Setter = Arc::new(move |c: &mut dyn Component, v: Value| {
            c.as_any_mut()
                .downcast_mut::<T>()
                .is_some_and(|typed| set(typed, v))
        });
        self.fields.push(FieldDescriptor {
            name,
            get: getter,
            set: setter,
        });
        self
    }

    /// The fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared direct supertypes, nearest first.
    pub fn supertypes(&self) -> &[&'static str] {
        &self.supertypes
    }

    /// The declared capabilities.
    pub fn capabilities(&self) -> &[&'static str] {
        &self.capabilities
    }

    /// Whether the type opted out of serialization.
    pub fn is_do_not_serialize(&self) -> bool {
        self.do_not_serialize
    }

    /// The serializable fields, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks a field up by name.
    pub fn field_named(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Default-constructs an instance, if the type has a factory.
    pub fn instantiate(&self) -> Option<Box<dyn Component>> {
        self.factory.as_ref().map(|make| make())
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("supertypes", &self.supertypes)
            .field("capabilities", &self.capabilities)
            .field("do_not_serialize", &self.do_not_serialize)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// The table of every known type descriptor, keyed by type name.
///
/// Built once at startup and then shared read-only.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: HashMap<&'static str, TypeInfo>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor, replacing any previous one with the same name.
    pub fn register(&mut self, info: TypeInfo) {
        if self.types.insert(info.name, info).is_some() {
            log::debug!("Type descriptor replaced");
        }
    }

    /// Registers a descriptor, builder style.
    pub fn with(mut self, info: TypeInfo) -> Self {
        self.register(info);
        self
    }

    /// Looks a descriptor up by type name.
    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    /// Returns `true` if the type is known.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// The transitive supertypes of a type, nearest first, without duplicates.
    pub fn supertype_chain(&self, name: &str) -> Vec<&'static str> {
        let mut chain: Vec<&'static str> = Vec::new();
        let mut frontier: Vec<&'static str> = match self.types.get(name) {
            Some(info) => info.supertypes.clone(),
            None => return chain,
        };
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for supertype in frontier {
                if chain.contains(&supertype) || supertype == name {
                    continue;
                }
                chain.push(supertype);
                if let Some(info) = self.types.get(supertype) {
                    next.extend(info.supertypes.iter().copied());
                }
            }
            frontier = next;
        }
        chain
    }

    /// Every capability of a type, its own first, then those inherited from
    /// its supertypes in chain order.
    pub fn capabilities_of(&self, name: &str) -> Vec<&'static str> {
        let mut capabilities: Vec<&'static str> = Vec::new();
        let owners = std::iter::once(name).chain(self.supertype_chain(name));
        for owner in owners {
            if let Some(info) = self.types.get(owner) {
                for capability in &info.capabilities {
                    if !capabilities.contains(capability) {
                        capabilities.push(capability);
                    }
                }
            }
        }
        capabilities
    }

    /// The number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

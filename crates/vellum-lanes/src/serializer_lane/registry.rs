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

use std::{collections::HashMap, sync::Arc};

use vellum_data::{Asset, TypeRegistry};

use super::{ReflectiveSerializer, SerializerDeclaration, SerializerPlugin};

/// Registered plugins, keyed by the type name or capability they serve.
pub type PluginTable = HashMap<String, Arc<dyn SerializerPlugin>>;

/// One step of serializer resolution.
pub trait ResolutionStrategy: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Returns the plugin this strategy picks for the type, if any.
    fn resolve(
        &self,
        type_name: &str,
        types: &TypeRegistry,
        plugins: &PluginTable,
    ) -> Option<Arc<dyn SerializerPlugin>>;
}

/// Picks a plugin registered for the exact type name.
pub struct ExactType;

impl ResolutionStrategy for ExactType {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn resolve(&self, type_name: &str, _types: &TypeRegistry, plugins: &PluginTable) -> Option<Arc<dyn SerializerPlugin>> {
        plugins.get(type_name).cloned()
    }
}

/// Picks the plugin of the nearest supertype that has one.
pub struct SupertypeChain;

impl ResolutionStrategy for SupertypeChain {
    fn name(&self) -> &'static str {
        "supertype"
    }

    fn resolve(&self, type_name: &str, types: &TypeRegistry, plugins: &PluginTable) -> Option<Arc<dyn SerializerPlugin>> {
        types
            .supertype_chain(type_name)
            .into_iter()
            .find_map(|supertype| plugins.get(supertype).cloned())
    }
}

/// Picks the plugin of the first capability the type implements.
pub struct CapabilityMatch;

impl ResolutionStrategy for CapabilityMatch {
    fn name(&self) -> &'static str {
        "capability"
    }

    fn resolve(&self, type_name: &str, types: &TypeRegistry, plugins: &PluginTable) -> Option<Arc<dyn SerializerPlugin>> {
        types
            .capabilities_of(type_name)
            .into_iter()
            .find_map(|capability| plugins.get(capability).cloned())
    }
}

/// Resolves the serializer plugin of every component type.
///
/// Resolution is a pure function of the registered plugins and the type
/// registry: custom strategies are tried in order, then the reflective default
/// applies to every known type that did not opt out of serialization.
pub struct SerializerRegistry {
    types: Arc<TypeRegistry>,
    plugins: PluginTable,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    fallback: Arc<dyn SerializerPlugin>,
}

impl SerializerRegistry {
    /// Creates a registry with the built-in strategies and no plugins.
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            plugins: PluginTable::new(),
            strategies: vec![Box::new(ExactType), Box::new(SupertypeChain), Box::new(CapabilityMatch)],
            fallback: Arc::new(ReflectiveSerializer),
        }
    }

    /// Creates a registry and registers every plugin declared with `inventory`.
    pub fn with_declarations(types: Arc<TypeRegistry>) -> Self {
        let mut registry = Self::new(types);
        for declaration in inventory::iter::<SerializerDeclaration> {
            let plugin: Arc<dyn SerializerPlugin> = Arc::from((declaration.build)());
            for target in declaration.serializes {
                registry.register_shared(*target, plugin.clone());
            }
        }
        log::debug!("Serializer registry built with {} declared plugin targets", registry.plugins.len());
        registry
    }

    /// Registers a plugin for a type name or capability.
    pub fn register(&mut self, target: impl Into<String>, plugin: impl SerializerPlugin + 'static) {
        self.register_shared(target, Arc::new(plugin));
    }

    /// Registers an already shared plugin for a type name or capability.
    pub fn register_shared(&mut self, target: impl Into<String>, plugin: Arc<dyn SerializerPlugin>) {
        let target = target.into();
        if let Some(previous) = self.plugins.insert(target.clone(), plugin) {
            log::warn!("Serializer '{}' for '{}' was replaced", previous.name(), target);
        }
    }

    /// Appends a resolution strategy, tried after the built-in ones.
    pub fn push_strategy(&mut self, strategy: Box<dyn ResolutionStrategy>) {
        self.strategies.push(strategy);
    }

    /// The type descriptors the registry resolves against.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// A shared handle to the type descriptors.
    pub fn types_arc(&self) -> Arc<TypeRegistry> {
        self.types.clone()
    }

    /// Resolves a custom plugin only, without the reflective default.
    pub fn resolve_custom(&self, type_name: &str) -> Option<Arc<dyn SerializerPlugin>> {
        self.strategies.iter().find_map(|strategy| {
            let found = strategy.resolve(type_name, &self.types, &self.plugins);
            if found.is_some() {
                log::trace!("'{}' resolved by the {} strategy", type_name, strategy.name());
            }
            found
        })
    }

    /// Resolves the plugin for a type. Returns `None` for unknown types and for
    /// types marked do-not-serialize.
    pub fn resolve(&self, type_name: &str) -> Option<Arc<dyn SerializerPlugin>> {
        if let Some(plugin) = self.resolve_custom(type_name) {
            return Some(plugin);
        }
        match self.types.get(type_name) {
            Some(info) if !info.is_do_not_serialize() => Some(self.fallback.clone()),
            _ => None,
        }
    }

    /// Whether the contents of an asset may be written inline.
    pub fn allows_inline(&self, asset: &Asset) -> bool {
        match self.resolve_custom(&asset.type_name) {
            Some(plugin) => plugin.can_serialize(asset),
            None => !asset.builtin,
        }
    }
}

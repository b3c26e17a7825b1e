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

//! Defines the serializer plugin contract and the registry that picks a plugin
//! for every component type.
//!
//! The core of this module is the [`SerializerPlugin`] trait. A plugin turns one
//! component into an opaque payload and back. The [`SerializerRegistry`] walks
//! an ordered list of resolution strategies (exact type, supertype chain,
//! capability) and falls back to the [`ReflectiveSerializer`], which stores the
//! fields described by the type registry.

mod declarations;
mod reflective;
mod registry;

pub use declarations::{SerializerDeclaration, ASSET_CAPABILITY};
pub use reflective::{live_value, stored_value, ReflectiveSerializer, StoredField};
pub use registry::{CapabilityMatch, ExactType, PluginTable, ResolutionStrategy, SerializerRegistry, SupertypeChain};

use std::any::Any;

use vellum_core::{scene::ComponentId, Component};
use vellum_data::{AssetStore, IdentityRegistry, TypeRegistry};

use crate::fixup_lane::FixupQueue;

/// Everything a plugin may consult while encoding one component.
pub struct EncodeContext<'a> {
    /// Maps referenced entities to their persistent ids.
    pub identity: &'a IdentityRegistry,
    /// Makes registered assets addressable by reference.
    pub assets: &'a AssetStore,
    /// The type descriptors.
    pub types: &'a TypeRegistry,
    /// The registry that resolved this plugin; consulted for nested values.
    pub serializers: &'a SerializerRegistry,
    /// The persistent id of the owning entity.
    pub entity_id: &'a str,
}

/// Everything a plugin may consult while decoding one component.
///
/// Entity references cannot be resolved yet while components are being
/// decoded; plugins push them onto `fixups` instead.
pub struct DecodeContext<'a> {
    /// The identity registry, as rebuilt so far.
    pub identity: &'a IdentityRegistry,
    /// Resolves asset references.
    pub assets: &'a AssetStore,
    /// The type descriptors.
    pub types: &'a TypeRegistry,
    /// The deferred reference queue of the running decode.
    pub fixups: &'a mut FixupQueue,
    /// The component being decoded.
    pub component: ComponentId,
    /// The persistent id of the owning entity.
    pub entity_id: &'a str,
}

/// A serializer for one family of component types.
///
/// Implementations must be stateless with respect to a single call: all the
/// state they need arrives through the context.
pub trait SerializerPlugin: Send + Sync {
    /// A human-readable name, for logs.
    fn name(&self) -> &'static str;

    /// Encodes a component into an opaque payload.
    fn serialize(&self, component: &dyn Component, cx: &EncodeContext<'_>) -> anyhow::Result<Vec<u8>>;

    /// Decodes a payload into an existing, default-constructed component.
    fn deserialize(
        &self,
        data: &[u8],
        component: &mut dyn Component,
        cx: &mut DecodeContext<'_>,
    ) -> anyhow::Result<()>;

    /// Per-instance predicate: returning `false` makes the caller store a
    /// reference (or nothing) instead of the instance's contents.
    fn can_serialize(&self, _instance: &dyn Any) -> bool {
        true
    }

    /// Plugins whose decoding must observe the fully rebuilt graph return
    /// `true`; their records are decoded during the fixup phase.
    fn defers_mutation(&self) -> bool {
        false
    }
}

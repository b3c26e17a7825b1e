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

//! Link-time declarations of serializer plugins.
//!
//! Crates declare plugins with `inventory::submit!` and the registry collects
//! them when built with [`SerializerRegistry::with_declarations`](super::SerializerRegistry::with_declarations).

use std::any::Any;

use anyhow::bail;
use vellum_core::Component;
use vellum_data::Asset;

use super::{DecodeContext, EncodeContext, SerializerPlugin};

/// The capability every shared asset type implements.
pub const ASSET_CAPABILITY: &str = "vellum::Asset";

/// A plugin declared at link time.
pub struct SerializerDeclaration {
    /// The type names or capabilities the plugin serves.
    pub serializes: &'static [&'static str],
    /// Builds the plugin instance.
    pub build: fn() -> Box<dyn SerializerPlugin>,
}

inventory::collect!(SerializerDeclaration);

/// Refuses to inline assets that ship with the host; those are only ever
/// stored by reference.
struct SharedAssetGuard;

impl SerializerPlugin for SharedAssetGuard {
    fn name(&self) -> &'static str {
        "SharedAssetGuard"
    }

    fn serialize(&self, component: &dyn Component, _cx: &EncodeContext<'_>) -> anyhow::Result<Vec<u8>> {
        bail!(
            "'{}' is an asset type; assets are stored through the fields that hold them",
            component.type_name()
        )
    }

    fn deserialize(
        &self,
        _data: &[u8],
        component: &mut dyn Component,
        _cx: &mut DecodeContext<'_>,
    ) -> anyhow::Result<()> {
        bail!(
            "'{}' is an asset type; assets are restored through the fields that hold them",
            component.type_name()
        )
    }

    fn can_serialize(&self, instance: &dyn Any) -> bool {
        instance.downcast_ref::<Asset>().map_or(true, |asset| !asset.builtin)
    }
}

fn build_asset_guard() -> Box<dyn SerializerPlugin> {
    Box::new(SharedAssetGuard)
}

inventory::submit! {
    SerializerDeclaration {
        serializes: &[ASSET_CAPABILITY],
        build: build_asset_guard,
    }
}

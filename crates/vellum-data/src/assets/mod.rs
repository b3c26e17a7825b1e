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

//! Shared assets and the store that makes them addressable by reference.
//!
//! Assets are immutable values shared between components (meshes, clips,
//! palettes). A snapshot inlines an asset's payload unless the asset's
//! serializer refuses; a refused asset registered in the [`AssetStore`] is
//! recorded as a stable [`AssetReference`] instead.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

/// An immutable shared asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// The fully qualified type name of the asset, e.g. `"game::Mesh"`.
    pub type_name: String,
    /// The asset's name. Not necessarily unique within its type.
    pub name: String,
    /// Whether the asset ships with the host and must never be inlined.
    pub builtin: bool,
    /// The opaque asset contents.
    pub payload: Vec<u8>,
}

impl Asset {
    /// Creates a non-builtin asset.
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            builtin: false,
            payload,
        }
    }

    /// Marks the asset as builtin, builder style.
    pub fn builtin(mut self) -> Self {
        self.builtin = true;
        self
    }
}

/// A shared handle to an asset. Identity is pointer identity.
pub type AssetHandle = Arc<Asset>;

/// A stable address of a registered asset: its type, name and the index among
/// assets sharing both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetReference {
    /// The asset's type name.
    pub type_name: String,
    /// The asset's name.
    pub name: String,
    /// Disambiguates assets with the same type and name.
    pub index: usize,
}

/// Indexes registered assets by type and name.
#[derive(Debug, Default)]
pub struct AssetStore {
    assets: HashMap<String, HashMap<String, Vec<AssetHandle>>>,
}

impl AssetStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an asset and returns its reference. Registering the same
    /// handle twice returns the existing reference.
    pub fn register(&mut self, asset: AssetHandle) -> AssetReference {
        if let Some(existing) = self.reference_of(&asset) {
            return existing;
        }
        let bucket = self
            .assets
            .entry(asset.type_name.clone())
            .or_default()
            .entry(asset.name.clone())
            .or_default();
        bucket.push(asset.clone());
        AssetReference {
            type_name: asset.type_name.clone(),
            name: asset.name.clone(),
            index: bucket.len() - 1,
        }
    }

    /// Returns the reference of a registered asset.
    pub fn reference_of(&self, asset: &AssetHandle) -> Option<AssetReference> {
        let bucket = self.assets.get(&asset.type_name)?.get(&asset.name)?;
        let index = bucket.iter().position(|a| Arc::ptr_eq(a, asset))?;
        Some(AssetReference {
            type_name: asset.type_name.clone(),
            name: asset.name.clone(),
            index,
        })
    }

    /// Looks an asset up by reference.
    pub fn get(&self, reference: &AssetReference) -> Option<AssetHandle> {
        self.assets
            .get(&reference.type_name)?
            .get(&reference.name)?
            .get(reference.index)
            .cloned()
    }

    /// The number of registered assets.
    pub fn len(&self) -> usize {
        self.assets
            .values()
            .flat_map(|by_name| by_name.values())
            .map(Vec::len)
            .sum()
    }

    /// Returns `true` if no asset is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

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

//! Field values, in their live form and in their stored form.

use serde::{Deserialize, Serialize};
use vellum_core::scene::EntityHandle;

use crate::assets::{AssetHandle, AssetReference};

/// A live field value, as read from or written to a component.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
    /// A 3D vector.
    Vec3([f32; 3]),
    /// A quaternion, `[x, y, z, w]`.
    Quat([f32; 4]),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// A homogeneous or heterogeneous list.
    List(Vec<Value>),
    /// A reference to another live entity.
    Entity(Option<EntityHandle>),
    /// A reference to a shared asset.
    Asset(Option<AssetHandle>),
}

impl Value {
    /// The value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The value as a float. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The value as a string slice, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a vector, if it is one.
    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// The entity reference carried by the value. `Some(None)` is a null reference.
    pub fn as_entity(&self) -> Option<Option<EntityHandle>> {
        match self {
            Value::Entity(e) => Some(*e),
            _ => None,
        }
    }

    /// The asset reference carried by the value. `Some(None)` is a null reference.
    pub fn as_asset(&self) -> Option<Option<AssetHandle>> {
        match self {
            Value::Asset(a) => Some(a.clone()),
            _ => None,
        }
    }

    /// The list items, if the value is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// How an asset field was written into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredAsset {
    /// The field held no asset, or the asset could be neither inlined nor referenced.
    Missing,
    /// The asset's contents were written inline.
    Inline {
        /// The asset's type name.
        type_name: String,
        /// The asset's name.
        name: String,
        /// The asset contents.
        payload: Vec<u8>,
    },
    /// The asset was registered and is addressed by reference.
    Reference(AssetReference),
}

/// A field value in its stored, host-independent form.
///
/// Entity references are written as persistent ids; they can only be turned
/// back into live handles once every entity of the snapshot exists again.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum StoredValue {
    /// No value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
    /// A 3D vector.
    Vec3([f32; 3]),
    /// A quaternion.
    Quat([f32; 4]),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// A list.
    List(Vec<StoredValue>),
    /// A reference to an entity by persistent id.
    Entity(Option<String>),
    /// An asset.
    Asset(StoredAsset),
}

impl StoredValue {
    /// Returns `true` if the value, or anything nested in it, refers to an entity.
    pub fn refers_to_entities(&self) -> bool {
        match self {
            StoredValue::Entity(Some(_)) => true,
            StoredValue::List(items) => items.iter().any(StoredValue::refers_to_entities),
            _ => false,
        }
    }
}

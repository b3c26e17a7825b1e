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

//! Data layouts of the snapshot engine.
//!
//! This crate holds everything the engine reads and writes but does not decide:
//! the runtime type descriptors used by reflective serialization, the identity
//! registry, the on-disk snapshot records, the asset store and an in-memory
//! reference implementation of the host scene.

#![warn(missing_docs)]

pub mod assets;
pub mod identity;
pub mod reflect;
pub mod snapshot;
pub mod world;

pub use assets::{Asset, AssetHandle, AssetReference, AssetStore};
pub use identity::IdentityRegistry;
pub use reflect::{FieldDescriptor, StoredAsset, StoredValue, TypeInfo, TypeRegistry, Value};
pub use snapshot::{LevelData, RecordError, SaveEntry, StoredData, StoredItem};
pub use world::{SceneWorld, TemplateNode};

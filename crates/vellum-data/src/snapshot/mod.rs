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

//! The snapshot records written by the encoder and read back by the decoder.
//!
//! A [`LevelData`] is the whole graph of one level: a manifest of entities
//! ([`StoredItem`]) and the opaque data records of their components
//! ([`StoredData`]). Records are serialized with bincode's standard
//! configuration; the byte layout is internal and only has to round-trip.

mod save_entry;

pub use save_entry::SaveEntry;

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};

/// An error raised while writing or reading a snapshot record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The record could not be encoded.
    Encode(String),
    /// The bytes or text do not hold a valid record.
    Decode(String),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Encode(msg) => write!(f, "Failed to encode snapshot record: {msg}"),
            RecordError::Decode(msg) => write!(f, "Failed to decode snapshot record: {msg}"),
        }
    }
}

impl std::error::Error for RecordError {}

/// One manifest entry: the structural facts about one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    /// The entity's persistent id.
    pub name: String,
    /// Whether the entity was active.
    pub active: bool,
    /// The id of the parent, when the direct parent carries an identity.
    pub parent_name: Option<String>,
    /// The template class id; empty unless the entity is a template root.
    pub class_id: String,
    /// The display name, for diagnostics only.
    pub game_object_name: String,
    /// The type names of the attached components.
    pub components: BTreeSet<String>,
    /// Ids of the store-capable descendants of a template root, grouped by
    /// class id in discovery order.
    pub children: Vec<(String, Vec<String>)>,
    /// Ids to hand out, positionally, to the identity-tagged descendants of a
    /// freshly instantiated template.
    pub child_ids: Vec<String>,
}

impl StoredItem {
    /// Returns `true` if the item was instantiated from a template.
    pub fn is_template(&self) -> bool {
        !self.class_id.is_empty()
    }

    /// The stored child ids of the given class.
    pub fn child_group(&self, class_id: &str) -> Option<&[String]> {
        self.children
            .iter()
            .find(|(class, _)| class == class_id)
            .map(|(_, ids)| ids.as_slice())
    }

    /// Appends a child id under its class, creating the group on first use.
    pub fn push_child(&mut self, class_id: &str, id: String) {
        match self.children.iter_mut().find(|(class, _)| class == class_id) {
            Some((_, ids)) => ids.push(id),
            None => self.children.push((class_id.to_string(), vec![id])),
        }
    }
}

/// The opaque data record of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredData {
    /// The owning entity's persistent id.
    pub name: String,
    /// The component's fully qualified type name.
    pub type_name: String,
    /// The owning entity's class id, if any.
    pub class_id: String,
    /// The plugin-produced payload.
    pub data: Vec<u8>,
}

/// The data records of one entity, grouped by component type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecords<'a> {
    /// The entity's persistent id.
    pub name: &'a str,
    /// Records per type, in first-appearance order.
    pub types: Vec<TypeRecords<'a>>,
}

/// The data records of every component of one type on one entity, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRecords<'a> {
    /// The component type name.
    pub type_name: &'a str,
    /// The records, in stored order.
    pub records: Vec<&'a StoredData>,
}

/// The complete snapshot of one level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    /// The level the snapshot was taken in.
    pub name: String,
    /// The entity manifest.
    pub stored_object_names: Vec<StoredItem>,
    /// The component data records, sorted by entity id then type name.
    pub stored_items: Vec<StoredData>,
}

impl LevelData {
    /// Encodes the snapshot to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| RecordError::Encode(e.to_string()))
    }

    /// Decodes a snapshot from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let (data, _len): (LevelData, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| RecordError::Decode(e.to_string()))?;
        Ok(data)
    }

    /// Looks a manifest entry up by id.
    pub fn item(&self, name: &str) -> Option<&StoredItem> {
        self.stored_object_names.iter().find(|item| item.name == name)
    }

    /// Groups the data records by entity, then by type, preserving the order
    /// in which each entity and type first appears.
    pub fn grouped_records(&self) -> Vec<EntityRecords<'_>> {
        let mut groups: Vec<EntityRecords<'_>> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for record in &self.stored_items {
            // Records are normally sorted, so the last group is the usual hit.
            let continues_last = groups.last().is_some_and(|last| last.name == record.name);
            let entity_index = if continues_last {
                groups.len() - 1
            } else if let Some(&found) = index.get(record.name.as_str()) {
                found
            } else {
                groups.push(EntityRecords {
                    name: &record.name,
                    types: Vec::new(),
                });
                index.insert(&record.name, groups.len() - 1);
                groups.len() - 1
            };
            let types = &mut groups[entity_index].types;
            match types.iter_mut().rev().find(|t| t.type_name == record.type_name) {
                Some(group) => group.records.push(record),
                None => types.push(TypeRecords {
                    type_name: &record.type_name,
                    records: vec![record],
                }),
            }
        }
        groups
    }
}

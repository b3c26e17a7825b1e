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

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordError;

/// A named, timestamped save.
///
/// `data` holds the sealed snapshot text (compressed or tagged uncompressed)
/// produced by the snapshot coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveEntry {
    /// The caller-chosen save name.
    pub name: String,
    /// The level the save was taken in.
    pub level: String,
    /// When the save was taken.
    pub when: DateTime<Utc>,
    /// The sealed snapshot.
    pub data: String,
}

impl SaveEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(name: impl Into<String>, level: impl Into<String>, data: String) -> Self {
        Self {
            name: name.into(),
            level: level.into(),
            when: Utc::now(),
            data,
        }
    }

    /// A short human-readable caption for save menus.
    pub fn caption(&self) -> String {
        format!("{} - {} - {}", self.name, self.level, self.when.format("%Y-%m-%d %H:%M"))
    }

    /// Encodes the entry as base64 text, for string-only stores.
    pub fn to_encoded_string(&self) -> Result<String, RecordError> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| RecordError::Encode(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }

    /// Decodes an entry written by [`SaveEntry::to_encoded_string`].
    pub fn from_encoded_string(text: &str) -> Result<Self, RecordError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| RecordError::Decode(e.to_string()))?;
        let (entry, _len): (SaveEntry, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| RecordError::Decode(e.to_string()))?;
        Ok(entry)
    }
}

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

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use vellum_data::{RecordError, SaveEntry};

/// The save-slot book: per player, save entries most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSlots {
    by_player: BTreeMap<String, Vec<SaveEntry>>,
}

impl SaveSlots {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry at the front of the player's list and evicts the
    /// oldest entries beyond `max_games`. Returns the evicted entries.
    pub fn insert(&mut self, player: &str, entry: SaveEntry, max_games: usize) -> Vec<SaveEntry> {
        let entries = self.by_player.entry(player.to_string()).or_default();
        entries.insert(0, entry);
        if entries.len() > max_games {
            entries.split_off(max_games)
        } else {
            Vec::new()
        }
    }

    /// The player's entries, most recent first.
    pub fn entries(&self, player: &str) -> &[SaveEntry] {
        self.by_player.get(player).map(Vec::as_slice).unwrap_or_default()
    }

    /// Removes the player's entry at `index`.
    pub fn remove(&mut self, player: &str, index: usize) -> Option<SaveEntry> {
        let entries = self.by_player.get_mut(player)?;
        (index < entries.len()).then(|| entries.remove(index))
    }

    /// The players that have at least one entry.
    pub fn players(&self) -> impl Iterator<Item = &str> {
        self.by_player
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(player, _)| player.as_str())
    }

    /// Encodes the book as base64 text.
    pub fn to_encoded_string(&self) -> Result<String, RecordError> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| RecordError::Encode(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }

    /// Decodes a book written by [`SaveSlots::to_encoded_string`].
    pub fn from_encoded_string(text: &str) -> Result<Self, RecordError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| RecordError::Decode(e.to_string()))?;
        let (slots, _len): (SaveSlots, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| RecordError::Decode(e.to_string()))?;
        Ok(slots)
    }
}

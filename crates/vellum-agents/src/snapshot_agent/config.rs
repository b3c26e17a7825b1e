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

use serde::{Deserialize, Serialize};

use super::AgentError;

/// What a non-urgent snapshot request does while serialization is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerializationMode {
    /// Answer with the state cached when the suspension began.
    #[default]
    CacheSerialization,
    /// Refuse direct requests; queue saves until the suspension ends.
    SerializeWhenFree,
}

/// Configuration of the snapshot agent.
///
/// Every field has a default, so configuration text only needs to name what
/// it changes:
///
/// ```text
/// (player_name: "ada", max_games: 5, serialization_mode: SerializeWhenFree)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// The player whose save slots and resume point are used.
    pub player_name: String,
    /// Slots kept per player; older ones are evicted.
    pub max_games: usize,
    /// Behavior while suspended.
    pub serialization_mode: SerializationMode,
    /// Compress sealed snapshots; otherwise they are tagged uncompressed text.
    pub use_compression: bool,
    /// Store every save as the player's resume point too.
    pub save_resume_information: bool,
    /// Polls the decoder yields for while the host settles new entities.
    pub settle_frames: u32,
    /// Deflate level, 0 to 9.
    pub compression_level: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            player_name: String::new(),
            max_games: 20,
            serialization_mode: SerializationMode::default(),
            use_compression: true,
            save_resume_information: true,
            settle_frames: 2,
            compression_level: 6,
        }
    }
}

impl SnapshotConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron(text: &str) -> Result<Self, AgentError> {
        ron::from_str(text).map_err(|e| AgentError::Config(e.to_string()))
    }

    /// The store key of the player's resume point.
    pub fn resume_key(&self) -> String {
        format!("{}__RESUME__", self.player_name)
    }
}

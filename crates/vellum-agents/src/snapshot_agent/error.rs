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

use vellum_data::RecordError;
use vellum_lanes::{EncodeError, EnvelopeLaneError};

/// An error that can occur within the `SnapshotAgent`.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Serialization is suspended and the configured mode refuses to wait.
    #[error("Serialization was suspended: {count} times")]
    Suspended {
        /// The current suspension count.
        count: u32,
    },
    /// A restore is running; snapshots are refused until it completes.
    #[error("A restore is in progress")]
    DecodeInProgress,
    /// Sealed snapshot text could not be opened.
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeLaneError),
    /// The encode pass was aborted.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// A snapshot record or save entry could not be read or written.
    #[error(transparent)]
    Record(#[from] RecordError),
    /// The configuration text is invalid.
    #[error("Invalid snapshot configuration: {0}")]
    Config(String),
}

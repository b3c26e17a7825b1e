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

//! Agents driving the snapshot lanes.
//!
//! The [`SnapshotAgent`](snapshot_agent::SnapshotAgent) is the entry point for
//! every save and load: it owns the registries, the save-slot book and the
//! suspension gate, and it hands work to the encoder, decoder and envelope lanes.

#![warn(missing_docs)]

pub mod snapshot_agent;

pub use snapshot_agent::{AgentError, SaveOutcome, SaveSlots, SerializationMode, SnapshotAgent, SnapshotConfig};

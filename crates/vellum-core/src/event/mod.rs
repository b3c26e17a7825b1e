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

//! Event-driven notifications emitted around snapshot operations.
//!
//! The [`EventBus`] is a generic MPSC channel; [`SnapshotEvent`] is the event
//! vocabulary the snapshot coordinator publishes on it.

mod bus;

pub use self::bus::EventBus;

/// A notification published by the snapshot coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    /// A restore finished its final phase.
    Deserialized,
    /// A save entry was recorded under the given name.
    GameSaved {
        /// The name of the save entry.
        name: String,
    },
    /// The suspension count went from zero to one.
    SuspendingSerialization,
    /// The suspension count returned to zero.
    ResumingSerialization,
}

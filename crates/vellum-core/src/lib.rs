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

//! # Vellum Core
//!
//! Foundational crate containing the traits, core types, and interface contracts
//! of the snapshot engine. Nothing in here knows how a snapshot is laid out; it
//! only describes the live scene the engine talks to and the collaborators
//! (storage, compression, progress reporting) it is handed.

#![warn(missing_docs)]

pub mod codec;
pub mod component;
pub mod event;
pub mod lane;
pub mod progress;
pub mod scene;
pub mod storage;

pub use component::Component;
pub use progress::ProgressSink;
pub use scene::{ComponentId, EntityHandle, IdentityRole, IdentityTag, SceneBackend};
pub use storage::KeyValueStore;

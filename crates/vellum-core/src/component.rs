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

//! Defines the [`Component`] contract: the unit of behavior data attached to an entity.

use std::any::Any;

/// A behavior/data unit attached to exactly one entity of the live scene.
///
/// Components are type-erased trait objects as far as the snapshot engine is
/// concerned. The engine identifies a component's type purely by its fully
/// qualified [`type_name`](Component::type_name), which is also the key used to
/// resolve a serializer plugin for it.
///
/// The optional capability hooks (`should_save`, `should_save_whole_object`,
/// `on_message`) have neutral defaults, so most components implement only the
/// three required methods.
pub trait Component: Any + Send + Sync {
    /// The fully qualified type name, e.g. `"game::physics::BoxCollider"`.
    fn type_name(&self) -> &'static str;

    /// Allows downcasting to the concrete component type.
    fn as_any(&self) -> &dyn Any;

    /// Allows mutable downcasting to the concrete component type.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Per-instance opt-out: returning `false` drops this component's data
    /// record from a snapshot.
    fn should_save(&self) -> bool {
        true
    }

    /// Entity-level opt-out. A component that controls the serialization of
    /// its whole entity returns `Some(decision)`; the first component on an
    /// entity that answers decides for the entity.
    fn should_save_whole_object(&self) -> Option<bool> {
        None
    }

    /// Receives a broadcast message such as `"OnSerializing"` or
    /// `"OnDeserialized"`. Components that do not care ignore it.
    fn on_message(&mut self, _message: &str) {}
}

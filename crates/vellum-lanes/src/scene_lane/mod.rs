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

//! Walks a live scene into a snapshot, and rebuilds a live scene from one.
//!
//! The [`GraphEncoder`] is a single synchronous pass. The [`GraphDecoder`] is a
//! resumable state machine: it yields back to the host while the scene settles
//! and is driven by repeated calls to [`GraphDecoder::poll`].

mod decode_lane;
mod encode_lane;

pub use decode_lane::{DecodeEnv, DecodeHooks, DecodePhase, DecodeReport, DecodeStatus, GraphDecoder, NoHooks};
pub use encode_lane::{EncodeError, EncodeOptions, GraphEncoder, StoreFilter};

use vellum_core::scene::{EntityHandle, IdentityRole, SceneBackend};

/// Message broadcast to an entity's components right before its data is stored.
pub const ON_SERIALIZING: &str = "OnSerializing";
/// Message broadcast to every entity once a decode has finished.
pub const ON_DESERIALIZED: &str = "OnDeserialized";

/// The store-information descendants of a template root, in depth-first
/// discovery order. Nested template roots and their subtrees are skipped:
/// they are instances of their own.
pub(crate) fn store_capable_descendants(scene: &dyn SceneBackend, root: EntityHandle) -> Vec<EntityHandle> {
    let mut out = Vec::new();
    let mut stack: Vec<EntityHandle> = scene.children(root).into_iter().rev().collect();
    while let Some(entity) = stack.pop() {
        match scene.identity_tag(entity).map(|tag| tag.role) {
            Some(IdentityRole::TemplateRoot) => continue,
            Some(IdentityRole::StoreInformation) => out.push(entity),
            _ => {}
        }
        stack.extend(scene.children(entity).into_iter().rev());
    }
    out
}

/// Every identity-tagged descendant of an entity, in depth-first discovery order.
pub(crate) fn tagged_descendants(scene: &dyn SceneBackend, root: EntityHandle) -> Vec<EntityHandle> {
    let mut out = Vec::new();
    let mut stack: Vec<EntityHandle> = scene.children(root).into_iter().rev().collect();
    while let Some(entity) = stack.pop() {
        if scene.identity_tag(entity).is_some() {
            out.push(entity);
        }
        stack.extend(scene.children(entity).into_iter().rev());
    }
    out
}

/// Returns `true` if `entity` is `ancestor` or lies below it.
pub(crate) fn is_within(scene: &dyn SceneBackend, entity: EntityHandle, ancestor: EntityHandle) -> bool {
    let mut cursor = Some(entity);
    while let Some(current) = cursor {
        if current == ancestor {
            return true;
        }
        cursor = scene.parent(current);
    }
    false
}

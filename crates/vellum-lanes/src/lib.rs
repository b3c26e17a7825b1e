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

//! Hot-path pipelines of the snapshot engine.
//!
//! Each lane is a stateless-or-nearly strategy the snapshot agent drives:
//!
//! - [`serializer_lane`] resolves a serializer plugin for every component type
//!   and provides the reflective default.
//! - [`fixup_lane`] holds the deferred reference queue that is drained once
//!   the whole graph exists.
//! - [`scene_lane`] walks a live scene into a snapshot and rebuilds a scene
//!   from one, phase by phase.
//! - [`envelope_lane`] compresses and seals snapshot bytes into storable text.

#![warn(missing_docs)]

pub mod envelope_lane;
pub mod fixup_lane;
pub mod scene_lane;
pub mod serializer_lane;

pub use envelope_lane::{open, seal, DeflateCodec, EnvelopeLaneError};
pub use fixup_lane::{DeferredGroup, DeferredRef, Fixup, FixupQueue, FixupTarget, LiveIndex, ResolverKind, ResolverTable};
pub use scene_lane::{
    DecodeEnv, DecodeHooks, DecodePhase, DecodeReport, DecodeStatus, EncodeError, EncodeOptions, GraphDecoder,
    GraphEncoder, NoHooks, StoreFilter,
};
pub use serializer_lane::{
    DecodeContext, EncodeContext, ReflectiveSerializer, ResolutionStrategy, SerializerDeclaration, SerializerPlugin,
    SerializerRegistry, ASSET_CAPABILITY,
};

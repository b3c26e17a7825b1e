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

//! # Lane Abstraction
//!
//! A **Lane** is a swappable processing strategy. The snapshot engine has three
//! kinds: the graph encoder, the graph decoder, and the envelope codec. Each is
//! identified by a versioned strategy name that ends up in logs. How a codec
//! reads stored bytes back is decided by the properties in the envelope header,
//! not by this name.

use std::fmt;

/// Classification of lane types. The snapshot agent checks it before
/// installing a lane in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// Live scene to snapshot.
    Encode,
    /// Snapshot to live scene.
    Decode,
    /// Snapshot bytes to stored form (compression, text).
    Envelope,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKind::Encode => write!(f, "Encode"),
            LaneKind::Decode => write!(f, "Decode"),
            LaneKind::Envelope => write!(f, "Envelope"),
        }
    }
}

/// The common interface shared by all lane types.
pub trait Lane {
    /// A unique, versioned name for the strategy, e.g. `"VL_DEFLATE_V1"`.
    fn strategy_name(&self) -> &'static str;

    /// The kind of work this lane performs.
    fn lane_kind(&self) -> LaneKind;
}

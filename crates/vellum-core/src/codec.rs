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

//! The compression codec contract: a byte-to-byte transform that reports progress.

use crate::lane::Lane;
use crate::progress::ProgressSink;
use crate::scene::CODEC_PROPERTIES_LEN;
use std::fmt;

/// An error raised by a compression codec.
#[derive(Debug)]
pub enum CodecError {
    /// The codec does not understand the properties found in an envelope.
    UnsupportedProperties([u8; CODEC_PROPERTIES_LEN]),
    /// The underlying transform failed.
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnsupportedProperties(props) => {
                write!(f, "Unsupported codec properties: {props:?}")
            }
            CodecError::Failed(e) => write!(f, "Codec failed: {e}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Failed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// A compression strategy used to wrap encoded snapshots.
pub trait CompressionCodec: Lane {
    /// The properties written into the envelope header by this codec.
    fn properties(&self) -> [u8; CODEC_PROPERTIES_LEN];

    /// Compresses `input`, reporting progress under the `"Compression"` phase.
    fn compress(&self, input: &[u8], progress: &dyn ProgressSink) -> Result<Vec<u8>, CodecError>;

    /// Decompresses a payload produced with the given properties. Output past
    /// `limit` bytes is never produced.
    fn decompress(
        &self,
        properties: [u8; CODEC_PROPERTIES_LEN],
        payload: &[u8],
        limit: u64,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<u8>, CodecError>;
}

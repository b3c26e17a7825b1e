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

//! Defines the compressed envelope that wraps an encoded snapshot.
//!
//! A compressed snapshot is laid out as a fixed-size [`EnvelopeHeader`] followed
//! by the codec's payload:
//!
//! ```text
//! [5 bytes codec properties][8 bytes little-endian original length][payload]
//! ```
//!
//! Snapshots stored without compression use a textual form instead: the literal
//! [`NO_COMPRESSION_TAG`] followed by the base64 text of the raw bytes.

use std::fmt;

/// Prefix marking an uncompressed textual snapshot.
pub const NO_COMPRESSION_TAG: &str = "NOCOMPRESSION";
/// Number of codec-property bytes at the start of the envelope.
pub const CODEC_PROPERTIES_LEN: usize = 5;
const HEADER_SIZE: usize = CODEC_PROPERTIES_LEN + 8;

/// An error raised while reading an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The input is shorter than the fixed header.
    Truncated {
        /// The length of the rejected input.
        len: usize,
    },
    /// The decompressed payload does not have the length recorded in the header.
    LengthMismatch {
        /// The length recorded in the header.
        expected: u64,
        /// The length actually produced.
        actual: u64,
    },
    /// The textual form could not be decoded.
    InvalidText(String),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::Truncated { len } => write!(
                f,
                "Truncated input: {len} bytes, the envelope header alone needs {}",
                EnvelopeHeader::SIZE
            ),
            EnvelopeError::LengthMismatch { expected, actual } => {
                write!(f, "Envelope length mismatch: expected {expected}, got {actual}")
            }
            EnvelopeError::InvalidText(msg) => write!(f, "Invalid envelope text: {msg}"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// The fixed-size header at the beginning of every compressed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Codec-specific properties, written by the codec that produced the payload.
    pub properties: [u8; CODEC_PROPERTIES_LEN],
    /// The length of the uncompressed snapshot, in bytes.
    pub original_length: u64,
}

/// A logical representation of a compressed snapshot in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The parsed header data.
    pub header: EnvelopeHeader,
    /// The compressed payload that follows the header.
    pub payload: Vec<u8>,
}

// The header is a fixed layout, so it is written byte by byte rather than through serde.
impl EnvelopeHeader {
    /// The total size of the header in bytes.
    pub const SIZE: usize = HEADER_SIZE;

    /// Parses a header from the beginning of a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < Self::SIZE {
            return Err(EnvelopeError::Truncated { len: bytes.len() });
        }

        let mut properties = [0u8; CODEC_PROPERTIES_LEN];
        properties.copy_from_slice(&bytes[..CODEC_PROPERTIES_LEN]);

        let mut length = [0u8; 8];
        length.copy_from_slice(&bytes[CODEC_PROPERTIES_LEN..Self::SIZE]);

        Ok(Self {
            properties,
            original_length: u64::from_le_bytes(length),
        })
    }

    /// Writes the header into its fixed byte layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..CODEC_PROPERTIES_LEN].copy_from_slice(&self.properties);
        out[CODEC_PROPERTIES_LEN..].copy_from_slice(&self.original_length.to_le_bytes());
        out
    }
}

impl Envelope {
    /// Splits raw bytes into header and payload. Fails fast on truncated input;
    /// no partial decode is attempted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let header = EnvelopeHeader::from_bytes(bytes)?;
        Ok(Self {
            header,
            payload: bytes[EnvelopeHeader::SIZE..].to_vec(),
        })
    }

    /// Serializes the envelope back to its byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EnvelopeHeader::SIZE + self.payload.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

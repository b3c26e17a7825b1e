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

//! Seals encoded snapshots into storable text, and opens them again.
//!
//! Sealed text is base64 in both forms. Compressed snapshots wrap the codec
//! output in an [`Envelope`]; uncompressed ones carry the
//! [`NO_COMPRESSION_TAG`] prefix in front of the base64 text.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use vellum_core::{
    codec::{CodecError, CompressionCodec},
    lane::{Lane, LaneKind},
    progress::{PhaseProgress, ProgressSink},
    scene::{Envelope, EnvelopeError, EnvelopeHeader, CODEC_PROPERTIES_LEN, NO_COMPRESSION_TAG},
};

const DEFLATE_MARK: u8 = b'D';
const DEFLATE_WINDOW_LOG: u8 = 15;
const CHUNK: usize = 64 * 1024;

/// An error raised while sealing or opening a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeLaneError {
    /// The envelope itself is malformed.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The codec failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A raw-deflate codec.
///
/// Its properties are `[b'D', level, window log, 0, 0]`; the level is only
/// informative when reading.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self::new(6)
    }
}

impl DeflateCodec {
    /// Creates a codec compressing at `level` (clamped to 0..=9).
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

impl Lane for DeflateCodec {
    fn strategy_name(&self) -> &'static str {
        "VL_DEFLATE_V1"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Envelope
    }
}

impl CompressionCodec for DeflateCodec {
    fn properties(&self) -> [u8; CODEC_PROPERTIES_LEN] {
        [DEFLATE_MARK, self.level as u8, DEFLATE_WINDOW_LOG, 0, 0]
    }

    fn compress(&self, input: &[u8], progress: &dyn ProgressSink) -> Result<Vec<u8>, CodecError> {
        let mut phase = PhaseProgress::new(progress, "Compression");
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(self.level));
        let mut consumed = 0;
        for chunk in input.chunks(CHUNK) {
            encoder.write_all(chunk).map_err(|e| CodecError::Failed(Box::new(e)))?;
            consumed += chunk.len();
            phase.advance(consumed, input.len());
        }
        let out = encoder.finish().map_err(|e| CodecError::Failed(Box::new(e)))?;
        phase.set(1.0);
        Ok(out)
    }

    fn decompress(
        &self,
        properties: [u8; CODEC_PROPERTIES_LEN],
        payload: &[u8],
        limit: u64,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<u8>, CodecError> {
        if properties[0] != DEFLATE_MARK || properties[2] != DEFLATE_WINDOW_LOG {
            return Err(CodecError::UnsupportedProperties(properties));
        }
        let mut phase = PhaseProgress::new(progress, "Compression");
        let mut out = Vec::new();
        DeflateDecoder::new(payload)
            .take(limit)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Failed(Box::new(e)))?;
        phase.set(1.0);
        Ok(out)
    }
}

/// Seals snapshot bytes into text. Without a codec the bytes are stored
/// uncompressed behind [`NO_COMPRESSION_TAG`].
pub fn seal(
    bytes: &[u8],
    codec: Option<&dyn CompressionCodec>,
    progress: &dyn ProgressSink,
) -> Result<String, EnvelopeLaneError> {
    let Some(codec) = codec else {
        return Ok(format!("{}{}", NO_COMPRESSION_TAG, STANDARD.encode(bytes)));
    };
    let payload = codec.compress(bytes, progress)?;
    let envelope = Envelope {
        header: EnvelopeHeader {
            properties: codec.properties(),
            original_length: bytes.len() as u64,
        },
        payload,
    };
    log::trace!(
        "Sealed {} bytes into {} with {}",
        bytes.len(),
        envelope.payload.len(),
        codec.strategy_name()
    );
    Ok(STANDARD.encode(envelope.to_bytes()))
}

/// Opens sealed text back into snapshot bytes.
///
/// Fails fast on input shorter than the envelope header and on a payload
/// whose decompressed length disagrees with the header.
pub fn open(
    text: &str,
    codec: &dyn CompressionCodec,
    progress: &dyn ProgressSink,
) -> Result<Vec<u8>, EnvelopeLaneError> {
    if let Some(raw) = text.strip_prefix(NO_COMPRESSION_TAG) {
        return STANDARD
            .decode(raw.trim())
            .map_err(|e| EnvelopeError::InvalidText(e.to_string()).into());
    }
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| EnvelopeError::InvalidText(e.to_string()))?;
    let envelope = Envelope::from_bytes(&bytes)?;
    // One byte past the recorded length is enough to tell that it lies.
    let limit = envelope.header.original_length.saturating_add(1);
    let out = codec.decompress(envelope.header.properties, &envelope.payload, limit, progress)?;
    if out.len() as u64 != envelope.header.original_length {
        return Err(EnvelopeError::LengthMismatch {
            expected: envelope.header.original_length,
            actual: out.len() as u64,
        }
        .into());
    }
    Ok(out)
}

//! PNG chunk model.
//!
//! Chunks are parsed from raw bytes without re-encoding image data:
//! `length (4 BE) | type (4 ASCII) | data | crc32 (4 BE)` where the CRC
//! covers type and data. A CRC mismatch is logged and tolerated because some
//! producers write non-conforming chunks; parsing stops after `IEND`.

use tracing::{debug, warn};

use crate::TRACING_TARGET;

/// PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Terminal chunk type.
pub const CHUNK_IEND: [u8; 4] = *b"IEND";
/// International text chunk (UTF-8 payload).
pub const CHUNK_ITXT: [u8; 4] = *b"iTXt";
/// Latin-1 text chunk.
pub const CHUNK_TEXT: [u8; 4] = *b"tEXt";

/// Namespace prefix for provenance metadata keywords.
pub const METADATA_NAMESPACE: &str = "mjr:";

/// A single PNG chunk: 4-byte type tag plus raw data.
///
/// The CRC is derived on serialization and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 4-byte chunk type tag (e.g. `IHDR`, `iTXt`).
    pub kind: [u8; 4],
    /// Chunk payload.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Creates a chunk from a type tag and payload.
    pub fn new(kind: [u8; 4], data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Returns whether this is the terminal `IEND` chunk.
    pub fn is_iend(&self) -> bool {
        self.kind == CHUNK_IEND
    }

    /// Returns the CRC-32 over type and data.
    pub fn crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.kind);
        hasher.update(&self.data);
        hasher.finalize()
    }

    /// Serializes the chunk with length prefix and trailing CRC.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.data.len());
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.kind);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.crc().to_be_bytes());
        out
    }

    /// Parses one chunk starting at `offset`.
    ///
    /// Returns the chunk and the offset of the next one, or `None` when the
    /// remaining bytes cannot hold a complete chunk.
    pub fn parse(bytes: &[u8], offset: usize) -> Option<(Self, usize)> {
        let header = bytes.get(offset..offset + 8)?;
        let length = u32::from_be_bytes(header[..4].try_into().ok()?) as usize;
        let kind: [u8; 4] = header[4..8].try_into().ok()?;

        let data = bytes.get(offset + 8..offset + 8 + length)?.to_vec();
        let stored_crc =
            u32::from_be_bytes(bytes.get(offset + 8 + length..offset + 12 + length)?.try_into().ok()?);

        let chunk = Self { kind, data };
        if chunk.crc() != stored_crc {
            warn!(
                target: TRACING_TARGET,
                kind = %String::from_utf8_lossy(&kind),
                "crc mismatch in chunk, keeping best-effort payload"
            );
        }

        Some((chunk, offset + 12 + length))
    }
}

/// Reads all chunks from raw PNG bytes.
///
/// Returns `None` when the signature is missing. Parsing is best-effort: a
/// truncated trailing chunk ends the loop with the chunks read so far.
pub fn read_chunks(bytes: &[u8]) -> Option<Vec<Chunk>> {
    if !bytes.starts_with(&PNG_SIGNATURE) {
        debug!(target: TRACING_TARGET, "missing png signature");
        return None;
    }

    let mut chunks = Vec::new();
    let mut offset = PNG_SIGNATURE.len();

    while offset < bytes.len() {
        let Some((chunk, next)) = Chunk::parse(bytes, offset) else {
            debug!(target: TRACING_TARGET, offset, "truncated chunk, stopping parse");
            break;
        };
        let done = chunk.is_iend();
        chunks.push(chunk);
        offset = next;
        if done {
            break;
        }
    }

    Some(chunks)
}

/// Builds an uncompressed `iTXt` chunk for a keyword/value pair.
///
/// Layout: keyword `NUL`, compression flag (0), compression method (0),
/// language tag `NUL`, translated keyword `NUL`, UTF-8 text with no
/// terminator. The keyword is reduced to its Latin-1-representable bytes.
pub fn itxt_chunk(key: &str, value: &str) -> Chunk {
    let mut data = Vec::with_capacity(key.len() + value.len() + 5);
    data.extend(key.chars().filter(|c| (*c as u32) < 0x100).map(|c| c as u8));
    data.push(0); // keyword terminator
    data.push(0); // compression flag: uncompressed
    data.push(0); // compression method
    data.push(0); // empty language tag
    data.push(0); // empty translated keyword
    data.extend_from_slice(value.as_bytes());
    Chunk::new(CHUNK_ITXT, data)
}

/// Parses an `iTXt` chunk into its keyword and UTF-8 text.
///
/// Compressed payloads are skipped (the writer only ever emits uncompressed
/// chunks; foreign compressed chunks are preserved verbatim, not decoded).
pub fn parse_itxt(chunk: &Chunk) -> Option<(String, String)> {
    if chunk.kind != CHUNK_ITXT {
        return None;
    }
    let data = &chunk.data;

    let keyword_end = data.iter().position(|b| *b == 0)?;
    let keyword: String = data[..keyword_end].iter().map(|b| *b as char).collect();

    // compression flag + method follow the keyword terminator
    let compression_flag = *data.get(keyword_end + 1)?;
    let mut offset = keyword_end + 3;

    let lang_end = offset + data[offset..].iter().position(|b| *b == 0)?;
    offset = lang_end + 1;
    let translated_end = offset + data[offset..].iter().position(|b| *b == 0)?;
    offset = translated_end + 1;

    if compression_flag != 0 {
        debug!(target: TRACING_TARGET, keyword, "skipping compressed itxt payload");
        return None;
    }

    let text = String::from_utf8_lossy(data.get(offset..)?).into_owned();
    Some((keyword, text))
}

/// Parses a `tEXt` chunk into its keyword and Latin-1 text.
pub fn parse_text(chunk: &Chunk) -> Option<(String, String)> {
    if chunk.kind != CHUNK_TEXT {
        return None;
    }
    let data = &chunk.data;

    let keyword_end = data.iter().position(|b| *b == 0)?;
    let keyword: String = data[..keyword_end].iter().map(|b| *b as char).collect();
    let text: String = data[keyword_end + 1..].iter().map(|b| *b as char).collect();
    Some((keyword, text))
}

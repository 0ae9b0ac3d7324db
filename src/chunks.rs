//! Chunk format — tagged, length-prefixed, CRC-protected byte records.
//!
//! # On-disk layout (all fields big-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   tag       4-byte ASCII ("CORE", "SEEK", "META", "SAFE", "VERI", "TRAK")
//!    4      4   length    payload length (BE u32)
//!    8      4   crc32     CRC32 of payload only (BE u32)
//!   12      N   payload
//! ```
//!
//! A container is an 8-byte header (`H4MK` magic, version, reserved)
//! followed by a sequence of these chunks. CRC mismatch or truncation is
//! always fatal to parsing that chunk; the caller never silently
//! continues.

use crate::bytes_codec::{crc32, ByteReader, ByteWriter};
use crate::error::{H4mkError, Result};

pub const MAGIC: &[u8; 4] = b"H4MK";
pub const VERSION: u16 = 1;

pub const TAG_CORE: &[u8; 4] = b"CORE";
pub const TAG_SEEK: &[u8; 4] = b"SEEK";
pub const TAG_META: &[u8; 4] = b"META";
pub const TAG_SAFE: &[u8; 4] = b"SAFE";
pub const TAG_VERI: &[u8; 4] = b"VERI";

/// A single tagged, length-prefixed, CRC-protected chunk.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub tag: [u8; 4],
    pub payload: Vec<u8>,
}

impl Chunk {
    pub fn new(tag: &[u8; 4], payload: Vec<u8>) -> Self {
        Self { tag: *tag, payload }
    }

    /// Encode as `tag ‖ length(u32 BE) ‖ crc32(u32 BE) ‖ payload`.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(&self.tag);
        w.write_u32_be(self.payload.len() as u32);
        w.write_u32_be(crc32(&self.payload));
        w.write_bytes(&self.payload);
        w.into_inner()
    }

    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// A parsed chunk's position and metadata within a container buffer,
/// without copying the payload — used by readers that want to enumerate
/// chunks before deciding which payloads to extract.
#[derive(Debug, Clone)]
pub struct ChunkInfo {
    pub index: usize,
    pub tag: [u8; 4],
    pub offset: usize,
    pub length: u32,
}

/// Decode one chunk starting at `buf[0..]`. Returns the chunk and the
/// number of bytes consumed.
pub fn decode_one(buf: &[u8]) -> Result<(Chunk, usize)> {
    let mut r = ByteReader::new(buf);
    let tag_bytes = r.read_exact_bytes(4)?;
    let tag: [u8; 4] = tag_bytes.try_into().unwrap();
    let length = r.read_u32_be()?;
    let stored_crc = r.read_u32_be()?;
    let payload = r.read_exact_bytes(length as usize)?;

    let actual_crc = crc32(&payload);
    if actual_crc != stored_crc {
        return Err(H4mkError::CrcMismatch {
            tag,
            expected: stored_crc,
            actual: actual_crc,
        });
    }

    let consumed = 4 + 4 + 4 + payload.len();
    Ok((Chunk { tag, payload }, consumed))
}

/// Stream-decode every chunk in `buf`, returning them in order. Stops at
/// the first truncation or CRC mismatch.
pub fn decode_all(buf: &[u8]) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        let (chunk, consumed) = decode_one(&buf[pos..])?;
        pos += consumed;
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Enumerate chunk positions in `buf` without validating CRCs, for the
/// index-bypass recovery scanner where we want to classify corruption
/// rather than abort on it. See [`crate::recovery`].
pub fn scan_positions(buf: &[u8], start: usize) -> Vec<ChunkInfo> {
    let mut out = Vec::new();
    let mut pos = start;
    let mut index = 0usize;
    while pos + 12 <= buf.len() {
        let tag: [u8; 4] = buf[pos..pos + 4].try_into().unwrap();
        let length = u32::from_be_bytes(buf[pos + 4..pos + 8].try_into().unwrap());
        out.push(ChunkInfo { index, tag, offset: pos, length });
        let advance = 12usize.saturating_add(length as usize);
        if advance == 0 || pos + advance > buf.len() {
            break;
        }
        pos += advance;
        index += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let c = Chunk::new(TAG_CORE, b"hello".to_vec());
        let bytes = c.encode();
        let (decoded, consumed) = decode_one(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.tag, *TAG_CORE);
        assert_eq!(decoded.payload, b"hello");
    }

    #[test]
    fn crc_mismatch_is_rejected() {
        let c = Chunk::new(TAG_CORE, b"hello".to_vec());
        let mut bytes = c.encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(decode_one(&bytes), Err(H4mkError::CrcMismatch { .. })));
    }

    #[test]
    fn decode_all_multiple_chunks() {
        let chunks = vec![
            Chunk::new(TAG_CORE, b"A".to_vec()),
            Chunk::new(TAG_CORE, b"B".to_vec()),
            Chunk::new(TAG_META, b"{}".to_vec()),
        ];
        let mut buf = Vec::new();
        for c in &chunks {
            buf.extend(c.encode());
        }
        let decoded = decode_all(&buf).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].payload, b"A");
        assert_eq!(decoded[2].tag, *TAG_META);
    }
}

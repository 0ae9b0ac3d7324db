//! Big-endian integer framing, length-prefixed strings, and bounds-checked
//! reads shared by `chunks`, `seek_index`, and `ratchet::header`.
//!
//! Every multi-byte field on the wire is big-endian. This is the opposite
//! convention from an in-process little-endian archive format — the byte
//! order is a property of *this* wire format, not a general habit, so it
//! is centralized here rather than scattered as ad-hoc `to_le_bytes` calls.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::error::{H4mkError, Result};

/// A cursor over an immutable buffer with bounds-checked reads.
///
/// All reads fail with [`H4mkError::Truncated`] rather than panicking —
/// callers parse untrusted bytes from disk or the network.
pub struct ByteReader<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { cur: Cursor::new(buf) }
    }

    pub fn position(&self) -> u64 {
        self.cur.position()
    }

    pub fn remaining(&self) -> usize {
        let buf = self.cur.get_ref();
        buf.len().saturating_sub(self.cur.position() as usize)
    }

    fn need(&self, n: usize) -> Result<()> {
        let available = self.remaining();
        if available < n {
            return Err(H4mkError::Truncated { needed: n, available });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.cur.read_u8()?)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.cur.read_u16::<BigEndian>()?)
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.cur.read_u32::<BigEndian>()?)
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.cur.read_u64::<BigEndian>()?)
    }

    pub fn read_exact_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.need(n)?;
        let mut buf = vec![0u8; n];
        self.cur.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_array32(&mut self) -> Result<[u8; 32]> {
        self.need(32)?;
        let mut buf = [0u8; 32];
        self.cur.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// u8-length-prefixed UTF-8 string (used for cipher suite identifiers).
    pub fn read_str_u8(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_exact_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| H4mkError::BadInput(e.to_string()))
    }

    /// u16-length-prefixed UTF-8 string (used for track identifiers).
    pub fn read_str_u16(&mut self) -> Result<String> {
        let len = self.read_u16_be()? as usize;
        let bytes = self.read_exact_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| H4mkError::BadInput(e.to_string()))
    }
}

/// An append-only big-endian byte writer.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.write_u8(v).expect("write to Vec never fails");
    }

    pub fn write_u16_be(&mut self, v: u16) {
        self.buf.write_u16::<BigEndian>(v).expect("write to Vec never fails");
    }

    pub fn write_u32_be(&mut self, v: u32) {
        self.buf.write_u32::<BigEndian>(v).expect("write to Vec never fails");
    }

    pub fn write_u64_be(&mut self, v: u64) {
        self.buf.write_u64::<BigEndian>(v).expect("write to Vec never fails");
    }

    pub fn write_bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    /// u8-length-prefixed UTF-8 string.
    pub fn write_str_u8(&mut self, s: &str) {
        self.write_u8(s.len() as u8);
        self.write_bytes(s.as_bytes());
    }

    /// u16-length-prefixed UTF-8 string.
    pub fn write_str_u16(&mut self, s: &str) {
        self.write_u16_be(s.len() as u16);
        self.write_bytes(s.as_bytes());
    }
}

/// CRC-32 over an arbitrary buffer (payload-only, never the header).
pub fn crc32(data: &[u8]) -> u32 {
    let mut h = crc32fast::Hasher::new();
    h.update(data);
    h.finalize()
}

/// SHA-256 over an arbitrary buffer.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

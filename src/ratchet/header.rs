//! Living-cipher header v3: binary-framed, self-describing length.
//!
//! ```text
//! magic "H4LC3"(5) ‖ suite_len(u8) ‖ suite(utf-8, suite_len bytes) ‖
//! counter(u64 BE) ‖ prev_transcript(32) ‖ flags(u8) ‖ [dh_pub(32) if flags&0x01]
//! ```
//!
//! Resolves the container's header/ciphertext split Open Question as
//! option (b): the header's own declared fields determine its exact
//! length, so a reader never guesses a fixed window (the original
//! Python reader's `header_size = 128` approximation is not ported).

use crate::bytes_codec::{ByteReader, ByteWriter};
use crate::error::{H4mkError, Result};

pub const MAGIC_V3: &[u8; 5] = b"H4LC3";

/// flags bit 0: `dh_pub` is present.
pub const FLAG_DH_PRESENT: u8 = 0x01;

#[derive(Debug, Clone)]
pub struct HeaderV3 {
    pub suite: String,
    pub counter: u64,
    pub prev_transcript: [u8; 32],
    pub flags: u8,
    pub dh_pub: Option<[u8; 32]>,
}

impl HeaderV3 {
    pub fn dh_present(&self) -> bool {
        self.flags & FLAG_DH_PRESENT != 0
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(MAGIC_V3);
        w.write_str_u8(&self.suite);
        w.write_u64_be(self.counter);
        w.write_bytes(&self.prev_transcript);
        w.write_u8(self.flags);
        if let Some(dh) = self.dh_pub {
            w.write_bytes(&dh);
        }
        w.into_inner()
    }

    /// Parse the header and return it along with the exact number of
    /// bytes it occupies, so the caller can split `(header, ciphertext)`
    /// out of a single encrypted `CORE` payload without a side-channel
    /// length prefix. Unknown flag bits are rejected; unknown trailing
    /// bytes beyond the declared fields are tolerated (forward
    /// compatibility, per spec's design notes) but never consumed here —
    /// the caller treats everything after the returned length as
    /// ciphertext, not as part of this header.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let mut r = ByteReader::new(buf);
        let magic = r.read_exact_bytes(5)?;
        if magic != MAGIC_V3 {
            return Err(H4mkError::BadInput("not an H4LC3 header".into()));
        }
        let suite = r.read_str_u8()?;
        let counter = r.read_u64_be()?;
        let prev_transcript = r.read_array32()?;
        let flags = r.read_u8()?;
        if flags & !FLAG_DH_PRESENT != 0 {
            return Err(H4mkError::BadInput(format!("unknown cipher header flag bits in {flags:#04x}")));
        }
        let dh_pub = if flags & FLAG_DH_PRESENT != 0 {
            Some(r.read_array32()?)
        } else {
            None
        };
        let consumed = r.position() as usize;
        Ok((
            Self { suite, counter, prev_transcript, flags, dh_pub },
            consumed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_without_dh() {
        let h = HeaderV3 {
            suite: "H4-LIVING-AESGCM-HKDF-SHA256-v3".to_string(),
            counter: 7,
            prev_transcript: [0x11; 32],
            flags: 0,
            dh_pub: None,
        };
        let bytes = h.encode();
        let (parsed, consumed) = HeaderV3::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.suite, h.suite);
        assert_eq!(parsed.counter, 7);
        assert!(!parsed.dh_present());
    }

    #[test]
    fn header_roundtrip_with_dh() {
        let h = HeaderV3 {
            suite: "H4-LIVING-AESGCM-HKDF-SHA256-v3".to_string(),
            counter: 1024,
            prev_transcript: [0x22; 32],
            flags: FLAG_DH_PRESENT,
            dh_pub: Some([0x33; 32]),
        };
        let bytes = h.encode();
        let (parsed, consumed) = HeaderV3::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert!(parsed.dh_present());
        assert_eq!(parsed.dh_pub, Some([0x33; 32]));
    }

    #[test]
    fn parse_splits_exact_length_leaving_ciphertext_untouched() {
        let h = HeaderV3 {
            suite: "H4-LIVING-AESGCM-HKDF-SHA256-v3".to_string(),
            counter: 0,
            prev_transcript: [0u8; 32],
            flags: 0,
            dh_pub: None,
        };
        let mut combined = h.encode();
        combined.extend_from_slice(b"ciphertext-follows");
        let (_, consumed) = HeaderV3::parse(&combined).unwrap();
        assert_eq!(&combined[consumed..], b"ciphertext-follows");
    }

    #[test]
    fn unknown_flag_bits_are_rejected() {
        let h = HeaderV3 {
            suite: "s".to_string(),
            counter: 0,
            prev_transcript: [0u8; 32],
            flags: 0x80,
            dh_pub: None,
        };
        let bytes = h.encode();
        assert!(matches!(HeaderV3::parse(&bytes), Err(H4mkError::BadInput(_))));
    }
}

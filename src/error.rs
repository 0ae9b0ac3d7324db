//! Crate-wide error taxonomy.
//!
//! One flat enum, not one per module: parsing and integrity failures are
//! fatal for the whole container regardless of which layer noticed them,
//! so callers match on a single type. Module-local errors (compressor,
//! ratchet) convert in with `#[from]`.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum H4mkError {
    #[error("bad magic: not an H4MK container")]
    BadMagic,

    #[error("unsupported container version {0}")]
    BadVersion(u16),

    #[error("truncated input: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    #[error("CRC32 mismatch on chunk {tag:?}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        tag: [u8; 4],
        expected: u32,
        actual: u32,
    },

    #[error("VERI integrity check failed")]
    IntegrityFailure,

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("compression engine seal mismatch: expected ({expected_id}, {expected_fp}), loaded ({loaded_id}, {loaded_fp})")]
    SealMismatch {
        expected_id: String,
        expected_fp: String,
        loaded_id: String,
        loaded_fp: String,
    },

    #[error("cipher suite mismatch: expected {expected}, got {actual}")]
    SuiteMismatch { expected: String, actual: String },

    #[error("replayed or too-old counter {counter} (recv_counter={recv_counter}, ooo_window={ooo_window})")]
    Replay {
        counter: u64,
        recv_counter: u64,
        ooo_window: u64,
    },

    #[error("counter {counter} is too far ahead of recv_counter={recv_counter} (ooo_window={ooo_window})")]
    TooFar {
        counter: u64,
        recv_counter: u64,
        ooo_window: u64,
    },

    #[error("transcript mismatch on in-order message (counter={counter})")]
    TranscriptMismatch { counter: u64 },

    #[error("AEAD authentication failed")]
    Auth,

    #[error("no keyframe found for track {track_id:?} at or before pts_us={t_us}")]
    NoSeed { track_id: String, t_us: u64 },

    #[error("block index {index} out of range (container has {count} CORE chunks)")]
    OutOfRange { index: u32, count: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, H4mkError>;

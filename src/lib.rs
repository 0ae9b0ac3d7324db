//! # h4mk — H4MK container format and living cipher reference implementation
//!
//! Format guarantees:
//! - Every integer on the wire is big-endian; never negotiated.
//! - Every chunk is self-describing: tag, length, CRC32, payload.
//! - Every chunk carries a mandatory CRC32; a mismatch aborts parsing.
//! - The optional `VERI` chunk, when present, is SHA-256 over every
//!   preceding chunk's on-the-wire bytes and must be the container's last
//!   chunk.
//! - The compression engine's identity (id + fingerprint) is folded into
//!   `META` before `VERI` is computed; swapping engines changes the hash.
//! - Encrypted `CORE` payloads carry a self-describing living-cipher
//!   header (`H4LC3`); no external header-length side channel is needed.
//! - The container can be scanned forward from byte 8 without `TRAK`/
//!   `SEEKM`, because every chunk is independently length-prefixed and
//!   CRC'd (see [`recovery`]).

pub mod error;
pub mod bytes_codec;
pub mod chunks;
pub mod compressor;
pub mod crypto;
pub mod ratchet;
pub mod seek_index;
pub mod container;
pub mod decode_chain;
pub mod adapter;
pub mod recovery;

pub use error::{H4mkError, Result};
pub use chunks::{Chunk, ChunkInfo};
pub use container::writer::{ContainerWriter, WriteOptions};
pub use container::reader::ContainerReader;
pub use compressor::{CompressionEngine, EngineInfo, RleEngine};
pub use ratchet::{LivingState, RatchetParams};
pub use seek_index::{Seekm, TrakEntry};
pub use decode_chain::{decode_chain, ChainStep, DecodeChain};
pub use adapter::{BlockHeaderInfo, VideoAdapter, PassThroughAdapter};

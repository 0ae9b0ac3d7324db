//! Container assembly: compress, optionally encrypt, and chunk a sequence
//! of blocks in `(pts_us, track_id)` order, then seal the stream with a
//! trailing `VERI` hash.
//!
//! Grounded on `original_source/container/multitrack.py`'s writer loop
//! (compress → cipher → emit CORE → append TRAK/SEEKM) and the teacher's
//! `archive.rs` append-and-seal shape, generalized from a single payload
//! stream to the canonical `CORE*, SEEK, META, SAFE, VERI` sequence.

use std::collections::BTreeMap;

use base64::prelude::{Engine, BASE64_STANDARD};

use crate::bytes_codec::{sha256, ByteWriter};
use crate::chunks::{Chunk, TAG_CORE, TAG_META, TAG_SAFE, TAG_SEEK, TAG_VERI, MAGIC, VERSION};
use crate::compressor::CompressionEngine;
use crate::crypto::aad::AadContext;
use crate::error::Result;
use crate::ratchet::LivingState;
use crate::seek_index::{BlockKindTag, Seekm, TrakEntry};

/// Producer-supplied metadata folded into `META`. Policy scopes mirror
/// `original_source/container/safe_policy.py`'s flat string-set model
/// rather than a bespoke enum, so new scopes never require a schema bump.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub producer: String,
    pub created_at_unix: i64,
    pub safe_scopes: Vec<String>,
    /// Whether to also emit the flat `SEEK` chunk (redundant with META's
    /// embedded SEEKM, but useful for a reader that wants seek data
    /// without parsing JSON). Per spec §3 it "may be empty when
    /// multi-track" — this crate always emits the same table both places
    /// when `true`, and an empty `SEEK` chunk when `false`.
    pub include_seek_chunk: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            producer: "h4mk".to_string(),
            created_at_unix: 0,
            safe_scopes: Vec::new(),
            include_seek_chunk: true,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct MetaPayload {
    pub producer: String,
    pub created_at_unix: i64,
    pub compression: crate::compressor::EngineInfo,
    pub attestation: crate::compressor::Attestation,
    pub encrypted: bool,
    /// Hex of the container-identity seed bound into every encrypted
    /// block's AAD (see [`ContainerWriter::new`]); absent meaning when
    /// `encrypted` is `false`.
    pub container_id_hex: String,
    pub seekm_b64: String,
    pub trak_b64: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct SafePayload {
    pub scopes: Vec<String>,
}

/// Assembles a container one block at a time. Owns the cipher state
/// exclusively for the lifetime of the write, since `encrypt` is strictly
/// sequential (spec §5) — there is no way to add blocks concurrently.
pub struct ContainerWriter {
    engine: Box<dyn CompressionEngine>,
    cipher: Option<LivingState>,
    container_id: [u8; 32],
    core_chunks: Vec<Chunk>,
    trak: Vec<TrakEntry>,
    options: WriteOptions,
}

impl ContainerWriter {
    /// `container_id` binds every block's AAD to this specific container
    /// build. It is derived from the header and producer metadata before
    /// any block is written, not from the trailing `VERI` hash — binding
    /// to `VERI` itself is circular, since `VERI` is only known after all
    /// `CORE` bytes (including ciphertext) exist.
    pub fn new(
        engine: Box<dyn CompressionEngine>,
        cipher: Option<LivingState>,
        options: WriteOptions,
    ) -> Self {
        let mut seed = ByteWriter::new();
        seed.write_bytes(MAGIC);
        seed.write_u16_be(VERSION);
        seed.write_u16_be(0);
        seed.write_bytes(options.producer.as_bytes());
        seed.write_u64_be(options.created_at_unix as u64);
        let container_id = sha256(&seed.into_inner());

        Self {
            engine,
            cipher,
            container_id,
            core_chunks: Vec::new(),
            trak: Vec::new(),
            options,
        }
    }

    pub fn container_id_hex(&self) -> String {
        hex::encode(self.container_id)
    }

    /// Compress (and, if a cipher was supplied, encrypt) `payload`, emit
    /// its `CORE` chunk, and append the corresponding `TRAK`/`SEEKM`
    /// entries. Callers must add blocks already in `(pts_us ascending,
    /// track_id ascending)` order — the writer does not re-sort, since
    /// that order is also the cipher's sequential encrypt order.
    pub fn add_block(
        &mut self,
        track_id: &str,
        pts_us: u64,
        kind: BlockKindTag,
        keyframe: bool,
        payload: &[u8],
    ) -> Result<()> {
        let compressed = self.engine.compress(payload)?;
        let core_index = self.core_chunks.len() as u32;
        let info = self.engine.info();

        let chunk_payload = if let Some(cipher) = self.cipher.as_mut() {
            let aad = AadContext {
                engine_id: &info.engine_id,
                fingerprint_hex: &info.fingerprint,
                container_id_hex: &hex::encode(self.container_id),
                track_id,
                pts_us,
                chunk_index: core_index,
            }
            .build();
            let (header_bytes, ciphertext) = cipher.encrypt(&compressed, &aad)?;
            let mut w = ByteWriter::new();
            w.write_bytes(&header_bytes);
            w.write_bytes(&ciphertext);
            w.into_inner()
        } else {
            compressed
        };

        self.core_chunks.push(Chunk::new(TAG_CORE, chunk_payload));
        self.trak.push(TrakEntry {
            track_id: track_id.to_string(),
            pts_us,
            kind,
            keyframe,
            core_index,
        });
        Ok(())
    }

    /// Finish the container: emit `SEEK`, `META`, `SAFE`, then `VERI` over
    /// everything written so far, in order.
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        for chunk in &self.core_chunks {
            out.extend(chunk.encode());
        }

        let seekm = Seekm::from_trak(&self.trak);
        let seekm_bytes = seekm.encode();
        let seek_chunk = Chunk::new(
            TAG_SEEK,
            if self.options.include_seek_chunk { seekm_bytes.clone() } else { Vec::new() },
        );
        out.extend(seek_chunk.encode());

        let info = self.engine.info();
        let attestation = crate::compressor::attest(&info, self.options.created_at_unix);
        let meta = MetaPayload {
            producer: self.options.producer.clone(),
            created_at_unix: self.options.created_at_unix,
            compression: info,
            attestation,
            encrypted: self.cipher.is_some(),
            container_id_hex: hex::encode(self.container_id),
            seekm_b64: BASE64_STANDARD.encode(&seekm_bytes),
            trak_b64: BASE64_STANDARD.encode(serde_json::to_vec(&self.trak)?),
        };
        let meta_chunk = Chunk::new(TAG_META, serde_json::to_vec(&meta)?);
        out.extend(meta_chunk.encode());

        let safe = SafePayload { scopes: self.options.safe_scopes.clone() };
        let safe_chunk = Chunk::new(TAG_SAFE, serde_json::to_vec(&safe)?);
        out.extend(safe_chunk.encode());

        // VERI covers only the preceding chunks' on-the-wire bytes, not
        // the 8-byte container header (spec §4.6/§6).
        let veri = sha256(&out[8..]);
        let veri_chunk = Chunk::new(TAG_VERI, veri.to_vec());
        out.extend(veri_chunk.encode());

        Ok(out)
    }

    /// Tracks declared so far, by first-seen order — exposed for CLI
    /// manifest rendering without re-parsing TRAK.
    pub fn tracks(&self) -> Vec<String> {
        let mut seen = BTreeMap::new();
        for e in &self.trak {
            seen.entry(e.track_id.clone()).or_insert(());
        }
        seen.into_keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::RleEngine;
    use crate::container::reader::ContainerReader;

    fn options() -> WriteOptions {
        WriteOptions { created_at_unix: 1_700_000_000, ..Default::default() }
    }

    #[test]
    fn plain_roundtrip_three_blocks_single_track() {
        let mut w = ContainerWriter::new(Box::new(RleEngine), None, options());
        w.add_block("video_main", 0, BlockKindTag::I, true, b"aaaa").unwrap();
        w.add_block("video_main", 1000, BlockKindTag::P, false, b"bbbb").unwrap();
        w.add_block("video_main", 2000, BlockKindTag::P, false, b"cccc").unwrap();
        let bytes = w.finish().unwrap();

        let reader = ContainerReader::parse(&bytes).unwrap();
        assert!(reader.verify_integrity().unwrap());
        assert_eq!(reader.trak().len(), 3);
        let blocks: Vec<_> = reader.iter_core_blocks(true, None).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(blocks[0], b"aaaa");
        assert_eq!(blocks[2], b"cccc");
    }

    #[test]
    fn encrypted_roundtrip() {
        let secret = [0x42u8; 32];
        let cipher = LivingState::init_from_shared_secret(&secret, b"test", Default::default());
        let mut w = ContainerWriter::new(Box::new(RleEngine), Some(cipher), options());
        w.add_block("video_main", 0, BlockKindTag::I, true, b"secret-frame").unwrap();
        let container_id_hex = w.container_id_hex();
        let bytes = w.finish().unwrap();

        let mut peer = LivingState::init_peer_from_shared_secret(&secret, b"test", Default::default());
        let reader = ContainerReader::parse(&bytes).unwrap();
        let info = RleEngine.info();
        let aad = AadContext {
            engine_id: &info.engine_id,
            fingerprint_hex: &info.fingerprint,
            container_id_hex: &container_id_hex,
            track_id: "video_main",
            pts_us: 0,
            chunk_index: 0,
        }
        .build();
        let plaintext = reader.decrypt_core_block(0, &mut peer, &aad).unwrap();
        assert_eq!(RleEngine.decompress(&plaintext).unwrap(), b"secret-frame");
    }
}

//! The living cipher: a forward-secure AEAD ratchet with transcript
//! binding, a bounded out-of-order cache, and periodic X25519 root
//! re-keying.
//!
//! Ported from `original_source/crypto/living_cipher.py` with the Rust
//! AEAD call style (explicit nonce, `aes_gcm` crate) taken from the
//! teacher's `crypto::encrypt`/`decrypt`. Unidirectional contract only
//! (one sender, one receiver) — see the crate-level Open Question note
//! in `DESIGN.md`.

pub mod header;

use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand_core::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::bytes_codec::sha256;
use crate::error::{H4mkError, Result};
use header::{HeaderV3, FLAG_DH_PRESENT};

pub const SUITE: &str = "H4-LIVING-AESGCM-HKDF-SHA256-v3";

/// `ooo_window` / `root_ratchet_every` — see [`LivingState`].
#[derive(Debug, Clone, Copy)]
pub struct RatchetParams {
    pub ooo_window: u64,
    pub root_ratchet_every: u64,
}

impl Default for RatchetParams {
    fn default() -> Self {
        Self { ooo_window: 32, root_ratchet_every: 1024 }
    }
}

/// Ratchet state. Not `Clone`/`Copy` by design — a ratchet state is
/// exclusively owned by its caller for the duration of any encrypt or
/// decrypt call (spec §5).
pub struct LivingState {
    pub root_key: [u8; 32],
    pub chain_key_send: [u8; 32],
    pub chain_key_recv: [u8; 32],
    pub send_counter: u64,
    pub recv_counter: u64,
    pub transcript: [u8; 32],
    pub suite: String,
    pub ooo_window: u64,
    pub root_ratchet_every: u64,
    skipped_keys: HashMap<u64, [u8; 32]>,
    dh_priv: StaticSecret,
    remote_dh_pub: Option<[u8; 32]>,
}

fn hkdf_expand(key_material: &[u8], info: &[u8], out_len: usize) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(None, key_material);
    let mut okm = vec![0u8; out_len];
    hk.expand(info, &mut okm).expect("HKDF output length is within RFC5869 bounds");
    okm
}

fn hkdf32(key_material: &[u8], info: &[u8]) -> [u8; 32] {
    hkdf_expand(key_material, info, 32).try_into().unwrap()
}

impl LivingState {
    /// Initialize from a 32-byte pre-shared secret and a context string.
    /// `root = HKDF(s, ctx|"root")`; `chain_send/recv` derive from root.
    /// Transcript starts at 32 zero bytes; counters at 0; a fresh X25519
    /// keypair is generated; no remote public key is known yet.
    pub fn init_from_shared_secret(shared_secret: &[u8; 32], context: &[u8], params: RatchetParams) -> Self {
        let mut root_info = context.to_vec();
        root_info.extend_from_slice(b"|root");
        let root_key = hkdf32(shared_secret, &root_info);

        let mut send_info = context.to_vec();
        send_info.extend_from_slice(b"|ck_send");
        let chain_key_send = hkdf32(&root_key, &send_info);

        let mut recv_info = context.to_vec();
        recv_info.extend_from_slice(b"|ck_recv");
        let chain_key_recv = hkdf32(&root_key, &recv_info);

        Self {
            root_key,
            chain_key_send,
            chain_key_recv,
            send_counter: 0,
            recv_counter: 0,
            transcript: [0u8; 32],
            suite: SUITE.to_string(),
            ooo_window: params.ooo_window,
            root_ratchet_every: params.root_ratchet_every,
            skipped_keys: HashMap::new(),
            dh_priv: StaticSecret::random_from_rng(OsRng),
            remote_dh_pub: None,
        }
    }

    /// Build a peer state for tests/tools: same root derivation, with
    /// send/recv chain keys swapped so messages sent by one state decrypt
    /// on the other. There is no library-level "peer" constructor beyond
    /// this — see the unidirectional-only Open Question decision.
    pub fn init_peer_from_shared_secret(shared_secret: &[u8; 32], context: &[u8], params: RatchetParams) -> Self {
        let mut s = Self::init_from_shared_secret(shared_secret, context, params);
        std::mem::swap(&mut s.chain_key_send, &mut s.chain_key_recv);
        s
    }

    fn ratchet_ctx(&self) -> Vec<u8> {
        let mut ctx = self.suite.as_bytes().to_vec();
        ctx.extend_from_slice(b"|ratchet");
        ctx
    }

    fn chain_step(chain_key: &[u8; 32], ctx: &[u8], counter: u64) -> ([u8; 32], [u8; 32]) {
        let mut ck_info = ctx.to_vec();
        ck_info.extend_from_slice(b"|ck|");
        ck_info.extend_from_slice(&counter.to_be_bytes());
        let next_ck = hkdf32(chain_key, &ck_info);

        let mut mk_info = ctx.to_vec();
        mk_info.extend_from_slice(b"|mk|");
        mk_info.extend_from_slice(&counter.to_be_bytes());
        let mk = hkdf32(chain_key, &mk_info);

        (next_ck, mk)
    }

    fn derive_nonce(mk: &[u8; 32], counter: u64) -> [u8; 12] {
        let mut info = b"nonce|".to_vec();
        info.extend_from_slice(&counter.to_be_bytes());
        hkdf_expand(mk, &info, 12).try_into().unwrap()
    }

    fn mix_root(&mut self, dh_shared: &[u8; 32]) {
        let mut material = self.root_key.to_vec();
        material.extend_from_slice(dh_shared);
        let mut info = self.suite.as_bytes().to_vec();
        info.extend_from_slice(b"|root_mix");
        self.root_key = hkdf32(&material, &info);

        let mut send_info = self.suite.as_bytes().to_vec();
        send_info.extend_from_slice(b"|ck_send");
        self.chain_key_send = hkdf32(&self.root_key, &send_info);

        let mut recv_info = self.suite.as_bytes().to_vec();
        recv_info.extend_from_slice(b"|ck_recv");
        self.chain_key_recv = hkdf32(&self.root_key, &recv_info);

        self.skipped_keys.clear();
    }

    fn evict_skipped(&mut self) {
        let low = self.recv_counter.saturating_sub(self.ooo_window);
        let high = self.recv_counter + self.ooo_window;
        self.skipped_keys.retain(|&k, _| k >= low && k <= high);
    }

    fn precompute_skipped_keys(&mut self, target_counter: u64) {
        let ctx = self.ratchet_ctx();
        let mut temp_ck = self.chain_key_recv;
        for i in self.recv_counter..=target_counter {
            let (next_ck, mk) = Self::chain_step(&temp_ck, &ctx, i);
            self.skipped_keys.insert(i, mk);
            temp_ck = next_ck;
        }
        self.evict_skipped();
    }

    fn should_root_ratchet(&self) -> bool {
        self.root_ratchet_every > 0
            && self.send_counter > 0
            && self.send_counter % self.root_ratchet_every == 0
    }

    fn aead_encrypt(mk: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(mk).map_err(|_| H4mkError::Auth)?;
        cipher
            .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
            .map_err(|_| H4mkError::Auth)
    }

    fn aead_decrypt(mk: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(mk).map_err(|_| H4mkError::Auth)?;
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| H4mkError::Auth)
    }

    /// Encrypt `plaintext` under `aad`. Returns `(header_bytes, ciphertext)`.
    /// Strictly sequential: the Nth call produces the Nth header.
    pub fn encrypt(&mut self, plaintext: &[u8], aad: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut dh_pub = None;
        if self.should_root_ratchet() {
            let fresh_priv = StaticSecret::random_from_rng(OsRng);
            let fresh_pub = PublicKey::from(&fresh_priv);
            dh_pub = Some(*fresh_pub.as_bytes());

            if let Some(remote) = self.remote_dh_pub {
                let shared = fresh_priv.diffie_hellman(&PublicKey::from(remote));
                self.dh_priv = fresh_priv;
                self.mix_root(shared.as_bytes());
            } else {
                self.dh_priv = fresh_priv;
            }
        }

        let ctx = self.ratchet_ctx();
        let (next_ck, mk) = Self::chain_step(&self.chain_key_send, &ctx, self.send_counter);
        self.chain_key_send = next_ck;

        let nonce = Self::derive_nonce(&mk, self.send_counter);

        let header = HeaderV3 {
            suite: self.suite.clone(),
            counter: self.send_counter,
            prev_transcript: self.transcript,
            flags: if dh_pub.is_some() { FLAG_DH_PRESENT } else { 0 },
            dh_pub,
        };
        let header_bytes = header.encode();

        let mut full_aad = aad.to_vec();
        full_aad.extend_from_slice(&header_bytes);
        let ct = Self::aead_encrypt(&mk, &nonce, plaintext, &full_aad)?;

        self.transcript = sha256(&[&self.transcript[..], &sha256(&header_bytes)[..], &sha256(&ct)[..]].concat());
        self.send_counter += 1;

        Ok((header_bytes, ct))
    }

    /// Decrypt `(header, ciphertext)` under `aad`. See spec §4.3 for the
    /// exact branch order: suite check, DH mix, replay/too-far bounds,
    /// skipped-key cache, then the in-order transcript-checked path.
    pub fn decrypt(&mut self, header_bytes: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let (header, _consumed) = HeaderV3::parse(header_bytes)?;

        if header.suite != self.suite {
            return Err(H4mkError::SuiteMismatch { expected: self.suite.clone(), actual: header.suite });
        }

        if let Some(dh_pub) = header.dh_pub {
            self.remote_dh_pub = Some(dh_pub);
            let shared = self.dh_priv.diffie_hellman(&PublicKey::from(dh_pub));
            self.mix_root(shared.as_bytes());
        }

        let counter = header.counter;
        let mut full_aad = aad.to_vec();
        full_aad.extend_from_slice(header_bytes);

        if counter < self.recv_counter.saturating_sub(self.ooo_window) {
            return Err(H4mkError::Replay { counter, recv_counter: self.recv_counter, ooo_window: self.ooo_window });
        }

        if let Some(mk) = self.skipped_keys.remove(&counter) {
            let nonce = Self::derive_nonce(&mk, counter);
            return Self::aead_decrypt(&mk, &nonce, ciphertext, &full_aad);
        }

        if counter > self.recv_counter {
            if counter - self.recv_counter > self.ooo_window {
                return Err(H4mkError::TooFar { counter, recv_counter: self.recv_counter, ooo_window: self.ooo_window });
            }
            self.precompute_skipped_keys(counter);
            let mk = self.skipped_keys.remove(&counter).expect("just precomputed");
            let nonce = Self::derive_nonce(&mk, counter);
            let pt = Self::aead_decrypt(&mk, &nonce, ciphertext, &full_aad)?;
            self.evict_skipped();
            return Ok(pt);
        }

        // In-order: counter == recv_counter.
        if header.prev_transcript != self.transcript {
            return Err(H4mkError::TranscriptMismatch { counter });
        }

        let ctx = self.ratchet_ctx();
        let (next_ck, mk) = Self::chain_step(&self.chain_key_recv, &ctx, self.recv_counter);
        let nonce = Self::derive_nonce(&mk, self.recv_counter);
        let pt = Self::aead_decrypt(&mk, &nonce, ciphertext, &full_aad)?;

        self.chain_key_recv = next_ck;
        self.transcript = sha256(&[&self.transcript[..], &sha256(header_bytes)[..], &sha256(ciphertext)[..]].concat());
        self.recv_counter += 1;
        self.evict_skipped();

        Ok(pt)
    }
}

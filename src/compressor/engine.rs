//! Pluggable native engine ABI.
//!
//! A native engine is described by a `#[repr(C)]` struct of function
//! pointers, the same shape as the teacher's codec plugin ABI: the host
//! never dlopens anything itself here (no path-based loader is wired up,
//! since no real native engine ships with this crate), but the struct and
//! its safe wrapper are the seam a future loader would bind to.
//!
//! # Stability contract
//! - `H4MK_ENGINE_ABI_VERSION` is monotonically increasing, never
//!   decremented.
//! - New fields are appended at the end of [`NativeEngineDescriptor`] only.
//! - A descriptor compiled against ABI version N is compatible with any
//!   host >= N.

use crate::compressor::{CompressionEngine, EngineInfo};
use crate::error::{H4mkError, Result};

pub const H4MK_ENGINE_ABI_VERSION: u32 = 1;

pub mod rc {
    pub const OK: i32 = 0;
    pub const OVERFLOW: i32 = -1;
    pub const CORRUPT: i32 = -2;
    pub const INTERNAL: i32 = -3;
}

/// Frozen C ABI descriptor for a native compression engine.
///
/// # Safety
/// All function pointers are `unsafe extern "C"` because they cross an
/// FFI boundary. [`NativeEngineHandle`] enforces the invariants documented
/// on each field before delegating to the raw pointer.
#[repr(C)]
pub struct NativeEngineDescriptor {
    pub abi_version: u32,

    /// Compress `in_len` bytes from `in_buf` into `out_buf`.
    ///
    /// # Safety
    /// - `in_buf[0..in_len]` must be a valid readable region.
    /// - `out_buf[0..*out_len]` must be a valid writable region.
    /// - The two regions must not overlap; neither pointer is null.
    pub compress: Option<
        unsafe extern "C" fn(
            in_buf: *const u8,
            in_len: u32,
            out_buf: *mut u8,
            out_len: *mut u32,
        ) -> i32,
    >,

    /// Decompress, same buffer-safety contract as `compress`.
    pub decompress: Option<
        unsafe extern "C" fn(
            in_buf: *const u8,
            in_len: u32,
            out_buf: *mut u8,
            out_len: *mut u32,
        ) -> i32,
    >,

    /// Upper bound on compressed output size for `in_len` input bytes.
    /// Must be pure: deterministic, no I/O, no global state.
    pub compress_bound: Option<unsafe extern "C" fn(in_len: u32) -> u32>,
}

// Safety: the ABI contract declares all fn pointers reentrant.
unsafe impl Send for NativeEngineDescriptor {}
unsafe impl Sync for NativeEngineDescriptor {}

/// Safe wrapper around a loaded [`NativeEngineDescriptor`], carrying the
/// identity this crate folds into `META` and the AAD context string.
pub struct NativeEngineHandle {
    desc: &'static NativeEngineDescriptor,
    engine_id: String,
    fingerprint: [u8; 32],
}

impl NativeEngineHandle {
    pub fn new(
        desc: &'static NativeEngineDescriptor,
        engine_id: impl Into<String>,
        fingerprint: [u8; 32],
    ) -> Result<Self> {
        if desc.abi_version > H4MK_ENGINE_ABI_VERSION {
            return Err(H4mkError::BadInput(format!(
                "native engine ABI version {} is newer than host ABI version {}",
                desc.abi_version, H4MK_ENGINE_ABI_VERSION,
            )));
        }
        Ok(Self { desc, engine_id: engine_id.into(), fingerprint })
    }
}

impl CompressionEngine for NativeEngineHandle {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let f = self
            .desc
            .compress
            .ok_or_else(|| H4mkError::BadInput("native engine missing compress fn".into()))?;
        let bound_fn = self.desc.compress_bound.ok_or_else(|| {
            H4mkError::BadInput("native engine missing compress_bound fn".into())
        })?;
        let cap = unsafe { bound_fn(data.len() as u32) } as usize;
        let mut out = vec![0u8; cap];
        let mut out_len = cap as u32;
        let code = unsafe { f(data.as_ptr(), data.len() as u32, out.as_mut_ptr(), &mut out_len) };
        if code != rc::OK {
            return Err(H4mkError::BadInput(format!("native engine compress returned {code}")));
        }
        out.truncate(out_len as usize);
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let f = self
            .desc
            .decompress
            .ok_or_else(|| H4mkError::BadInput("native engine missing decompress fn".into()))?;
        // Unknown output size; probe with a generous multiple, matching
        // the bounded-retry pattern the descriptor's rc::OVERFLOW enables.
        let mut cap = data.len().max(64) * 4;
        loop {
            let mut out = vec![0u8; cap];
            let mut out_len = cap as u32;
            let code =
                unsafe { f(data.as_ptr(), data.len() as u32, out.as_mut_ptr(), &mut out_len) };
            match code {
                rc::OK => {
                    out.truncate(out_len as usize);
                    return Ok(out);
                }
                rc::OVERFLOW => {
                    cap *= 2;
                    continue;
                }
                other => {
                    return Err(H4mkError::BadInput(format!(
                        "native engine decompress returned {other}"
                    )))
                }
            }
        }
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            engine: "native".to_string(),
            engine_id: self.engine_id.clone(),
            fingerprint: hex::encode(self.fingerprint),
            deterministic: true,
            identity_safe: true,
            sealed: true,
        }
    }
}

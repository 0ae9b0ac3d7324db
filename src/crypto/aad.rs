//! Context-bound AAD: prevents an encrypted `CORE` block from being
//! transplanted to another container position, track, or timestamp.
//!
//! Format: `"H4MK|" engine_id "|" fingerprint_hex "|" container_id_hex "|"
//! track_id "|" pts_us "|" chunk_index`; every field that identifies this
//! block's unique slot is bound in. `container_id_hex` binds to the
//! container's identity seed rather than the trailing `VERI` hash — see
//! the Open Question note in `DESIGN.md` on why `VERI` itself can't be
//! used here.

pub struct AadContext<'a> {
    pub engine_id: &'a str,
    pub fingerprint_hex: &'a str,
    pub container_id_hex: &'a str,
    pub track_id: &'a str,
    pub pts_us: u64,
    pub chunk_index: u32,
}

impl<'a> AadContext<'a> {
    pub fn build(&self) -> Vec<u8> {
        format!(
            "H4MK|{}|{}|{}|{}|{}|{}",
            self.engine_id,
            self.fingerprint_hex,
            self.container_id_hex,
            self.track_id,
            self.pts_us,
            self.chunk_index,
        )
        .into_bytes()
    }
}

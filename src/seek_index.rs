//! Seek index: a JSON block descriptor table (`TRAK`) and a compact binary
//! per-track keyframe table (`SEEKM`), both embedded base64 inside `META`.
//!
//! `TRAK` carries one entry per `CORE` chunk in container order and is the
//! thing `decode_chain` scans forward through. `SEEKM` only ever names
//! keyframes, so a seek is a binary search over a short list followed by a
//! forward scan from the nearest keyframe at or before the target time —
//! grounded on `original_source/container/seek.py::SeekTable.seek` (the
//! bisection) and `multitrack.py`'s `build_seek_per_track` (the grouping by
//! track before the table is built).

use std::collections::BTreeMap;

use crate::bytes_codec::{ByteReader, ByteWriter};
use crate::error::{H4mkError, Result};

/// One block's position in the decode chain, as carried in `TRAK`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrakEntry {
    pub track_id: String,
    pub pts_us: u64,
    pub kind: BlockKindTag,
    pub keyframe: bool,
    /// Index of this entry's `CORE` chunk among all `CORE` chunks, in
    /// container order.
    pub core_index: u32,
}

/// Block-type discriminant as it appears on the wire. The packed GOP-flags
/// byte the original source carries alongside this (run length, reference
/// distance) is not reproduced — `keyframe` plus this tag already carry
/// everything `decode_chain` needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlockKindTag {
    I,
    P,
    B,
}

impl BlockKindTag {
    fn as_u8(self) -> u8 {
        match self {
            BlockKindTag::I => 0,
            BlockKindTag::P => 1,
            BlockKindTag::B => 2,
        }
    }

    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(BlockKindTag::I),
            1 => Ok(BlockKindTag::P),
            2 => Ok(BlockKindTag::B),
            other => Err(H4mkError::BadInput(format!("unknown block kind tag {other}"))),
        }
    }
}

/// A single track's keyframe table: `pts_us` in strictly ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSeekTable {
    pub entries: Vec<(u64, u32)>, // (pts_us, core_index), ascending pts_us
}

impl TrackSeekTable {
    /// Largest `pts_us <= t_us`, or `None` if every entry is after `t_us`
    /// (or the table is empty).
    pub fn seek(&self, t_us: u64) -> Option<u32> {
        match self.entries.binary_search_by_key(&t_us, |(pts, _)| *pts) {
            Ok(i) => Some(self.entries[i].1),
            Err(0) => None,
            Err(i) => Some(self.entries[i - 1].1),
        }
    }
}

/// `SEEKM`: one keyframe table per track.
///
/// Wire layout (all fields big-endian):
/// ```text
/// track_count(u32) ‖ per track {
///   id_len(u16) ‖ id(UTF-8, id_len bytes) ‖ entry_count(u32) ‖ per entry {
///     pts_us(u64) ‖ core_index(u32)
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seekm {
    pub tracks: BTreeMap<String, TrackSeekTable>,
}

impl Seekm {
    /// Build a `SEEKM` table from a `TRAK` list by keeping only the entries
    /// marked `keyframe`, grouped and ordered by `track_id`.
    pub fn from_trak(entries: &[TrakEntry]) -> Self {
        let mut tracks: BTreeMap<String, TrackSeekTable> = BTreeMap::new();
        for e in entries {
            if e.keyframe {
                tracks
                    .entry(e.track_id.clone())
                    .or_default()
                    .entries
                    .push((e.pts_us, e.core_index));
            }
        }
        for table in tracks.values_mut() {
            table.entries.sort_by_key(|(pts, _)| *pts);
        }
        Self { tracks }
    }

    pub fn seek(&self, track_id: &str, t_us: u64) -> Option<u32> {
        self.tracks.get(track_id).and_then(|t| t.seek(t_us))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u32_be(self.tracks.len() as u32);
        for (id, table) in &self.tracks {
            w.write_str_u16(id);
            w.write_u32_be(table.entries.len() as u32);
            for (pts_us, core_index) in &table.entries {
                w.write_u64_be(*pts_us);
                w.write_u32_be(*core_index);
            }
        }
        w.into_inner()
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(buf);
        let track_count = r.read_u32_be()?;
        let mut tracks = BTreeMap::new();
        for _ in 0..track_count {
            let id = r.read_str_u16()?;
            let entry_count = r.read_u32_be()?;
            let mut entries = Vec::with_capacity(entry_count as usize);
            for _ in 0..entry_count {
                let pts_us = r.read_u64_be()?;
                let core_index = r.read_u32_be()?;
                entries.push((pts_us, core_index));
            }
            tracks.insert(id, TrackSeekTable { entries });
        }
        Ok(Self { tracks })
    }
}

/// Encode a `TrakEntry` list (canonical, non-compact `TRAK` chunk payload
/// before base64 embedding) with a single-byte kind tag instead of the
/// serde enum's tag string, matching `SEEKM`'s wire density. `TRAK` itself
/// is carried as JSON (see `container::writer`), so this is only used when
/// a caller wants the compact binary form for testing parity with `SEEKM`.
pub fn encode_kind(kind: BlockKindTag) -> u8 {
    kind.as_u8()
}

pub fn decode_kind(v: u8) -> Result<BlockKindTag> {
    BlockKindTag::from_u8(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(track: &str, pts_us: u64, kind: BlockKindTag, keyframe: bool, core_index: u32) -> TrakEntry {
        TrakEntry { track_id: track.to_string(), pts_us, kind, keyframe, core_index }
    }

    #[test]
    fn seekm_roundtrip() {
        let entries = vec![
            entry("v", 0, BlockKindTag::I, true, 0),
            entry("v", 1000, BlockKindTag::P, false, 1),
            entry("v", 2000, BlockKindTag::I, true, 2),
            entry("a", 0, BlockKindTag::I, true, 0),
        ];
        let seekm = Seekm::from_trak(&entries);
        let bytes = seekm.encode();
        let decoded = Seekm::decode(&bytes).unwrap();
        assert_eq!(decoded.seek("v", 1500), Some(0));
        assert_eq!(decoded.seek("v", 2500), Some(2));
        assert_eq!(decoded.seek("a", 0), Some(0));
    }

    #[test]
    fn seek_before_first_keyframe_is_none() {
        let entries = vec![entry("v", 5000, BlockKindTag::I, true, 3)];
        let seekm = Seekm::from_trak(&entries);
        assert_eq!(seekm.seek("v", 100), None);
    }

    #[test]
    fn seek_exact_match_returns_that_keyframe() {
        let entries = vec![
            entry("v", 1000, BlockKindTag::I, true, 0),
            entry("v", 2000, BlockKindTag::I, true, 5),
        ];
        let seekm = Seekm::from_trak(&entries);
        assert_eq!(seekm.seek("v", 2000), Some(5));
    }

    #[test]
    fn seek_unknown_track_is_none() {
        let seekm = Seekm::from_trak(&[entry("v", 0, BlockKindTag::I, true, 0)]);
        assert_eq!(seekm.seek("missing", 0), None);
    }

    #[test]
    fn non_keyframe_entries_are_excluded_from_seekm() {
        let entries = vec![
            entry("v", 0, BlockKindTag::I, true, 0),
            entry("v", 500, BlockKindTag::P, false, 1),
        ];
        let seekm = Seekm::from_trak(&entries);
        assert_eq!(seekm.tracks.get("v").unwrap().entries.len(), 1);
    }

    #[test]
    fn kind_tag_roundtrip() {
        for k in [BlockKindTag::I, BlockKindTag::P, BlockKindTag::B] {
            assert!(matches!(decode_kind(encode_kind(k)), Ok(_)));
        }
        assert!(decode_kind(99).is_err());
    }

    proptest::proptest! {
        /// Property: for any ascending sequence of keyframe timestamps,
        /// seeking at or after the last one always resolves to it, and
        /// seeking at the first one's own timestamp resolves to it too.
        #[test]
        fn prop_seek_resolves_to_largest_pts_at_or_before_target(
            count in 1usize..20,
            step in 1u64..10_000,
        ) {
            let entries: Vec<TrakEntry> = (0..count)
                .map(|i| entry("v", i as u64 * step, BlockKindTag::I, true, i as u32))
                .collect();
            let seekm = Seekm::from_trak(&entries);

            let last_pts = (count as u64 - 1) * step;
            prop_assert_eq!(seekm.seek("v", last_pts + step), Some(count as u32 - 1));
            prop_assert_eq!(seekm.seek("v", 0), Some(0));
        }

        /// Property: SEEKM encode/decode round-trips any well-formed table.
        #[test]
        fn prop_seekm_wire_roundtrip(
            count in 0usize..15,
            step in 1u64..5000,
        ) {
            let entries: Vec<TrakEntry> = (0..count)
                .map(|i| entry("track", i as u64 * step, BlockKindTag::I, true, i as u32))
                .collect();
            let seekm = Seekm::from_trak(&entries);
            let decoded = Seekm::decode(&seekm.encode()).unwrap();
            prop_assert_eq!(decoded.tracks, seekm.tracks);
        }
    }
}

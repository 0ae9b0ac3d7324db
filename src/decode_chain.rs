//! GOP-bounded decode-chain resolution.
//!
//! Grounded on `original_source/harmony4_media/mux/h4mk_multitrack.py`'s
//! `get_decode_chain`: resolve the nearest keyframe via the seek index,
//! then scan the block descriptor list forward, collecting same-track
//! entries until the next `I` block (next GOP) or a timestamp past the
//! target.

use crate::container::reader::ContainerReader;
use crate::error::{H4mkError, Result};
use crate::seek_index::BlockKindTag;

/// One step of a resolved decode chain: which `CORE` chunk to fetch next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStep {
    pub core_index: u32,
    pub pts_us: u64,
    pub kind: BlockKindTag,
}

/// A resolved decode chain plus, when it contains a `B`-block, the
/// "next-state" seed an adapter's `apply_b` needs (spec §4.8 point 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeChain {
    pub steps: Vec<ChainStep>,
    /// `core_index` of the next `I`-block on this track, present only
    /// when `steps` contains a `B`-block.
    pub next_state_seed: Option<u32>,
}

/// Resolve the ordered list of `CORE` chunk indices needed to decode
/// `track_id` at `t_us`: the nearest keyframe at or before `t_us`, plus
/// every subsequent same-track block up to `t_us` within the same GOP.
///
/// A decode chain never crosses a GOP boundary (spec's GOP discipline
/// invariant) — the scan stops the moment it sees the next `I` block on
/// this track, even if that block's `pts_us` is still `<= t_us`. When the
/// chain contains a `B`-block, the resolver additionally looks past that
/// stopping point for the next `I`-block on the same track and surfaces
/// its index as `next_state_seed`, since a `B`-block may depend on
/// state beyond `t_us`.
pub fn decode_chain(reader: &ContainerReader, track_id: &str, t_us: u64) -> Result<DecodeChain> {
    let start_index = reader
        .seekm()
        .seek(track_id, t_us)
        .ok_or_else(|| H4mkError::NoSeed { track_id: track_id.to_string(), t_us })?;

    let trak = reader.trak();
    let start_pos = trak
        .iter()
        .position(|e| e.track_id == track_id && e.core_index == start_index)
        .ok_or_else(|| H4mkError::NoSeed { track_id: track_id.to_string(), t_us })?;

    let mut steps = vec![ChainStep {
        core_index: trak[start_pos].core_index,
        pts_us: trak[start_pos].pts_us,
        kind: trak[start_pos].kind,
    }];

    for entry in &trak[start_pos + 1..] {
        if entry.track_id != track_id {
            continue;
        }
        if matches!(entry.kind, BlockKindTag::I) {
            break;
        }
        if entry.pts_us > t_us {
            break;
        }
        steps.push(ChainStep { core_index: entry.core_index, pts_us: entry.pts_us, kind: entry.kind });
    }

    let next_state_seed = if steps.iter().any(|s| matches!(s.kind, BlockKindTag::B)) {
        trak[start_pos + 1..]
            .iter()
            .find(|e| e.track_id == track_id && matches!(e.kind, BlockKindTag::I))
            .map(|e| e.core_index)
    } else {
        None
    };

    Ok(DecodeChain { steps, next_state_seed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::RleEngine;
    use crate::container::writer::{ContainerWriter, WriteOptions};

    fn sample_container() -> Vec<u8> {
        let mut w = ContainerWriter::new(Box::new(RleEngine), None, WriteOptions::default());
        w.add_block("video_main", 0, BlockKindTag::I, true, b"i0").unwrap();
        w.add_block("video_main", 1000, BlockKindTag::P, false, b"p1").unwrap();
        w.add_block("video_main", 2000, BlockKindTag::P, false, b"p2").unwrap();
        w.add_block("video_main", 3000, BlockKindTag::I, true, b"i3").unwrap();
        w.add_block("video_main", 4000, BlockKindTag::P, false, b"p4").unwrap();
        w.finish().unwrap()
    }

    #[test]
    fn chain_includes_keyframe_and_following_p_blocks() {
        let bytes = sample_container();
        let reader = ContainerReader::parse(&bytes).unwrap();
        let chain = decode_chain(&reader, "video_main", 2000).unwrap();
        assert_eq!(chain.steps.iter().map(|c| c.core_index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(chain.next_state_seed, None);
    }

    #[test]
    fn chain_never_crosses_gop_boundary() {
        let bytes = sample_container();
        let reader = ContainerReader::parse(&bytes).unwrap();
        // t_us=4000 resolves to the second GOP's keyframe (index 3) and
        // must stop there plus its own P-block, never reaching back into
        // or somehow spanning the first GOP.
        let chain = decode_chain(&reader, "video_main", 4000).unwrap();
        assert_eq!(chain.steps.iter().map(|c| c.core_index).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn unknown_track_has_no_keyframe() {
        let bytes = sample_container();
        let reader = ContainerReader::parse(&bytes).unwrap();
        assert!(matches!(decode_chain(&reader, "audio_main", 0), Err(H4mkError::NoSeed { .. })));
    }

    #[test]
    fn b_block_in_chain_surfaces_the_next_keyframe_as_the_next_state_seed() {
        let mut w = ContainerWriter::new(Box::new(RleEngine), None, WriteOptions::default());
        w.add_block("video_main", 0, BlockKindTag::I, true, b"i0").unwrap();
        w.add_block("video_main", 1000, BlockKindTag::B, false, b"b1").unwrap();
        w.add_block("video_main", 2000, BlockKindTag::I, true, b"i2").unwrap();
        let bytes = w.finish().unwrap();
        let reader = ContainerReader::parse(&bytes).unwrap();

        let chain = decode_chain(&reader, "video_main", 1000).unwrap();
        assert_eq!(chain.steps.iter().map(|c| c.core_index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(chain.next_state_seed, Some(2));
    }

    #[test]
    fn no_b_block_means_no_next_state_seed_even_when_a_later_keyframe_exists() {
        let bytes = sample_container();
        let reader = ContainerReader::parse(&bytes).unwrap();
        let chain = decode_chain(&reader, "video_main", 2000).unwrap();
        assert_eq!(chain.next_state_seed, None);
    }
}

//! Universal, codec-agnostic block adapter contract.
//!
//! Grounded on `original_source/video/adapter.py`: the container never
//! interprets pixels, tensors, or any model-specific state. An adapter
//! turns an `I` block into opaque state, folds `P`/`B` blocks into it, and
//! renders state back to bytes on request.

use crate::seek_index::BlockKindTag;

/// Public per-block metadata handed to an adapter — mirrors
/// `original_source/video/adapter.py::BlockHeader`.
#[derive(Debug, Clone)]
pub struct BlockHeaderInfo {
    pub track_id: String,
    pub pts_us: u64,
    pub kind: BlockKindTag,
    pub index: u32,
    pub keyframe: bool,
}

/// Model/codec-agnostic adapter contract. `apply_b` has a default that
/// refuses (matching the Python base class's `NotImplementedError`) since
/// not every adapter supports bidirectional blocks.
pub trait VideoAdapter {
    type State;

    fn decode_i(&self, header: &BlockHeaderInfo, block: &[u8]) -> Self::State;
    fn apply_p(&self, state: Self::State, header: &BlockHeaderInfo, block: &[u8]) -> Self::State;

    fn apply_b(
        &self,
        _prev: Self::State,
        _next: Self::State,
        _header: &BlockHeaderInfo,
        _block: &[u8],
    ) -> Self::State {
        panic!("B-block not supported by this adapter")
    }

    fn render(&self, state: Self::State) -> Vec<u8>;
}

/// Default safe adapter: `I` is state, `P` appends, `B` picks the next
/// state. Deterministic, no hidden side effects — grounded on
/// `original_source/video/adapter.py::OpaquePassThroughAdapter`.
pub struct PassThroughAdapter;

impl VideoAdapter for PassThroughAdapter {
    type State = Vec<u8>;

    fn decode_i(&self, _header: &BlockHeaderInfo, block: &[u8]) -> Self::State {
        block.to_vec()
    }

    fn apply_p(&self, mut state: Self::State, _header: &BlockHeaderInfo, block: &[u8]) -> Self::State {
        state.extend_from_slice(block);
        state
    }

    fn apply_b(
        &self,
        _prev: Self::State,
        next: Self::State,
        _header: &BlockHeaderInfo,
        _block: &[u8],
    ) -> Self::State {
        next
    }

    fn render(&self, state: Self::State) -> Vec<u8> {
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(kind: BlockKindTag, keyframe: bool, index: u32) -> BlockHeaderInfo {
        BlockHeaderInfo { track_id: "v".to_string(), pts_us: index as u64 * 1000, kind, index, keyframe }
    }

    #[test]
    fn pass_through_decodes_i_as_state() {
        let a = PassThroughAdapter;
        let state = a.decode_i(&header(BlockKindTag::I, true, 0), b"frame0");
        assert_eq!(state, b"frame0");
    }

    #[test]
    fn pass_through_appends_p_blocks() {
        let a = PassThroughAdapter;
        let state = a.decode_i(&header(BlockKindTag::I, true, 0), b"frame0");
        let state = a.apply_p(state, &header(BlockKindTag::P, false, 1), b"-delta1");
        assert_eq!(state, b"frame0-delta1");
    }

    #[test]
    fn pass_through_b_block_picks_next_state() {
        let a = PassThroughAdapter;
        let prev = b"prev".to_vec();
        let next = b"next".to_vec();
        let merged = a.apply_b(prev, next.clone(), &header(BlockKindTag::B, false, 2), b"ignored");
        assert_eq!(merged, next);
    }

    #[test]
    fn render_returns_state_unchanged() {
        let a = PassThroughAdapter;
        assert_eq!(a.render(b"state".to_vec()), b"state");
    }
}

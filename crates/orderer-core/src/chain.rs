//! Chain building and verification.
//!
//! `ChainState` is the only sequencing state the orderer has: the number the
//! next block gets and the header hash it must link to. Building a block is
//! pure; the caller decides when the returned state becomes current (the
//! batch cutter commits it only after the log accepted the block).

use bytes::Bytes;

use crate::wire::{Block, BlockData, BlockHeader, GENESIS_PAYLOAD};

/// Sequencing state for one broadcaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    pub next_number: u64,
    /// Header hash of the last committed block. Empty before genesis.
    pub prev_hash: Bytes,
}

impl ChainState {
    /// State before any block exists: number 0, no predecessor.
    pub fn genesis() -> Self {
        Self {
            next_number: 0,
            prev_hash: Bytes::new(),
        }
    }

    /// Build the next block over `payloads`, returning it together with the
    /// state that follows it. `self` is left untouched.
    pub fn build(&self, payloads: Vec<Bytes>) -> (Block, ChainState) {
        let data = BlockData { payloads };
        let header = BlockHeader {
            number: self.next_number,
            previous_hash: self.prev_hash.clone(),
            data_hash: Bytes::copy_from_slice(&data.hash()),
        };
        let next = ChainState {
            next_number: self.next_number + 1,
            prev_hash: Bytes::copy_from_slice(&header.hash()),
        };
        (Block { header, data }, next)
    }

    /// Height of the chain, i.e. how many blocks have been committed.
    pub fn height(&self) -> u64 {
        self.next_number
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::genesis()
    }
}

/// Payloads of the genesis block.
pub fn genesis_payloads() -> Vec<Bytes> {
    vec![Bytes::from_static(GENESIS_PAYLOAD)]
}

/// Check a full chain from block 0: gapless numbering, data hashes, and
/// that every block links to its predecessor's header hash.
pub fn verify(blocks: &[Block]) -> Result<(), ChainError> {
    let mut expected = ChainState::genesis();
    for block in blocks {
        let header = &block.header;
        if header.number != expected.next_number {
            return Err(ChainError::NumberGap {
                expected: expected.next_number,
                found: header.number,
            });
        }
        if header.previous_hash != expected.prev_hash {
            return Err(ChainError::BrokenLink {
                number: header.number,
            });
        }
        if header.data_hash.as_ref() != block.data.hash().as_slice() {
            return Err(ChainError::DataHashMismatch {
                number: header.number,
            });
        }
        expected = ChainState {
            next_number: header.number + 1,
            prev_hash: Bytes::copy_from_slice(&header.hash()),
        };
    }
    Ok(())
}

/// Split a log into chain segments. Each run of the orderer starts over at
/// genesis, so every block numbered 0 opens a new segment.
pub fn segments(blocks: &[Block]) -> Vec<&[Block]> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, block) in blocks.iter().enumerate().skip(1) {
        if block.header.number == 0 {
            out.push(&blocks[start..i]);
            start = i;
        }
    }
    if start < blocks.len() {
        out.push(&blocks[start..]);
    }
    out
}

/// Verify every segment of a log on its own. Returns the segment count.
pub fn verify_segments(blocks: &[Block]) -> Result<usize, ChainError> {
    let segments = segments(blocks);
    for (index, segment) in segments.iter().enumerate() {
        verify(segment).map_err(|e| ChainError::InSegment {
            segment: index,
            source: Box::new(e),
        })?;
    }
    Ok(segments.len())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("expected block {expected}, found {found}")]
    NumberGap { expected: u64, found: u64 },

    #[error("block {number} does not link to its predecessor")]
    BrokenLink { number: u64 },

    #[error("block {number} data hash does not match its payloads")]
    DataHashMismatch { number: u64 },

    #[error("segment {segment}: {source}")]
    InSegment {
        segment: usize,
        source: Box<ChainError>,
    },
}

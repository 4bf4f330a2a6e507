//! Block <-> byte arithmetic
//!
//! Partial blocks always round up. Under-counting would truncate data while
//! over-counting only wastes the tail of one block, so every conversion from
//! bytes to blocks is a ceiling division.

use crate::range::Range;
use serde::Serialize;

/// Blocks touched by a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockSpan {
    /// Index of the block holding the first byte of the range
    pub first_block: usize,
    /// Number of consecutive blocks the range touches
    pub block_count: usize,
}

impl BlockSpan {
    /// One past the last block index of the span, clamped to `usize::MAX`
    pub fn end_block(&self) -> usize {
        self.first_block.saturating_add(self.block_count)
    }
}

/// Stateless converter between block counts and byte counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockToBytesConverter {
    block_size: usize,
}

impl BlockToBytesConverter {
    /// Create a converter for `block_size` byte blocks
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be greater than zero");
        BlockToBytesConverter { block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Bytes occupied by `blocks` whole blocks
    pub fn blocks_to_bytes(&self, blocks: usize) -> usize {
        blocks * self.block_size
    }

    /// Like [`blocks_to_bytes`](Self::blocks_to_bytes), `None` on overflow
    pub fn checked_blocks_to_bytes(&self, blocks: usize) -> Option<usize> {
        blocks.checked_mul(self.block_size)
    }

    /// Blocks needed to hold `bytes` bytes (ceiling division)
    pub fn bytes_to_blocks(&self, bytes: usize) -> usize {
        if bytes == 0 {
            return 0;
        }
        let whole = bytes / self.block_size;
        if bytes % self.block_size > 0 {
            whole + 1
        } else {
            whole
        }
    }

    /// Index of the block containing byte `offset`
    pub fn block_index(&self, offset: usize) -> usize {
        offset / self.block_size
    }

    /// Blocks touched by `range`
    ///
    /// An empty range touches no blocks; its span starts at the block that
    /// would hold `range.start()`. A range running past `usize::MAX` is
    /// clamped to the last addressable byte.
    pub fn block_span<R: Range + ?Sized>(&self, range: &R) -> BlockSpan {
        let first_block = self.block_index(range.start());
        let block_count = match range.stop() {
            Some(stop) => self.block_index(stop) - first_block + 1,
            None => 0,
        };
        BlockSpan {
            first_block,
            block_count,
        }
    }
}

//! Storage substrate selection
//!
//! [`BlockStorageKind`] picks which allocator backs a storage and is the
//! usual entry point for building one:
//!
//! ```rust,no_run
//! use block_storage::{BlockStorage, BlockStorageKind};
//!
//! # fn main() -> block_storage::Result<()> {
//! let storage = BlockStorageKind::Heap.create()?;
//! storage.append(b"Hello, blocks")?;
//! # Ok(())
//! # }
//! ```

use crate::allocator::{ByteBufferAllocator, DefaultAllocator, MappedAllocator};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::lock::ReentrantRwLock;
use crate::mapper::BlockMapper;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Default number of blocks allocated at construction
pub const DEFAULT_INITIAL_BLOCKS: usize = 4;

/// Physical substrate beneath a block storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockStorageKind {
    /// Memory-mapped temporary file, deleted on close
    MappedTempFile,
    /// Heap buffers from the global allocator
    #[default]
    Heap,
    /// Off-heap (direct) memory, an anonymous memory map
    OffHeap,
}

impl BlockStorageKind {
    pub const ALL: [BlockStorageKind; 3] = [
        BlockStorageKind::MappedTempFile,
        BlockStorageKind::Heap,
        BlockStorageKind::OffHeap,
    ];

    /// Create a storage with the default block size and initial block count
    pub fn create(self) -> Result<BlockMapper> {
        self.create_sized(DEFAULT_BLOCK_SIZE, DEFAULT_INITIAL_BLOCKS)
    }

    /// Create a storage of `initial_blocks` blocks of `block_size` bytes
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero. Use
    /// [`BlockStorageBuilder`](crate::BlockStorageBuilder) to get an error
    /// for unchecked input instead.
    pub fn create_sized(self, block_size: usize, initial_blocks: usize) -> Result<BlockMapper> {
        let config = StorageConfig {
            kind: self,
            block_size,
            initial_blocks,
            temp_dir: None,
        };
        BlockMapper::open(&config, ReentrantRwLock::new())
    }

    /// Build the allocator for this kind with `initial_bytes` of capacity
    ///
    /// `temp_dir` only matters for [`MappedTempFile`](Self::MappedTempFile);
    /// the system temp directory is used when it is `None`.
    pub fn create_buffer_allocator(
        self,
        initial_bytes: usize,
        temp_dir: Option<&Path>,
    ) -> Result<Box<dyn ByteBufferAllocator>> {
        let allocator: Box<dyn ByteBufferAllocator> = match self {
            BlockStorageKind::Heap => Box::new(DefaultAllocator::new(initial_bytes, false)?),
            BlockStorageKind::OffHeap => Box::new(DefaultAllocator::new(initial_bytes, true)?),
            BlockStorageKind::MappedTempFile => match temp_dir {
                Some(dir) => Box::new(MappedAllocator::new_in(initial_bytes, dir)?),
                None => Box::new(MappedAllocator::new(initial_bytes)?),
            },
        };
        Ok(allocator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BlockStorageKind::MappedTempFile => "mapped-temp-file",
            BlockStorageKind::Heap => "heap",
            BlockStorageKind::OffHeap => "off-heap",
        }
    }
}

impl fmt::Display for BlockStorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockStorageKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        BlockStorageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StorageError::InvalidConfig(format!("unknown storage kind: {}", s)))
    }
}

//! # Block Storage - growable block-backed byte regions
//!
//! `block-storage` presents a logical, randomly addressable byte store built
//! from fixed-size blocks, on one of three substrates:
//!
//! - **Heap** buffers from the global allocator
//! - **Off-heap** (direct) memory in an anonymous memory map
//! - **Memory-mapped temp file**, deleted when the storage is closed
//!
//! Storage grows on demand in whole blocks, to exactly the number of blocks
//! a write needs. All access goes through a read/write lock: reads share
//! the read side, writes and growth take the write side.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use block_storage::{BlockStorage, BlockStorageKind, ByteRange, Result};
//!
//! # fn main() -> Result<()> {
//! // 4 blocks of 256 bytes to start with
//! let storage = BlockStorageKind::MappedTempFile.create()?;
//!
//! let range = storage.append(b"Hello, World!")?;
//! assert_eq!(storage.read(&range)?, b"Hello, World!");
//!
//! storage.write_at(7, b"Blocks")?;
//! assert_eq!(storage.read(&ByteRange::new(0, 13))?, b"Hello, Blocks");
//!
//! // Unmaps and deletes the temp file
//! storage.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`range`] - byte ranges and snapshots
//! - [`converter`] - block/byte arithmetic
//! - [`allocator`] - heap, off-heap and mapped-file buffers
//! - [`kind`] - substrate selection and construction
//! - [`mapper`] - the block mapper itself
//! - [`lock`] - the read/write gate and its no-op variant
//! - [`config`] - TOML configuration and builder

pub mod allocator;
pub mod config;
pub mod converter;
pub mod error;
pub mod kind;
pub mod lock;
pub mod mapper;
pub mod range;

pub use crate::allocator::{ByteBufferAllocator, DefaultAllocator, MappedAllocator};
pub use crate::config::{BlockStorageBuilder, StorageConfig};
pub use crate::converter::{BlockSpan, BlockToBytesConverter};
pub use crate::error::{Result, StorageError};
pub use crate::kind::{BlockStorageKind, DEFAULT_BLOCK_SIZE, DEFAULT_INITIAL_BLOCKS};
pub use crate::lock::{
    DysfunctionalLock, ExclusiveLock, FunctionalLock, FunctionalLockExt, ReadGuard,
    ReentrantRwLock, WriteGuard,
};
pub use crate::mapper::{BlockMapper, BlockStorage, StorageStats};
pub use crate::range::{ByteRange, LiveRange, Range};

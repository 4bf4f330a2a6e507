//! Block mapper: logical byte storage on top of fixed-size blocks
//!
//! The mapper owns one converter, one allocator and one lock. Every public
//! operation runs under the lock: reads under the read side, writes and
//! growth under the write side. The allocator itself is never touched
//! without the lock held.
//!
//! Growth is exact: a write that needs `n` blocks grows the allocator to
//! exactly `n` blocks, never further.

use crate::allocator::ByteBufferAllocator;
use crate::config::StorageConfig;
use crate::converter::{BlockSpan, BlockToBytesConverter};
use crate::error::{Result, StorageError};
use crate::kind::BlockStorageKind;
use crate::lock::{ExclusiveLock, FunctionalLock, FunctionalLockExt, ReentrantRwLock};
use crate::range::{ByteRange, LiveRange, Range};
use serde::Serialize;
use std::cell::UnsafeCell;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Growable, randomly addressable byte store built from blocks
pub trait BlockStorage {
    /// Substrate the storage allocates from
    fn kind(&self) -> BlockStorageKind;

    /// Block size in bytes
    fn block_size(&self) -> usize;

    /// Logical size in bytes
    fn size(&self) -> usize;

    /// Allocated capacity in bytes (always a whole number of blocks)
    fn capacity(&self) -> usize;

    /// Number of blocks currently allocated
    fn allocated_blocks(&self) -> usize;

    /// Number of blocks holding logical data
    fn used_blocks(&self) -> usize;

    /// Allocated blocks not yet holding logical data
    fn free_blocks(&self) -> usize;

    /// Write `bytes` at `offset`, growing storage as needed
    ///
    /// `offset` may be at most the logical size; writing past the end
    /// extends the logical size. Returns the range written.
    fn write_at(&self, offset: usize, bytes: &[u8]) -> Result<ByteRange>;

    /// Write `bytes` at the end of the logical data
    fn append(&self, bytes: &[u8]) -> Result<ByteRange>;

    /// Copy the bytes of `range` out of the storage
    fn read(&self, range: &dyn Range) -> Result<Vec<u8>>;

    /// Fill `buf` with the bytes starting at `offset`
    fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()>;

    /// Logical bytes of block `index` (the last block may be partial)
    fn read_block(&self, index: usize) -> Result<Vec<u8>>;

    /// Grow to at least `blocks` blocks; a no-op if already that large
    fn reserve_blocks(&self, blocks: usize) -> Result<()>;

    /// Shrink the logical size to `new_size`; capacity is kept
    fn truncate(&self, new_size: usize) -> Result<()>;

    /// Blocks touched by `range`
    ///
    /// Fails with [`StorageError::OutOfBounds`] if the range ends past
    /// `usize::MAX`.
    fn block_span(&self, range: &dyn Range) -> Result<BlockSpan>;

    /// Range `[0, size)` that follows the logical size as it changes
    fn live_range(&self) -> LiveRange;

    /// Point-in-time counters
    fn stats(&self) -> StorageStats;

    /// Temp file backing the storage, if any
    fn backing_path(&self) -> Option<PathBuf>;

    /// Release the backing resources
    ///
    /// Calling it again is a no-op. Every other operation fails with
    /// [`StorageError::Closed`] afterwards.
    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Storage statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub kind: BlockStorageKind,
    pub block_size: usize,
    pub allocated_blocks: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
    pub logical_size: usize,
    pub capacity: usize,
    /// Number of times the allocator grew
    pub grow_count: u64,
    pub closed: bool,
}

impl StorageStats {
    /// Share of allocated bytes holding logical data, as a percentage
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            (self.logical_size as f64 / self.capacity as f64) * 100.0
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// State guarded by the lock
struct MapperState {
    allocator: Box<dyn ByteBufferAllocator>,
    allocated_blocks: usize,
    grow_count: u64,
    closed: bool,
}

/// [`BlockStorage`] implementation
///
/// `BlockMapper<L>` is `Sync` only when `L` is an [`ExclusiveLock`]; a
/// mapper guarded by [`DysfunctionalLock`](crate::DysfunctionalLock) stays
/// on one thread.
pub struct BlockMapper<L: FunctionalLock = ReentrantRwLock> {
    kind: BlockStorageKind,
    converter: BlockToBytesConverter,
    lock: L,
    /// Logical size; only stored under the write side
    size: Arc<AtomicUsize>,
    state: UnsafeCell<MapperState>,
}

// SAFETY: `state` is only reached through `state`/`state_mut`, which require
// the read or write side of `lock`; an `ExclusiveLock` keeps writers apart
// from every other holder across threads. Concurrent readers share
// `&dyn ByteBufferAllocator`, which is sound because the trait requires `Sync`.
unsafe impl<L: ExclusiveLock> Sync for BlockMapper<L> {}

impl<L: FunctionalLock> BlockMapper<L> {
    /// Build a mapper from an already validated configuration
    ///
    /// # Panics
    ///
    /// Panics if `config.block_size` is zero.
    pub(crate) fn open(config: &StorageConfig, lock: L) -> Result<Self> {
        let converter = BlockToBytesConverter::new(config.block_size);
        let initial_bytes = converter
            .checked_blocks_to_bytes(config.initial_blocks)
            .ok_or(StorageError::CapacityOverflow {
                blocks: config.initial_blocks,
                block_size: config.block_size,
            })?;
        let allocator = config
            .kind
            .create_buffer_allocator(initial_bytes, config.temp_dir.as_deref())?;

        tracing::debug!(
            "Created {} block storage: {} blocks of {} bytes",
            config.kind,
            config.initial_blocks,
            config.block_size
        );

        Ok(BlockMapper {
            kind: config.kind,
            converter,
            lock,
            size: Arc::new(AtomicUsize::new(0)),
            state: UnsafeCell::new(MapperState {
                allocator,
                allocated_blocks: config.initial_blocks,
                grow_count: 0,
                closed: false,
            }),
        })
    }

    /// Converter used for block arithmetic
    pub fn converter(&self) -> &BlockToBytesConverter {
        &self.converter
    }

    /// Lock guarding the storage
    ///
    /// Holding its write side across several calls makes them atomic as a
    /// group; the write side is reentrant.
    pub fn lock(&self) -> &L {
        &self.lock
    }

    /// # Safety
    ///
    /// The calling thread must hold the read or write side of `self.lock`
    /// and no `&mut MapperState` may be alive.
    unsafe fn state(&self) -> &MapperState {
        &*self.state.get()
    }

    /// # Safety
    ///
    /// The calling thread must hold the write side of `self.lock` and no
    /// other reference into the state may be alive.
    #[allow(clippy::mut_from_ref)]
    unsafe fn state_mut(&self) -> &mut MapperState {
        &mut *self.state.get()
    }

    fn check_bounds(offset: usize, len: usize, size: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(end),
            _ => Err(StorageError::OutOfBounds { offset, len, size }),
        }
    }

    /// Grow to exactly `blocks` blocks if fewer are allocated
    ///
    /// Bookkeeping changes only after the allocator grew successfully.
    fn ensure_blocks(&self, state: &mut MapperState, blocks: usize) -> Result<()> {
        debug_assert!(self.lock.is_write_held_by_current_thread());

        if blocks <= state.allocated_blocks {
            return Ok(());
        }

        let bytes = self
            .converter
            .checked_blocks_to_bytes(blocks)
            .ok_or(StorageError::CapacityOverflow {
                blocks,
                block_size: self.converter.block_size(),
            })?;

        tracing::info!(
            "Growing {} storage: {} -> {} blocks",
            self.kind,
            state.allocated_blocks,
            blocks
        );

        state.allocator.grow_to(bytes)?;
        state.allocated_blocks = blocks;
        state.grow_count += 1;
        Ok(())
    }

    /// Write under an already held write side
    fn write_locked(
        &self,
        state: &mut MapperState,
        offset: usize,
        bytes: &[u8],
    ) -> Result<ByteRange> {
        if state.closed {
            return Err(StorageError::Closed);
        }

        let size = self.size.load(Ordering::Relaxed);
        if offset > size {
            return Err(StorageError::OutOfBounds {
                offset,
                len: bytes.len(),
                size,
            });
        }
        let end = offset
            .checked_add(bytes.len())
            .ok_or(StorageError::OutOfBounds {
                offset,
                len: bytes.len(),
                size,
            })?;

        self.ensure_blocks(state, self.converter.bytes_to_blocks(end))?;
        state.allocator.as_mut_slice()[offset..end].copy_from_slice(bytes);

        if end > size {
            self.size.store(end, Ordering::Release);
        }

        tracing::trace!("Wrote {} bytes at offset {}", bytes.len(), offset);
        Ok(ByteRange::new(offset, bytes.len()))
    }
}

impl<L: FunctionalLock> BlockStorage for BlockMapper<L> {
    fn kind(&self) -> BlockStorageKind {
        self.kind
    }

    fn block_size(&self) -> usize {
        self.converter.block_size()
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        // SAFETY: read side held
        self.lock.with_read(|| unsafe { self.state() }.allocator.capacity())
    }

    fn allocated_blocks(&self) -> usize {
        // SAFETY: read side held
        self.lock.with_read(|| unsafe { self.state() }.allocated_blocks)
    }

    fn used_blocks(&self) -> usize {
        self.converter.bytes_to_blocks(self.size())
    }

    fn free_blocks(&self) -> usize {
        self.lock.with_read(|| {
            // SAFETY: read side held
            let state = unsafe { self.state() };
            state.allocated_blocks.saturating_sub(self.used_blocks())
        })
    }

    fn write_at(&self, offset: usize, bytes: &[u8]) -> Result<ByteRange> {
        self.lock.try_with_write(|| {
            // SAFETY: write side held, no other state reference alive
            let state = unsafe { self.state_mut() };
            self.write_locked(state, offset, bytes)
        })
    }

    fn append(&self, bytes: &[u8]) -> Result<ByteRange> {
        self.lock.try_with_write(|| {
            // SAFETY: write side held, no other state reference alive
            let state = unsafe { self.state_mut() };
            let offset = self.size.load(Ordering::Relaxed);
            self.write_locked(state, offset, bytes)
        })
    }

    fn read(&self, range: &dyn Range) -> Result<Vec<u8>> {
        let range = range.snapshot();
        self.lock.try_with_read(|| {
            // SAFETY: read side held
            let state = unsafe { self.state() };
            if state.closed {
                return Err(StorageError::Closed);
            }
            let end = Self::check_bounds(range.start(), range.size(), self.size())?;
            tracing::trace!("Read {} bytes at offset {}", range.size(), range.start());
            Ok(state.allocator.as_slice()[range.start()..end].to_vec())
        })
    }

    fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.lock.try_with_read(|| {
            // SAFETY: read side held
            let state = unsafe { self.state() };
            if state.closed {
                return Err(StorageError::Closed);
            }
            let end = Self::check_bounds(offset, buf.len(), self.size())?;
            buf.copy_from_slice(&state.allocator.as_slice()[offset..end]);
            Ok(())
        })
    }

    fn read_block(&self, index: usize) -> Result<Vec<u8>> {
        let block_size = self.converter.block_size();
        self.lock.try_with_read(|| {
            // SAFETY: read side held
            if unsafe { self.state() }.closed {
                return Err(StorageError::Closed);
            }
            let size = self.size();
            let start = match self.converter.checked_blocks_to_bytes(index) {
                Some(start) if start < size => start,
                _ => {
                    return Err(StorageError::OutOfBounds {
                        offset: index.saturating_mul(block_size),
                        len: block_size,
                        size,
                    })
                }
            };
            let end = start.saturating_add(block_size).min(size);
            // Reentrant read inside the held read side
            self.read(&ByteRange::from_bounds(start, end))
        })
    }

    fn reserve_blocks(&self, blocks: usize) -> Result<()> {
        self.lock.try_with_write(|| {
            // SAFETY: write side held, no other state reference alive
            let state = unsafe { self.state_mut() };
            if state.closed {
                return Err(StorageError::Closed);
            }
            self.ensure_blocks(state, blocks)
        })
    }

    fn truncate(&self, new_size: usize) -> Result<()> {
        self.lock.try_with_write(|| {
            // SAFETY: write side held
            if unsafe { self.state() }.closed {
                return Err(StorageError::Closed);
            }
            let size = self.size.load(Ordering::Relaxed);
            if new_size > size {
                return Err(StorageError::OutOfBounds {
                    offset: new_size,
                    len: 0,
                    size,
                });
            }
            self.size.store(new_size, Ordering::Release);
            Ok(())
        })
    }

    fn block_span(&self, range: &dyn Range) -> Result<BlockSpan> {
        let range = range.snapshot();
        if range.checked_end().is_none() {
            return Err(StorageError::OutOfBounds {
                offset: range.start(),
                len: range.size(),
                size: self.size(),
            });
        }
        Ok(self.converter.block_span(&range))
    }

    fn live_range(&self) -> LiveRange {
        LiveRange::new(self.size.clone())
    }

    fn stats(&self) -> StorageStats {
        self.lock.with_read(|| {
            // SAFETY: read side held
            let state = unsafe { self.state() };
            let logical_size = self.size();
            let used_blocks = self.converter.bytes_to_blocks(logical_size);
            StorageStats {
                kind: self.kind,
                block_size: self.converter.block_size(),
                allocated_blocks: state.allocated_blocks,
                used_blocks,
                free_blocks: state.allocated_blocks.saturating_sub(used_blocks),
                logical_size,
                capacity: state.allocator.capacity(),
                grow_count: state.grow_count,
                closed: state.closed,
            }
        })
    }

    fn backing_path(&self) -> Option<PathBuf> {
        self.lock.with_read(|| {
            // SAFETY: read side held
            let state = unsafe { self.state() };
            state.allocator.backing_path().map(|path| path.to_path_buf())
        })
    }

    fn close(&self) -> Result<()> {
        self.lock.try_with_write(|| {
            // SAFETY: write side held, no other state reference alive
            let state = unsafe { self.state_mut() };
            if state.closed {
                return Ok(());
            }

            let released = state.allocator.release();
            state.closed = true;
            state.allocated_blocks = 0;
            self.size.store(0, Ordering::Release);

            tracing::debug!("Closed {} block storage", self.kind);
            released
        })
    }

    fn is_closed(&self) -> bool {
        // SAFETY: read side held
        self.lock.with_read(|| unsafe { self.state() }.closed)
    }
}

impl<L: FunctionalLock> Drop for BlockMapper<L> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.closed {
            return;
        }
        if let Err(e) = state.allocator.release() {
            tracing::warn!("Failed to release {} block storage: {}", self.kind, e);
        }
    }
}

impl<L: FunctionalLock> fmt::Debug for BlockMapper<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockMapper")
            .field("kind", &self.kind)
            .field("block_size", &self.converter.block_size())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

//! Backing memory for block storage
//!
//! An allocator owns the bytes beneath the block abstraction and exposes
//! them as one contiguous slice whose length is the current capacity.
//! Two strategies:
//! - [`DefaultAllocator`] - heap (`Vec<u8>`) or off-heap (anonymous map)
//!   memory, grown by reallocating and copying
//! - [`MappedAllocator`] - memory-mapped temp file, grown by extending the
//!   file and remapping
//!
//! Allocators do no locking of their own. The owning storage serializes
//! every call, and growth only ever happens under its write lock. Readers on
//! several threads may hold `&self` at once, hence the `Sync` bound.

pub mod default;
pub mod mapped;

pub use default::DefaultAllocator;
pub use mapped::MappedAllocator;

use crate::error::Result;
use std::path::Path;

/// Growable byte buffer contract shared by all storage substrates
pub trait ByteBufferAllocator: Send + Sync {
    /// Current capacity in bytes
    fn capacity(&self) -> usize;

    /// Grow capacity to at least `min_bytes`
    ///
    /// A no-op when the capacity already suffices. Growth is all-or-nothing:
    /// on error the capacity and contents are exactly as before the call.
    /// Capacity never shrinks.
    fn grow_to(&mut self, min_bytes: usize) -> Result<()>;

    /// Whole buffer, `capacity()` bytes long
    fn as_slice(&self) -> &[u8];

    /// Whole buffer, `capacity()` bytes long
    fn as_mut_slice(&mut self) -> &mut [u8];

    /// Release all resources
    ///
    /// Afterwards the capacity is zero. Calling it again is a no-op.
    fn release(&mut self) -> Result<()>;

    /// Whether the memory lives outside the global allocator
    fn is_direct(&self) -> bool;

    /// File backing the buffer, if any
    fn backing_path(&self) -> Option<&Path> {
        None
    }
}

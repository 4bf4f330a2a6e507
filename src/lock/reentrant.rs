//! Reentrant read/write lock on top of parking_lot's raw rwlock
//!
//! Semantics:
//! - any number of readers, or one writer
//! - the writer may re-acquire the write side and may take the read side
//! - readers may re-acquire the read side even while a writer is queued
//! - releasing the last write hold while still holding reads downgrades
//!   to a plain read hold
//! - upgrading a read hold to a write hold is not supported and deadlocks

use super::{ExclusiveLock, FunctionalLock};
use crossbeam::utils::CachePadded;
use parking_lot::lock_api::{RawRwLock as _, RawRwLockDowngrade as _, RawRwLockRecursive as _};
use parking_lot::RawRwLock;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Token 0 means "no owner"
static NEXT_THREAD_TOKEN: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static THREAD_TOKEN: usize = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

fn current_thread_token() -> usize {
    THREAD_TOKEN.with(|token| *token)
}

/// Multiple-reader/single-writer lock with reentrant write ownership
pub struct ReentrantRwLock {
    raw: RawRwLock,
    /// Token of the thread holding the write side
    owner: CachePadded<AtomicUsize>,
    /// Write holds of the owner; only touched by the owner
    write_holds: AtomicUsize,
    /// Read holds taken by the owner while writing; only touched by the owner
    owner_reads: AtomicUsize,
}

impl ReentrantRwLock {
    pub fn new() -> Self {
        ReentrantRwLock {
            raw: RawRwLock::INIT,
            owner: CachePadded::new(AtomicUsize::new(0)),
            write_holds: AtomicUsize::new(0),
            owner_reads: AtomicUsize::new(0),
        }
    }

    /// Number of write holds of the calling thread (0 if it is not the owner)
    pub fn write_hold_count(&self) -> usize {
        if self.is_owner() {
            self.write_holds.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    // The owner slot only ever equals our token if this thread stored it,
    // so a relaxed load is enough to answer "is it me".
    fn is_owner(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == current_thread_token()
    }
}

impl Default for ReentrantRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantRwLock")
            .field("write_held_by_current_thread", &self.is_owner())
            .finish()
    }
}

impl FunctionalLock for ReentrantRwLock {
    fn acquire_read(&self) {
        if self.is_owner() {
            self.owner_reads.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.raw.lock_shared_recursive();
    }

    unsafe fn release_read(&self) {
        if self.is_owner() {
            let reads = self.owner_reads.load(Ordering::Relaxed);
            assert!(reads > 0, "read released by a writer holding no reads");
            self.owner_reads.store(reads - 1, Ordering::Relaxed);
            return;
        }
        self.raw.unlock_shared();
    }

    fn acquire_write(&self) {
        if self.is_owner() {
            self.write_holds.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.raw.lock_exclusive();
        self.owner.store(current_thread_token(), Ordering::Relaxed);
        self.write_holds.store(1, Ordering::Relaxed);
    }

    unsafe fn release_write(&self) {
        assert!(
            self.is_owner(),
            "write lock released by a thread that does not hold it"
        );

        let holds = self.write_holds.load(Ordering::Relaxed) - 1;
        self.write_holds.store(holds, Ordering::Relaxed);
        if holds > 0 {
            return;
        }

        self.owner.store(0, Ordering::Relaxed);
        let reads = self.owner_reads.swap(0, Ordering::Relaxed);
        if reads == 0 {
            self.raw.unlock_exclusive();
            return;
        }

        // Keep the reads taken while writing: downgrade yields one shared
        // hold, the rest are re-taken recursively and cannot block.
        self.raw.downgrade();
        for _ in 1..reads {
            self.raw.lock_shared_recursive();
        }
    }

    fn is_write_held_by_current_thread(&self) -> bool {
        self.is_owner()
    }
}

// SAFETY: the write side is backed by parking_lot's exclusive lock; owner
// reentrancy only ever extends a hold the calling thread already has.
unsafe impl ExclusiveLock for ReentrantRwLock {}

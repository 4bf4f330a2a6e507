//! No-op lock strategy
//!
//! Every operation is a pass-through. Only valid when the caller already
//! guarantees exclusive access (single-threaded use, or a coarser lock held
//! around every call). `DysfunctionalLock` deliberately does not implement
//! [`ExclusiveLock`](super::ExclusiveLock), so storage guarded by it is not
//! `Sync` and cannot be shared across threads by accident.

use super::FunctionalLock;

#[derive(Debug, Clone, Copy, Default)]
pub struct DysfunctionalLock;

impl DysfunctionalLock {
    pub fn new() -> Self {
        DysfunctionalLock
    }
}

impl FunctionalLock for DysfunctionalLock {
    fn acquire_read(&self) {}

    unsafe fn release_read(&self) {}

    fn acquire_write(&self) {}

    unsafe fn release_write(&self) {}

    /// Always `true`: the caller's external exclusivity stands in for the
    /// write side, so assertions guarding structural changes hold.
    fn is_write_held_by_current_thread(&self) -> bool {
        true
    }
}

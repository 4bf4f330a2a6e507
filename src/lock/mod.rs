//! Read/write gate for block storage
//!
//! [`FunctionalLock`] is the raw capability interface: acquire and release
//! the read or write side, and ask whether the calling thread owns the write
//! side. Callers never pair acquire/release by hand; they go through the
//! scoped helpers of [`FunctionalLockExt`] or the RAII guards, which release
//! on every exit path including `?` propagation and panic unwinding.
//!
//! Two strategies exist:
//! - [`ReentrantRwLock`] - real multiple-reader/single-writer exclusion
//! - [`DysfunctionalLock`] - pass-through, for callers that already
//!   guarantee single-threaded or externally synchronized access

pub mod dysfunctional;
pub mod reentrant;

pub use dysfunctional::DysfunctionalLock;
pub use reentrant::ReentrantRwLock;

use std::marker::PhantomData;

/// Multiple-reader/single-writer lock capability
pub trait FunctionalLock {
    /// Block until the read side is held by the calling thread
    fn acquire_read(&self);

    /// Release one read hold
    ///
    /// # Safety
    ///
    /// The calling thread must hold a read acquired through
    /// [`acquire_read`](Self::acquire_read) on this lock.
    unsafe fn release_read(&self);

    /// Block until the write side is held by the calling thread
    fn acquire_write(&self);

    /// Release one write hold
    ///
    /// # Safety
    ///
    /// The calling thread must hold a write acquired through
    /// [`acquire_write`](Self::acquire_write) on this lock.
    unsafe fn release_write(&self);

    /// Whether the calling thread currently owns the write side
    fn is_write_held_by_current_thread(&self) -> bool;
}

/// Marker for locks that really provide mutual exclusion
///
/// # Safety
///
/// Implementors must guarantee that while any thread holds the write side,
/// no other thread holds either side, and that readers on different threads
/// never overlap a writer. Shared-state containers rely on this to hand out
/// `&mut` access across threads.
pub unsafe trait ExclusiveLock: FunctionalLock + Send + Sync {}

/// Scoped helpers available on every [`FunctionalLock`]
pub trait FunctionalLockExt: FunctionalLock {
    /// Acquire the read side until the guard is dropped
    fn read(&self) -> ReadGuard<'_, Self> {
        ReadGuard::acquire(self)
    }

    /// Acquire the write side until the guard is dropped
    fn write(&self) -> WriteGuard<'_, Self> {
        WriteGuard::acquire(self)
    }

    /// Run `f` under the read side and return its value
    fn with_read<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.read();
        f()
    }

    /// Run `f` under the write side and return its value
    fn with_write<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.write();
        f()
    }

    /// Run a fallible `f` under the read side
    fn try_with_read<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let _guard = self.read();
        f()
    }

    /// Run a fallible `f` under the write side
    fn try_with_write<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let _guard = self.write();
        f()
    }

    /// Run a side-effecting `f` under the read side
    fn run_read(&self, f: impl FnOnce()) {
        let _guard = self.read();
        f()
    }

    /// Run a side-effecting `f` under the write side
    fn run_write(&self, f: impl FnOnce()) {
        let _guard = self.write();
        f()
    }
}

impl<L: FunctionalLock + ?Sized> FunctionalLockExt for L {}

/// Read hold released on drop
///
/// Guards are pinned to the acquiring thread.
#[must_use = "the read side is released as soon as the guard is dropped"]
pub struct ReadGuard<'a, L: FunctionalLock + ?Sized> {
    lock: &'a L,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: FunctionalLock + ?Sized> ReadGuard<'a, L> {
    pub fn acquire(lock: &'a L) -> Self {
        lock.acquire_read();
        ReadGuard {
            lock,
            _not_send: PhantomData,
        }
    }
}

impl<L: FunctionalLock + ?Sized> Drop for ReadGuard<'_, L> {
    fn drop(&mut self) {
        // SAFETY: the read side was acquired in `acquire` on this thread
        unsafe { self.lock.release_read() }
    }
}

/// Write hold released on drop
///
/// Guards are pinned to the acquiring thread.
#[must_use = "the write side is released as soon as the guard is dropped"]
pub struct WriteGuard<'a, L: FunctionalLock + ?Sized> {
    lock: &'a L,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: FunctionalLock + ?Sized> WriteGuard<'a, L> {
    pub fn acquire(lock: &'a L) -> Self {
        lock.acquire_write();
        WriteGuard {
            lock,
            _not_send: PhantomData,
        }
    }
}

impl<L: FunctionalLock + ?Sized> Drop for WriteGuard<'_, L> {
    fn drop(&mut self) {
        // SAFETY: the write side was acquired in `acquire` on this thread
        unsafe { self.lock.release_write() }
    }
}

//! Byte ranges
//!
//! A [`Range`] only has to answer `start` and `size`; everything else is
//! derived. Ranges handed out by live cursors keep moving as the storage
//! grows, so consumers that must not observe later growth take a
//! [`Range::snapshot`] first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Interval over byte offsets
pub trait Range {
    /// First offset covered by the range
    fn start(&self) -> usize;

    /// Number of bytes covered by the range
    fn size(&self) -> usize;

    /// Last offset covered by the range, `None` when the range is empty
    ///
    /// Clamped to `usize::MAX` for ranges that run off the address space.
    fn stop(&self) -> Option<usize> {
        match self.size() {
            0 => None,
            size => Some(self.start().saturating_add(size - 1)),
        }
    }

    /// One past the last offset covered by the range, clamped to `usize::MAX`
    fn end(&self) -> usize {
        self.start().saturating_add(self.size())
    }

    /// One past the last offset, `None` if it does not fit in a `usize`
    fn checked_end(&self) -> Option<usize> {
        self.start().checked_add(self.size())
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Check whether `offset` falls inside the range
    fn contains(&self, offset: usize) -> bool {
        offset >= self.start() && offset - self.start() < self.size()
    }

    /// Freeze the range as it is right now
    ///
    /// The returned value never changes, even if `self` is a live range over
    /// a storage that keeps growing.
    fn snapshot(&self) -> ByteRange {
        ByteRange::new(self.start(), self.size())
    }
}

/// Immutable byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ByteRange {
    start: usize,
    size: usize,
}

impl ByteRange {
    pub const fn new(start: usize, size: usize) -> Self {
        ByteRange { start, size }
    }

    /// Build a range from a start offset and an exclusive end offset
    ///
    /// An `end` before `start` yields an empty range at `start`.
    pub fn from_bounds(start: usize, end: usize) -> Self {
        ByteRange {
            start,
            size: end.saturating_sub(start),
        }
    }
}

impl Range for ByteRange {
    fn start(&self) -> usize {
        self.start
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// Range covering `[0, size)` of a storage, tracking its logical size
///
/// Every call to [`Range::size`] reads the current size, so two calls may
/// disagree while another thread appends. Use [`Range::snapshot`] to pin it.
#[derive(Debug, Clone)]
pub struct LiveRange {
    size: Arc<AtomicUsize>,
}

impl LiveRange {
    pub(crate) fn new(size: Arc<AtomicUsize>) -> Self {
        LiveRange { size }
    }
}

impl Range for LiveRange {
    fn start(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }
}

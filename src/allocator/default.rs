//! Heap and off-heap allocator
//!
//! One allocator type, two memory sources picked by the `direct` flag:
//! heap memory is a `Vec<u8>` from the global allocator, off-heap memory is
//! an anonymous memory map. Neither can be resized in place, so growth
//! allocates a bigger region and copies the old bytes over.

use crate::allocator::ByteBufferAllocator;
use crate::error::{Result, StorageError};
use memmap2::MmapMut;

enum Region {
    Empty,
    Heap(Vec<u8>),
    Direct(MmapMut),
}

/// Process-memory allocator (heap or direct)
pub struct DefaultAllocator {
    direct: bool,
    region: Region,
}

impl DefaultAllocator {
    /// Allocate `initial_bytes` of zeroed memory
    pub fn new(initial_bytes: usize, direct: bool) -> Result<Self> {
        let region = allocate_region(initial_bytes, direct)?;
        tracing::debug!(
            "Allocated {} bytes of {} memory",
            initial_bytes,
            if direct { "off-heap" } else { "heap" }
        );
        Ok(DefaultAllocator { direct, region })
    }

    pub fn heap(initial_bytes: usize) -> Result<Self> {
        Self::new(initial_bytes, false)
    }

    pub fn direct(initial_bytes: usize) -> Result<Self> {
        Self::new(initial_bytes, true)
    }
}

fn allocate_region(len: usize, direct: bool) -> Result<Region> {
    if len == 0 {
        return Ok(Region::Empty);
    }

    if direct {
        let map = MmapMut::map_anon(len).map_err(|e| {
            StorageError::Allocation(format!("off-heap region of {} bytes: {}", len, e))
        })?;
        Ok(Region::Direct(map))
    } else {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| {
            StorageError::Allocation(format!("heap buffer of {} bytes: {}", len, e))
        })?;
        buf.resize(len, 0);
        Ok(Region::Heap(buf))
    }
}

impl ByteBufferAllocator for DefaultAllocator {
    fn capacity(&self) -> usize {
        self.as_slice().len()
    }

    fn grow_to(&mut self, min_bytes: usize) -> Result<()> {
        let current = self.capacity();
        if min_bytes <= current {
            return Ok(());
        }

        // try_reserve_exact leaves the Vec untouched on failure
        if let Region::Heap(buf) = &mut self.region {
            buf.try_reserve_exact(min_bytes - current).map_err(|e| {
                StorageError::Allocation(format!("heap buffer of {} bytes: {}", min_bytes, e))
            })?;
            buf.resize(min_bytes, 0);
            return Ok(());
        }

        let mut grown = allocate_region(min_bytes, self.direct)?;
        let old = self.as_slice();
        match &mut grown {
            Region::Heap(buf) => buf[..current].copy_from_slice(old),
            Region::Direct(map) => map[..current].copy_from_slice(old),
            Region::Empty => {}
        }
        self.region = grown;
        Ok(())
    }

    fn as_slice(&self) -> &[u8] {
        match &self.region {
            Region::Heap(buf) => &buf[..],
            Region::Direct(map) => &map[..],
            Region::Empty => &[],
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.region {
            Region::Heap(buf) => &mut buf[..],
            Region::Direct(map) => &mut map[..],
            Region::Empty => &mut [],
        }
    }

    fn release(&mut self) -> Result<()> {
        self.region = Region::Empty;
        Ok(())
    }

    fn is_direct(&self) -> bool {
        self.direct
    }
}

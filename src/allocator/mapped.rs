//! Memory-mapped temp file allocator
//!
//! The temp file holds the data, the map is only a window onto it. Growth
//! extends the file and maps it again at the new length; bytes already
//! written stay where they are in the file.

use crate::allocator::ByteBufferAllocator;
use crate::error::{Result, StorageError};
use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::path::Path;
use tempfile::NamedTempFile;

const TEMP_FILE_PREFIX: &str = "block-storage-";
const TEMP_FILE_SUFFIX: &str = ".blocks";

/// Allocator backed by an anonymous temp file
pub struct MappedAllocator {
    /// `None` once released
    file: Option<NamedTempFile>,
    /// `None` while the capacity is zero or after release
    map: Option<MmapMut>,
    capacity: usize,
}

impl MappedAllocator {
    /// Create a temp file of `initial_bytes` in the system temp directory
    pub fn new(initial_bytes: usize) -> Result<Self> {
        Self::create(initial_bytes, None)
    }

    /// Create a temp file of `initial_bytes` inside `dir`
    pub fn new_in<P: AsRef<Path>>(initial_bytes: usize, dir: P) -> Result<Self> {
        Self::create(initial_bytes, Some(dir.as_ref()))
    }

    fn create(initial_bytes: usize, dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_FILE_PREFIX).suffix(TEMP_FILE_SUFFIX);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        file.as_file().set_len(initial_bytes as u64)?;
        let map = map_file(file.as_file(), initial_bytes)?;

        tracing::debug!(
            "Mapped {} bytes of temp file {}",
            initial_bytes,
            file.path().display()
        );

        Ok(MappedAllocator {
            file: Some(file),
            map,
            capacity: initial_bytes,
        })
    }
}

fn map_file(file: &File, len: usize) -> Result<Option<MmapMut>> {
    if len == 0 {
        return Ok(None);
    }
    // SAFETY: the temp file is private to this allocator; nothing else
    // truncates or remaps it while the map is alive.
    let map = unsafe { MmapOptions::new().len(len).map_mut(file)? };
    Ok(Some(map))
}

impl ByteBufferAllocator for MappedAllocator {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn grow_to(&mut self, min_bytes: usize) -> Result<()> {
        if min_bytes <= self.capacity {
            return Ok(());
        }
        let file = self.file.as_ref().ok_or(StorageError::Closed)?.as_file();

        file.set_len(min_bytes as u64)?;
        match map_file(file, min_bytes) {
            Ok(map) => {
                // Replacing the old map unmaps it
                self.map = map;
                self.capacity = min_bytes;
                Ok(())
            }
            Err(e) => {
                // The old map still covers the old length; shrink the file back
                if let Err(restore) = file.set_len(self.capacity as u64) {
                    tracing::warn!(
                        "Failed to restore temp file length to {} bytes: {}",
                        self.capacity,
                        restore
                    );
                }
                Err(e)
            }
        }
    }

    fn as_slice(&self) -> &[u8] {
        match &self.map {
            Some(map) => &map[..],
            None => &[],
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.map {
            Some(map) => &mut map[..],
            None => &mut [],
        }
    }

    fn release(&mut self) -> Result<()> {
        // Unmap before deleting the file underneath
        self.map = None;
        self.capacity = 0;
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            file.close()?;
            tracing::debug!("Deleted temp file {}", path.display());
        }
        Ok(())
    }

    fn is_direct(&self) -> bool {
        true
    }

    fn backing_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_sized_up_front() {
        let dir = TempDir::new().unwrap();
        let alloc = MappedAllocator::new_in(1024, dir.path()).unwrap();

        let path = alloc.backing_path().unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::metadata(path).unwrap().len(), 1024);
        assert_eq!(alloc.capacity(), 1024);
    }

    #[test]
    fn test_growth_extends_file_and_keeps_bytes() {
        let dir = TempDir::new().unwrap();
        let mut alloc = MappedAllocator::new_in(256, dir.path()).unwrap();
        alloc.as_mut_slice()[250..256].copy_from_slice(b"edge!!");

        alloc.grow_to(768).unwrap();

        assert_eq!(alloc.capacity(), 768);
        assert_eq!(alloc.as_slice().len(), 768);
        assert_eq!(&alloc.as_slice()[250..256], b"edge!!");
        let path = alloc.backing_path().unwrap();
        assert_eq!(std::fs::metadata(path).unwrap().len(), 768);
    }

    #[test]
    fn test_zero_initial_size() {
        let dir = TempDir::new().unwrap();
        let mut alloc = MappedAllocator::new_in(0, dir.path()).unwrap();
        assert_eq!(alloc.capacity(), 0);
        assert!(alloc.as_slice().is_empty());

        alloc.grow_to(10).unwrap();
        alloc.as_mut_slice()[9] = 9;
        assert_eq!(alloc.as_slice()[9], 9);
    }

    #[test]
    fn test_release_deletes_file() {
        let dir = TempDir::new().unwrap();
        let mut alloc = MappedAllocator::new_in(512, dir.path()).unwrap();
        let path = alloc.backing_path().unwrap().to_path_buf();
        assert!(path.exists());

        alloc.release().unwrap();
        assert!(!path.exists());
        assert_eq!(alloc.capacity(), 0);
        assert!(alloc.backing_path().is_none());

        // Second release is a no-op
        alloc.release().unwrap();
    }

    #[test]
    fn test_grow_after_release_fails() {
        let dir = TempDir::new().unwrap();
        let mut alloc = MappedAllocator::new_in(64, dir.path()).unwrap();
        alloc.release().unwrap();
        assert!(matches!(alloc.grow_to(128), Err(StorageError::Closed)));
    }
}

//! Storage configuration and builder
//!
//! Configuration can come from code through [`BlockStorageBuilder`] or from
//! a TOML document:
//!
//! ```toml
//! kind = "mapped-temp-file"
//! block-size = 4096
//! initial-blocks = 16
//! temp-dir = "/var/tmp"
//! ```
//!
//! Missing keys fall back to the [`BlockStorageKind`] defaults.

use crate::error::{Result, StorageError};
use crate::kind::{BlockStorageKind, DEFAULT_BLOCK_SIZE, DEFAULT_INITIAL_BLOCKS};
use crate::lock::{FunctionalLock, ReentrantRwLock};
use crate::mapper::BlockMapper;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sizing and substrate of a block storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StorageConfig {
    /// Substrate to allocate from
    pub kind: BlockStorageKind,

    /// Block size in bytes (> 0)
    pub block_size: usize,

    /// Blocks allocated at construction
    pub initial_blocks: usize,

    /// Directory for the temp file of [`BlockStorageKind::MappedTempFile`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            kind: BlockStorageKind::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            initial_blocks: DEFAULT_INITIAL_BLOCKS,
            temp_dir: None,
        }
    }
}

impl StorageConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StorageConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Validate all fields
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(StorageError::InvalidBlockSize(self.block_size));
        }

        if self.initial_bytes().is_none() {
            return Err(StorageError::InvalidConfig(format!(
                "{} initial blocks of {} bytes overflow the address space",
                self.initial_blocks, self.block_size
            )));
        }

        if let Some(dir) = &self.temp_dir {
            if self.kind == BlockStorageKind::MappedTempFile && !dir.is_dir() {
                return Err(StorageError::InvalidConfig(format!(
                    "temp dir {} is not a directory",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    /// Bytes allocated at construction, `None` on overflow
    pub fn initial_bytes(&self) -> Option<usize> {
        self.initial_blocks.checked_mul(self.block_size)
    }
}

/// Builder for block storages
///
/// # Examples
///
/// ```rust,no_run
/// use block_storage::{BlockStorage, BlockStorageBuilder, BlockStorageKind, DysfunctionalLock};
///
/// # fn main() -> block_storage::Result<()> {
/// let shared = BlockStorageBuilder::new(BlockStorageKind::MappedTempFile)
///     .block_size(4096)
///     .initial_blocks(8)
///     .build()?;
///
/// // Single-threaded scratch storage without locking overhead
/// let local = BlockStorageBuilder::new(BlockStorageKind::Heap)
///     .build_with_lock(DysfunctionalLock)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct BlockStorageBuilder {
    config: StorageConfig,
}

impl BlockStorageBuilder {
    pub fn new(kind: BlockStorageKind) -> Self {
        BlockStorageBuilder {
            config: StorageConfig {
                kind,
                ..StorageConfig::default()
            },
        }
    }

    pub fn from_config(config: StorageConfig) -> Self {
        BlockStorageBuilder { config }
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    pub fn initial_blocks(mut self, initial_blocks: usize) -> Self {
        self.config.initial_blocks = initial_blocks;
        self
    }

    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Build a storage guarded by a [`ReentrantRwLock`]
    pub fn build(self) -> Result<BlockMapper> {
        self.build_with_lock(ReentrantRwLock::new())
    }

    /// Build a storage guarded by `lock`
    pub fn build_with_lock<L: FunctionalLock>(self, lock: L) -> Result<BlockMapper<L>> {
        self.config.validate()?;
        BlockMapper::open(&self.config, lock)
    }
}

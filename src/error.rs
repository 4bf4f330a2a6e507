//! Error types for block storage operations

use thiserror::Error;

/// Block storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Block storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Temp file creation, mapping, extension or deletion failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested byte range lies outside the logical size
    #[error("Range out of bounds: offset {offset}, length {len}, logical size {size}")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    /// Heap or off-heap memory could not be allocated
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// Block count times block size does not fit in the address space
    #[error("Capacity overflow: {blocks} blocks of {block_size} bytes")]
    CapacityOverflow { blocks: usize, block_size: usize },

    /// Storage has already been closed
    #[error("Storage is closed")]
    Closed,

    #[error("Invalid block size: {0} (must be greater than zero)")]
    InvalidBlockSize(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

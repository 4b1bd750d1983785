//! Error types for ssd-storage
//!
//! [`StorageError`] covers the backing NAND and snapshot persistence.
//! [`BufferError`] is what the command buffer and device front end report.

use thiserror::Error;

/// Errors raised by a backing store or by snapshot persistence
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error while touching the NAND image or a snapshot file
    #[error("I/O error: {0}")]
    Io(String),

    /// LBA outside of the device address space
    #[error("LBA out of range: {0}")]
    InvalidLba(u32),

    /// Erase request the NAND cannot execute in a single command
    #[error("Invalid erase: lba {lba}, size {size}")]
    InvalidEraseSize { lba: u32, size: u32 },

    /// The NAND image on disk does not have the expected layout
    #[error("Corrupted NAND image: {0}")]
    Corrupted(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Convert from postcard Error to StorageError
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

impl StorageError {
    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Corrupted error
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

/// Errors reported by the command buffer and the device front end
#[derive(Debug, Error)]
pub enum BufferError {
    /// LBA outside of [0, 100)
    #[error("invalid LBA: {0}")]
    InvalidLba(u32),

    /// Erase size of zero, or a range running past the last LBA
    #[error("invalid erase size: lba {lba}, size {size}")]
    InvalidSize { lba: u32, size: u32 },

    /// Value that does not parse as a 32-bit unsigned hex number
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Unknown opcode or wrong number of arguments
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Failure propagated from the backing store
    #[error("backing store failure: {0}")]
    BackingStore(#[from] StorageError),
}

impl BufferError {
    /// Whether this error is a validation failure (rendered as `ERROR` on the wire)
    pub fn is_invalid_argument(&self) -> bool {
        !matches!(self, Self::BackingStore(_))
    }
}

//! # SSD Storage
//!
//! Storage engine of the SSD emulator.
//!
//! This crate models a 100-LBA device whose writes and erases are staged in
//! a small command buffer before they reach the NAND.
//!
//! ## Features
//!
//! - **BackingStore trait**: Abstraction over the NAND the buffer flushes to
//! - **InMemoryNand**: RAM-backed NAND with operation counters, for tests
//! - **FileNand**: Text-file NAND image (`ssd_nand.txt`)
//! - **CommandBuffer**: Bounded log of coalesced writes and merged erases
//! - **Ssd**: Command parsing and wire-format responses
//!
//! ## Example
//!
//! ```rust
//! use ssd_storage::{CommandBuffer, InMemoryNand, LogEntry};
//!
//! let mut buffer = CommandBuffer::new(InMemoryNand::new());
//! buffer.erase(11, 4).unwrap();
//! buffer.erase(14, 3).unwrap();
//! assert_eq!(buffer.log(), &[LogEntry::Erase { start_lba: 11, size: 6 }]);
//!
//! // Served from the buffer, the NAND is untouched
//! assert_eq!(buffer.read(12).unwrap(), 0);
//! assert_eq!(buffer.store().stats().reads, 0);
//! ```

pub mod buffer;
pub mod config;
pub mod device;
pub mod error;
pub mod memory;
pub mod persistent;

// Re-exports
pub use buffer::{BufferSnapshot, CommandBuffer, LogEntry, Operation, ShadowCell};
pub use config::{BufferConfig, BufferConfigBuilder, DevicePaths, LBA_COUNT, MAX_ERASE_LEN};
pub use device::{Response, Ssd};
pub use error::{BufferError, StorageError};
pub use memory::{InMemoryNand, NandStats};
pub use persistent::FileNand;

/// Backing store the command buffer flushes to
///
/// A flat array of `LBA_COUNT` 32-bit cells. Implementations validate their
/// arguments and report violations as [`StorageError`]s.
pub trait BackingStore {
    /// Read the committed value of `lba`
    fn read(&self, lba: u32) -> Result<u32, StorageError>;

    /// Overwrite `lba` with `value`
    fn write(&mut self, lba: u32, value: u32) -> Result<(), StorageError>;

    /// Zero `size` LBAs starting at `lba`
    ///
    /// `size` must be within `1..=MAX_ERASE_LEN` and the range must end at
    /// or before the last LBA.
    fn erase(&mut self, lba: u32, size: u32) -> Result<(), StorageError>;
}

impl<S: BackingStore + ?Sized> BackingStore for &mut S {
    fn read(&self, lba: u32) -> Result<u32, StorageError> {
        (**self).read(lba)
    }

    fn write(&mut self, lba: u32, value: u32) -> Result<(), StorageError> {
        (**self).write(lba, value)
    }

    fn erase(&mut self, lba: u32, size: u32) -> Result<(), StorageError> {
        (**self).erase(lba, size)
    }
}

impl<S: BackingStore + ?Sized> BackingStore for Box<S> {
    fn read(&self, lba: u32) -> Result<u32, StorageError> {
        (**self).read(lba)
    }

    fn write(&mut self, lba: u32, value: u32) -> Result<(), StorageError> {
        (**self).write(lba, value)
    }

    fn erase(&mut self, lba: u32, size: u32) -> Result<(), StorageError> {
        (**self).erase(lba, size)
    }
}

/// Render a value the way the device prints it: `0x` and 8 uppercase digits
pub fn format_value(value: u32) -> String {
    format!("0x{value:08X}")
}

pub(crate) fn check_lba(lba: u32) -> Result<(), StorageError> {
    if lba < LBA_COUNT {
        Ok(())
    } else {
        Err(StorageError::InvalidLba(lba))
    }
}

pub(crate) fn check_erase(lba: u32, size: u32) -> Result<(), StorageError> {
    let fits = lba
        .checked_add(size)
        .is_some_and(|end| end <= LBA_COUNT);
    if (1..=MAX_ERASE_LEN).contains(&size) && fits {
        Ok(())
    } else {
        Err(StorageError::InvalidEraseSize { lba, size })
    }
}

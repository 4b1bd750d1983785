//! Buffer and device configuration
//!
//! This module holds the tunables of the command buffer and the on-disk
//! layout of a device data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Number of addressable blocks on the device
pub const LBA_COUNT: u32 = 100;

/// Default number of pending log slots
pub const DEFAULT_CAPACITY: usize = 5;

/// Largest erase a single NAND command (and a single log entry) may cover
pub const MAX_ERASE_LEN: u32 = 10;

/// Limits of the command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum number of pending log entries
    capacity: usize,
    /// Maximum LBAs covered by one erase entry
    max_erase_len: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_erase_len: MAX_ERASE_LEN,
        }
    }
}

impl BufferConfig {
    /// Create a config with the given capacity and erase chunk length
    ///
    /// The capacity is at least 1. The erase length is clamped to
    /// `1..=MAX_ERASE_LEN`, since every erase entry must fit one NAND erase.
    pub fn new(capacity: usize, max_erase_len: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            max_erase_len: max_erase_len.clamp(1, MAX_ERASE_LEN),
        }
    }

    /// Get the log capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the maximum erase entry length
    pub fn max_erase_len(&self) -> u32 {
        self.max_erase_len
    }

    /// Check if a log with `pending` entries has no free slot
    pub fn is_full(&self, pending: usize) -> bool {
        pending >= self.capacity
    }

    /// Calculate how many entries must be evicted for `pending` to fit
    pub fn overflow(&self, pending: usize) -> usize {
        pending.saturating_sub(self.capacity)
    }
}

/// Builder for BufferConfig
#[derive(Debug, Default)]
pub struct BufferConfigBuilder {
    capacity: Option<usize>,
    max_erase_len: Option<u32>,
}

impl BufferConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of log slots
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the maximum erase entry length
    pub fn max_erase_len(mut self, len: u32) -> Self {
        self.max_erase_len = Some(len);
        self
    }

    /// Build the BufferConfig
    pub fn build(self) -> BufferConfig {
        BufferConfig::new(
            self.capacity.unwrap_or(DEFAULT_CAPACITY),
            self.max_erase_len.unwrap_or(MAX_ERASE_LEN),
        )
    }
}

/// File names used inside a device data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    /// NAND image, one line per LBA
    pub nand: PathBuf,
    /// Response of the last command
    pub output: PathBuf,
    /// Serialized command buffer
    pub buffer: PathBuf,
}

impl DevicePaths {
    /// Lay out the device files under `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            nand: dir.join("ssd_nand.txt"),
            output: dir.join("ssd_output.txt"),
            buffer: dir.join("buffer.bin"),
        }
    }
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

//! In-memory backing store
//!
//! This module provides a RAM-backed NAND, suitable for testing and for
//! measuring how much traffic the command buffer lets through.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::config::LBA_COUNT;
use crate::error::StorageError;
use crate::{BackingStore, check_erase, check_lba};

/// Counters of operations that reached the NAND
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NandStats {
    pub reads: usize,
    pub writes: usize,
    pub erases: usize,
}

/// In-memory implementation of BackingStore
///
/// Holds one `u32` per LBA, zeroed on creation.
#[derive(Debug)]
pub struct InMemoryNand {
    cells: Vec<u32>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    erases: AtomicUsize,
}

impl Default for InMemoryNand {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNand {
    /// Create a zero-filled NAND
    pub fn new() -> Self {
        Self {
            cells: vec![0; LBA_COUNT as usize],
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            erases: AtomicUsize::new(0),
        }
    }

    /// Create a NAND with preset contents
    ///
    /// Missing trailing cells are zero, extra cells are dropped.
    pub fn with_contents(contents: &[u32]) -> Self {
        let mut nand = Self::new();
        for (cell, value) in nand.cells.iter_mut().zip(contents) {
            *cell = *value;
        }
        nand
    }

    /// Get the operation counters
    pub fn stats(&self) -> NandStats {
        NandStats {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
            erases: self.erases.load(Ordering::SeqCst),
        }
    }

    /// Get the committed value of every LBA
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }
}

impl BackingStore for InMemoryNand {
    fn read(&self, lba: u32) -> Result<u32, StorageError> {
        check_lba(lba)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.cells[lba as usize])
    }

    fn write(&mut self, lba: u32, value: u32) -> Result<(), StorageError> {
        check_lba(lba)?;
        trace!(lba, value = format_args!("0x{value:08X}"), "NAND write");
        self.cells[lba as usize] = value;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn erase(&mut self, lba: u32, size: u32) -> Result<(), StorageError> {
        check_erase(lba, size)?;
        trace!(lba, size, "NAND erase");
        let start = lba as usize;
        self.cells[start..start + size as usize].fill(0);
        self.erases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

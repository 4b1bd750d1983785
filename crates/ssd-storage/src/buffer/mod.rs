//! Command buffer
//!
//! The buffer sits between the device front end and the NAND. It keeps a
//! shadow copy of every LBA's pending state and a bounded log of coalesced
//! write and erase entries derived from it.
//!
//! ## Behaviour
//!
//! - Writes and erases update shadow memory, then the log is rebuilt from
//!   scratch. Rebuilding is what coalesces repeated writes and merges
//!   adjacent erases.
//! - When the log would exceed its capacity, the oldest entries are flushed
//!   to the NAND and their LBAs return to `Empty`.
//! - Reads are answered from shadow memory when an LBA is pending, and
//!   passed through to the NAND otherwise.

mod entry;
mod snapshot;

pub use entry::{LogEntry, ShadowCell, regenerate};
pub use snapshot::BufferSnapshot;

use tracing::{debug, instrument, trace};

use crate::BackingStore;
use crate::config::{BufferConfig, LBA_COUNT};
use crate::error::{BufferError, StorageError};

/// A device operation accepted by [`CommandBuffer::handle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read { lba: u32 },
    Write { lba: u32, value: u32 },
    Erase { lba: u32, size: u32 },
    Flush,
}

/// Write-staging buffer in front of a backing store
#[derive(Debug)]
pub struct CommandBuffer<S: BackingStore> {
    /// NAND that flushed entries are applied to
    store: S,
    /// Capacity and erase chunking limits
    config: BufferConfig,
    /// Pending state per LBA
    shadow: Vec<ShadowCell>,
    /// Pending entries, oldest first, never longer than the capacity
    log: Vec<LogEntry>,
    /// Entries evicted by the last mutating operation, in eviction order
    last_run: Vec<LogEntry>,
}

impl<S: BackingStore> CommandBuffer<S> {
    /// Create an empty buffer with the default limits
    pub fn new(store: S) -> Self {
        Self::with_config(store, BufferConfig::default())
    }

    /// Create an empty buffer with custom limits
    pub fn with_config(store: S, config: BufferConfig) -> Self {
        Self {
            store,
            config,
            shadow: vec![ShadowCell::Empty; LBA_COUNT as usize],
            log: Vec::with_capacity(config.capacity()),
            last_run: Vec::new(),
        }
    }

    /// Rebuild a buffer from a snapshot
    ///
    /// The snapshot must cover every LBA, and its log must be exactly what
    /// regeneration produces from its shadow memory and fit the capacity.
    pub fn restore(
        store: S,
        config: BufferConfig,
        snapshot: BufferSnapshot,
    ) -> Result<Self, StorageError> {
        let BufferSnapshot { shadow, log } = snapshot;

        if shadow.len() != LBA_COUNT as usize {
            return Err(StorageError::deserialization(format!(
                "snapshot covers {} LBAs, expected {}",
                shadow.len(),
                LBA_COUNT
            )));
        }
        if log != regenerate(&shadow, config.max_erase_len()) {
            return Err(StorageError::deserialization(
                "snapshot log does not match its shadow memory",
            ));
        }
        if log.len() > config.capacity() {
            return Err(StorageError::deserialization(format!(
                "snapshot holds {} entries, capacity is {}",
                log.len(),
                config.capacity()
            )));
        }

        debug!(pending = log.len(), "Restored command buffer");
        Ok(Self {
            store,
            config,
            shadow,
            log,
            last_run: Vec::new(),
        })
    }

    /// Capture shadow memory and log as one record
    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            shadow: self.shadow.clone(),
            log: self.log.clone(),
        }
    }

    /// Get the backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the buffer limits
    pub fn config(&self) -> BufferConfig {
        self.config
    }

    /// Number of non-empty log slots
    pub fn pending_count(&self) -> usize {
        self.log.len()
    }

    /// Pending entries, oldest first
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// The log padded with `Empty` markers up to capacity
    pub fn slots(&self) -> Vec<LogEntry> {
        let mut slots = self.log.clone();
        slots.resize(self.config.capacity(), LogEntry::Empty);
        slots
    }

    /// Shadow state of one LBA
    pub fn shadow(&self, lba: u32) -> Option<ShadowCell> {
        self.shadow.get(lba as usize).copied()
    }

    /// Entries the last write, erase or flush sent to the backing store
    pub fn run_commands(&self) -> &[LogEntry] {
        &self.last_run
    }

    /// Execute one operation, returning the value for reads
    pub fn handle(&mut self, op: Operation) -> Result<Option<u32>, BufferError> {
        match op {
            Operation::Read { lba } => self.read(lba).map(Some),
            Operation::Write { lba, value } => self.write(lba, value).map(|_| None),
            Operation::Erase { lba, size } => self.erase(lba, size).map(|_| None),
            Operation::Flush => self.flush().map(|_| None),
        }
    }

    /// Read one LBA
    ///
    /// Pending LBAs are answered without touching the backing store.
    pub fn read(&self, lba: u32) -> Result<u32, BufferError> {
        validate_lba(lba)?;
        match self.shadow[lba as usize].pending_value() {
            Some(value) => {
                trace!(lba, "Read served from buffer");
                Ok(value)
            }
            None => Ok(self.store.read(lba)?),
        }
    }

    /// Stage a write
    ///
    /// A full log is flushed by one entry before admitting a write to an LBA
    /// that is not already pending a write. Rewriting a pending LBA only
    /// replaces its value.
    #[instrument(skip(self))]
    pub fn write(&mut self, lba: u32, value: u32) -> Result<(), BufferError> {
        validate_lba(lba)?;
        self.last_run.clear();

        if !self.shadow[lba as usize].is_pending_write() && self.config.is_full(self.log.len()) {
            debug!("Log full, flushing before admission");
            self.evict(1)?;
        }

        self.shadow[lba as usize] = ShadowCell::PendingWrite(value);
        self.rebuild_log();
        self.evict_overflow()
    }

    /// Stage an erase of `size` LBAs starting at `lba`
    ///
    /// Sizes above the NAND erase limit are accepted; regeneration splits
    /// the run into entries the NAND can execute.
    #[instrument(skip(self))]
    pub fn erase(&mut self, lba: u32, size: u32) -> Result<(), BufferError> {
        validate_lba(lba)?;
        let end = lba
            .checked_add(size)
            .filter(|&end| size > 0 && end <= LBA_COUNT)
            .ok_or(BufferError::InvalidSize { lba, size })?;
        self.last_run.clear();

        self.shadow[lba as usize..end as usize].fill(ShadowCell::PendingErase);
        self.rebuild_log();
        self.evict_overflow()
    }

    /// Flush every pending entry, returning them in the order applied
    #[instrument(skip(self))]
    pub fn flush(&mut self) -> Result<Vec<LogEntry>, BufferError> {
        self.last_run.clear();
        self.evict(self.log.len())?;
        Ok(self.last_run.clone())
    }

    fn rebuild_log(&mut self) {
        self.log = regenerate(&self.shadow, self.config.max_erase_len());
        trace!(pending = self.log.len(), "Regenerated log");
    }

    /// Flush oldest entries until the log fits its capacity
    fn evict_overflow(&mut self) -> Result<(), BufferError> {
        while self.config.overflow(self.log.len()) > 0 {
            debug!(pending = self.log.len(), "Log over capacity");
            self.evict(1)?;
        }
        Ok(())
    }

    /// Apply and remove up to `count` entries from the front of the log
    ///
    /// Entries are handled one at a time: an entry the store rejects stays
    /// in the log, entries applied before it stay evicted.
    fn evict(&mut self, count: usize) -> Result<(), BufferError> {
        for _ in 0..count.min(self.log.len()) {
            let entry = self.log[0];
            match entry {
                LogEntry::Write { lba, value } => self.store.write(lba, value)?,
                LogEntry::Erase { start_lba, size } => self.store.erase(start_lba, size)?,
                LogEntry::Empty => {}
            }

            self.log.remove(0);
            for lba in entry.lbas() {
                self.shadow[lba as usize] = ShadowCell::Empty;
            }
            debug!(entry = %entry, "Flushed entry");
            self.last_run.push(entry);
        }
        Ok(())
    }
}

fn validate_lba(lba: u32) -> Result<(), BufferError> {
    if lba < LBA_COUNT {
        Ok(())
    } else {
        Err(BufferError::InvalidLba(lba))
    }
}

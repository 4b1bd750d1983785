//! Shadow memory cells, pending log entries, and log regeneration

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::format_value;

/// What the buffer currently holds for one LBA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadowCell {
    /// Nothing pending; the NAND holds the current value
    #[default]
    Empty,
    /// A write of this value is pending
    PendingWrite(u32),
    /// An erase is pending; the LBA reads as zero
    PendingErase,
}

impl ShadowCell {
    /// Value a read observes, if the buffer can answer it
    pub fn pending_value(&self) -> Option<u32> {
        match self {
            Self::Empty => None,
            Self::PendingWrite(value) => Some(*value),
            Self::PendingErase => Some(0),
        }
    }

    pub fn is_pending_write(&self) -> bool {
        matches!(self, Self::PendingWrite(_))
    }
}

/// One slot of the pending log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogEntry {
    /// Write `value` to `lba`
    Write { lba: u32, value: u32 },
    /// Zero `size` LBAs starting at `start_lba`
    Erase { start_lba: u32, size: u32 },
    /// Unused slot
    #[default]
    Empty,
}

impl LogEntry {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// LBAs this entry covers
    pub fn lbas(&self) -> Range<u32> {
        match *self {
            Self::Write { lba, .. } => lba..lba + 1,
            Self::Erase { start_lba, size } => start_lba..start_lba + size,
            Self::Empty => 0..0,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Write { lba, value } => write!(f, "W {} {}", lba, format_value(value)),
            Self::Erase { start_lba, size } => write!(f, "E {} {}", start_lba, size),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// Rebuild the pending log from shadow memory
///
/// Scans LBAs in ascending order, emitting one `Write` per pending write
/// and one `Erase` per maximal run of pending erases, split every
/// `max_erase_len` LBAs. A pending write always closes the current erase run.
/// No `Empty` markers are emitted.
pub fn regenerate(shadow: &[ShadowCell], max_erase_len: u32) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    let mut run_start = 0u32;
    let mut run_len = 0u32;

    for (lba, cell) in (0u32..).zip(shadow) {
        match *cell {
            ShadowCell::PendingWrite(value) => {
                if run_len > 0 {
                    entries.push(LogEntry::Erase {
                        start_lba: run_start,
                        size: run_len,
                    });
                    run_len = 0;
                }
                entries.push(LogEntry::Write { lba, value });
            }
            ShadowCell::PendingErase => {
                if run_len == 0 {
                    run_start = lba;
                }
                run_len += 1;
                if run_len == max_erase_len {
                    entries.push(LogEntry::Erase {
                        start_lba: run_start,
                        size: run_len,
                    });
                    run_len = 0;
                }
            }
            ShadowCell::Empty => {
                if run_len > 0 {
                    entries.push(LogEntry::Erase {
                        start_lba: run_start,
                        size: run_len,
                    });
                    run_len = 0;
                }
            }
        }
    }

    if run_len > 0 {
        entries.push(LogEntry::Erase {
            start_lba: run_start,
            size: run_len,
        });
    }

    entries
}

//! Behavioural tests for the command buffer
//!
//! These tests drive the buffer through the public API only and check
//! coalescing, erase merging, capacity-driven flushes and read consistency.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ssd_storage::buffer::regenerate;
use ssd_storage::{
    BackingStore, BufferError, CommandBuffer, InMemoryNand, LogEntry, ShadowCell, StorageError,
};

fn buffer() -> CommandBuffer<InMemoryNand> {
    CommandBuffer::new(InMemoryNand::new())
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn test_same_lba_written_twice_keeps_last_value() {
    let mut buf = buffer();
    buf.write(10, 0x1234ABCD).unwrap();
    buf.write(10, 0xBBBB2222).unwrap();

    assert_eq!(buf.log(), &[LogEntry::Write { lba: 10, value: 0xBBBB2222 }]);
    assert_eq!(buf.shadow(10), Some(ShadowCell::PendingWrite(0xBBBB2222)));
    assert_eq!(buf.pending_count(), 1);
}

#[test]
fn test_overlapping_erases_merge() {
    let mut buf = buffer();
    buf.erase(11, 4).unwrap();
    buf.erase(14, 3).unwrap();

    assert_eq!(buf.log(), &[LogEntry::Erase { start_lba: 11, size: 6 }]);
}

#[test]
fn test_adjacent_erases_merge() {
    let mut buf = buffer();
    buf.erase(20, 3).unwrap();
    buf.erase(23, 2).unwrap();

    assert_eq!(buf.log(), &[LogEntry::Erase { start_lba: 20, size: 5 }]);
}

#[test]
fn test_write_breaks_erase_contiguity() {
    let mut buf = buffer();
    buf.erase(10, 2).unwrap();
    buf.write(12, 0xABCDEF01).unwrap();
    buf.erase(13, 2).unwrap();

    assert_eq!(
        buf.log(),
        &[
            LogEntry::Erase { start_lba: 10, size: 2 },
            LogEntry::Write { lba: 12, value: 0xABCDEF01 },
            LogEntry::Erase { start_lba: 13, size: 2 },
        ]
    );
}

#[test]
fn test_erase_swallows_pending_write() {
    let mut buf = buffer();
    buf.write(12, 0xABCDEF01).unwrap();
    buf.erase(10, 5).unwrap();

    assert_eq!(buf.log(), &[LogEntry::Erase { start_lba: 10, size: 5 }]);
    assert_eq!(buf.read(12).unwrap(), 0);
}

#[test]
fn test_long_erase_is_chunked() {
    let mut buf = buffer();
    buf.erase(0, 15).unwrap();

    assert_eq!(
        buf.log(),
        &[
            LogEntry::Erase { start_lba: 0, size: 10 },
            LogEntry::Erase { start_lba: 10, size: 5 },
        ]
    );
    assert!(buf.pending_count() <= 5);
}

// ============================================================================
// Capacity and flushing
// ============================================================================

#[test]
fn test_sixth_erase_flushes_oldest() {
    let mut buf = buffer();
    for start in [0, 10, 20, 30, 40] {
        buf.erase(start, 10).unwrap();
    }
    assert_eq!(buf.pending_count(), 5);
    assert!(buf.run_commands().is_empty());

    buf.erase(50, 10).unwrap();

    assert_eq!(buf.run_commands(), &[LogEntry::Erase { start_lba: 0, size: 10 }]);
    assert_eq!(buf.pending_count(), 5);
    assert_eq!(buf.log()[0], LogEntry::Erase { start_lba: 10, size: 10 });
    assert_eq!(buf.log()[4], LogEntry::Erase { start_lba: 50, size: 10 });
    for lba in 0..10 {
        assert_eq!(buf.shadow(lba), Some(ShadowCell::Empty));
    }
    assert_eq!(buf.store().stats().erases, 1);
}

#[test]
fn test_huge_erase_evicts_its_own_chunks() {
    let mut buf = buffer();
    buf.write(99, 0x99).unwrap();
    buf.erase(0, 80).unwrap();

    // 8 erase chunks plus the write regenerate to 9 entries
    assert_eq!(buf.pending_count(), 5);
    assert_eq!(
        buf.run_commands(),
        &[
            LogEntry::Erase { start_lba: 0, size: 10 },
            LogEntry::Erase { start_lba: 10, size: 10 },
            LogEntry::Erase { start_lba: 20, size: 10 },
            LogEntry::Erase { start_lba: 30, size: 10 },
        ]
    );
    assert_eq!(buf.log()[4], LogEntry::Write { lba: 99, value: 0x99 });
    assert_eq!(buf.read(35).unwrap(), 0);
    assert_eq!(buf.read(45).unwrap(), 0);
}

#[test]
fn test_flush_order_and_shadow_reset() {
    let mut buf = buffer();
    buf.write(50, 5).unwrap();
    buf.erase(0, 3).unwrap();
    buf.write(20, 2).unwrap();
    buf.erase(60, 10).unwrap();
    buf.write(90, 9).unwrap();
    assert_eq!(buf.pending_count(), 5);

    let run = buf.flush().unwrap();

    assert_eq!(
        run,
        vec![
            LogEntry::Erase { start_lba: 0, size: 3 },
            LogEntry::Write { lba: 20, value: 2 },
            LogEntry::Write { lba: 50, value: 5 },
            LogEntry::Erase { start_lba: 60, size: 10 },
            LogEntry::Write { lba: 90, value: 9 },
        ]
    );
    assert_eq!(buf.run_commands(), run.as_slice());
    assert_eq!(buf.pending_count(), 0);
    assert!(buf.slots().iter().all(LogEntry::is_empty));
    assert!(buf.snapshot().shadow.iter().all(|c| *c == ShadowCell::Empty));

    let cells = buf.store().cells();
    assert_eq!(cells[20], 2);
    assert_eq!(cells[50], 5);
    assert_eq!(cells[90], 9);
}

#[test]
fn test_write_into_erase_run_when_full() {
    let mut buf = buffer();
    buf.erase(0, 10).unwrap();
    for lba in [20, 30, 40, 50] {
        buf.write(lba, lba).unwrap();
    }
    assert_eq!(buf.pending_count(), 5);

    // LBA 5 is pending erase, not pending write: the oldest entry goes first
    buf.write(5, 0x55).unwrap();

    assert_eq!(buf.run_commands(), &[LogEntry::Erase { start_lba: 0, size: 10 }]);
    assert_eq!(buf.log()[0], LogEntry::Write { lba: 5, value: 0x55 });
    assert_eq!(buf.pending_count(), 5);
}

#[test]
fn test_split_run_overflow_is_flushed() {
    let mut buf = buffer();
    buf.erase(0, 10).unwrap();
    for lba in [20, 30, 40] {
        buf.write(lba, lba).unwrap();
    }
    assert_eq!(buf.pending_count(), 4);

    // Splitting the erase run turns one entry into three
    buf.write(5, 0x55).unwrap();

    assert_eq!(buf.run_commands(), &[LogEntry::Erase { start_lba: 0, size: 5 }]);
    assert_eq!(
        buf.log(),
        &[
            LogEntry::Write { lba: 5, value: 0x55 },
            LogEntry::Erase { start_lba: 6, size: 4 },
            LogEntry::Write { lba: 20, value: 20 },
            LogEntry::Write { lba: 30, value: 30 },
            LogEntry::Write { lba: 40, value: 40 },
        ]
    );
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_reads_are_consistent_with_pending_state() {
    let mut buf = CommandBuffer::new(InMemoryNand::with_contents(&[0xFFFFFFFF; 100]));
    buf.write(10, 0x12345678).unwrap();
    buf.erase(5, 3).unwrap();

    assert_eq!(buf.read(10).unwrap(), 0x12345678);
    assert_eq!(buf.read(6).unwrap(), 0);
    assert_eq!(buf.store().stats().reads, 0);

    assert_eq!(buf.read(50).unwrap(), 0xFFFFFFFF);
    assert_eq!(buf.store().stats().reads, 1);
}

#[test]
fn test_read_after_flush_comes_from_store() {
    let mut buf = buffer();
    buf.write(10, 0x12345678).unwrap();
    buf.flush().unwrap();

    assert_eq!(buf.read(10).unwrap(), 0x12345678);
    assert_eq!(buf.store().stats().reads, 1);
}

// ============================================================================
// Failures
// ============================================================================

/// NAND that refuses writes to one LBA
struct FaultyNand {
    inner: InMemoryNand,
    bad_lba: u32,
}

impl BackingStore for FaultyNand {
    fn read(&self, lba: u32) -> Result<u32, StorageError> {
        self.inner.read(lba)
    }

    fn write(&mut self, lba: u32, value: u32) -> Result<(), StorageError> {
        if lba == self.bad_lba {
            return Err(StorageError::io("program failure"));
        }
        self.inner.write(lba, value)
    }

    fn erase(&mut self, lba: u32, size: u32) -> Result<(), StorageError> {
        self.inner.erase(lba, size)
    }
}

#[test]
fn test_flush_failure_keeps_earlier_evictions() {
    let mut buf = CommandBuffer::new(FaultyNand {
        inner: InMemoryNand::new(),
        bad_lba: 30,
    });
    for lba in [10, 20, 30, 40] {
        buf.write(lba, lba).unwrap();
    }

    let err = buf.flush().unwrap_err();
    assert!(matches!(err, BufferError::BackingStore(StorageError::Io(_))));
    assert!(!err.is_invalid_argument());

    assert_eq!(
        buf.run_commands(),
        &[
            LogEntry::Write { lba: 10, value: 10 },
            LogEntry::Write { lba: 20, value: 20 },
        ]
    );
    assert_eq!(
        buf.log(),
        &[
            LogEntry::Write { lba: 30, value: 30 },
            LogEntry::Write { lba: 40, value: 40 },
        ]
    );
    assert_eq!(buf.shadow(10), Some(ShadowCell::Empty));
    assert_eq!(buf.shadow(30), Some(ShadowCell::PendingWrite(30)));
    assert_eq!(buf.store().inner.cells()[20], 20);
}

// ============================================================================
// Randomized sequences
// ============================================================================

/// Run random writes and erases against a plain array model
///
/// After every operation the buffer must hold at most 5 entries, its log
/// must equal the regeneration of its shadow memory, and every LBA must read
/// back the model value.
#[test]
fn test_random_sequences_match_model() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut buf = buffer();
        let mut model = [0u32; 100];

        for _ in 0..300 {
            if rng.random_bool(0.6) {
                let lba = rng.random_range(0..100u32);
                let value: u32 = rng.random();
                buf.write(lba, value).unwrap();
                model[lba as usize] = value;
            } else {
                let lba = rng.random_range(0..100u32);
                let size = rng.random_range(1..=(100 - lba).min(30));
                buf.erase(lba, size).unwrap();
                model[lba as usize..(lba + size) as usize].fill(0);
            }

            assert!(buf.pending_count() <= 5, "seed {seed}: capacity exceeded");
            let snapshot = buf.snapshot();
            assert_eq!(snapshot.log, regenerate(&snapshot.shadow, 10), "seed {seed}");
            for lba in 0..100u32 {
                assert_eq!(buf.read(lba).unwrap(), model[lba as usize], "seed {seed}, lba {lba}");
            }
        }

        buf.flush().unwrap();
        assert_eq!(buf.store().cells(), &model[..], "seed {seed}: NAND diverged");
    }
}

//! Device front end
//!
//! Parses command tokens (`R 3`, `W 3 0x1298CDEF`, `E 0 10`, `F`), runs them
//! through the command buffer and renders the device's wire responses.

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::buffer::{BufferSnapshot, CommandBuffer, Operation};
use crate::config::{BufferConfig, DevicePaths, LBA_COUNT, MAX_ERASE_LEN};
use crate::error::{BufferError, StorageError};
use crate::persistent::FileNand;
use crate::{BackingStore, format_value};

/// Response text of an invalid command
pub const ERROR_RESPONSE: &str = "ERROR";

/// Result of one device command, as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// A read completed
    Value { lba: u32, value: u32 },
    /// A write, erase or flush was accepted
    Done,
    /// The command was rejected
    Error,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Value { lba, value } => writeln!(f, "{:02} {}", lba, format_value(value)),
            Self::Done => Ok(()),
            Self::Error => f.write_str(ERROR_RESPONSE),
        }
    }
}

impl Operation {
    /// Parse device command tokens
    ///
    /// Erases are limited to what one NAND erase can do: 1 to 10 LBAs,
    /// ending at or before the last LBA.
    pub fn parse<T: AsRef<str>>(args: &[T]) -> Result<Self, BufferError> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();

        match args.as_slice() {
            [op, lba] if op.eq_ignore_ascii_case("R") => Ok(Self::Read {
                lba: parse_lba(lba)?,
            }),
            [op, lba, value] if op.eq_ignore_ascii_case("W") => Ok(Self::Write {
                lba: parse_lba(lba)?,
                value: parse_value(value)?,
            }),
            [op, lba, size] if op.eq_ignore_ascii_case("E") => {
                let lba = parse_lba(lba)?;
                let size = size
                    .parse::<u32>()
                    .map_err(|_| BufferError::InvalidCommand(format!("bad erase size {size:?}")))?;
                if !(1..=MAX_ERASE_LEN).contains(&size) || lba + size > LBA_COUNT {
                    return Err(BufferError::InvalidSize { lba, size });
                }
                Ok(Self::Erase { lba, size })
            }
            [op] if op.eq_ignore_ascii_case("F") => Ok(Self::Flush),
            _ => Err(BufferError::InvalidCommand(args.join(" "))),
        }
    }
}

/// Parse a decimal LBA in [0, 100)
pub fn parse_lba(text: &str) -> Result<u32, BufferError> {
    let lba = text
        .parse::<u32>()
        .map_err(|_| BufferError::InvalidCommand(format!("bad LBA {text:?}")))?;
    if lba >= LBA_COUNT {
        return Err(BufferError::InvalidLba(lba));
    }
    Ok(lba)
}

/// Parse a 32-bit hex value, with or without a `0x` prefix
pub fn parse_value(text: &str) -> Result<u32, BufferError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() {
        return Err(BufferError::InvalidValue(text.to_string()));
    }
    u32::from_str_radix(digits, 16).map_err(|_| BufferError::InvalidValue(text.to_string()))
}

/// An SSD: command buffer plus backing NAND
#[derive(Debug)]
pub struct Ssd<S: BackingStore> {
    buffer: CommandBuffer<S>,
}

impl<S: BackingStore> Ssd<S> {
    /// Create a device with an empty buffer in front of `store`
    pub fn new(store: S) -> Self {
        Self {
            buffer: CommandBuffer::new(store),
        }
    }

    /// Get the command buffer
    pub fn buffer(&self) -> &CommandBuffer<S> {
        &self.buffer
    }

    /// Execute a parsed operation
    ///
    /// Validation failures become [`Response::Error`]. Backing store
    /// failures are returned as errors.
    pub fn execute(&mut self, op: Operation) -> Result<Response, BufferError> {
        match (op, self.buffer.handle(op)) {
            (Operation::Read { lba }, Ok(Some(value))) => Ok(Response::Value { lba, value }),
            (_, Ok(_)) => Ok(Response::Done),
            (_, Err(e)) if e.is_invalid_argument() => {
                warn!(op = ?op, error = %e, "Rejected command");
                Ok(Response::Error)
            }
            (_, Err(e)) => Err(e),
        }
    }

    /// Parse and execute command tokens
    pub fn run<T: AsRef<str>>(&mut self, args: &[T]) -> Result<Response, BufferError> {
        match Operation::parse(args) {
            Ok(op) => self.execute(op),
            Err(e) => {
                warn!(error = %e, "Rejected command");
                Ok(Response::Error)
            }
        }
    }
}

impl Ssd<FileNand> {
    /// Open the device stored under `paths`
    ///
    /// A missing NAND image is formatted, a missing buffer snapshot means
    /// nothing is pending.
    pub fn open(paths: &DevicePaths, config: BufferConfig) -> Result<Self, StorageError> {
        let nand = FileNand::open(&paths.nand)?;
        let buffer = match BufferSnapshot::load(&paths.buffer)? {
            Some(snapshot) => CommandBuffer::restore(nand, config, snapshot)?,
            None => CommandBuffer::with_config(nand, config),
        };
        info!(nand = ?paths.nand, pending = buffer.pending_count(), "Opened device");
        Ok(Self { buffer })
    }

    /// Persist the buffer under `paths`
    pub fn save(&self, paths: &DevicePaths) -> Result<(), StorageError> {
        self.buffer.snapshot().save(&paths.buffer)
    }
}

/// Write a response into the device output file
pub fn write_output(path: impl AsRef<Path>, response: &Response) -> Result<(), StorageError> {
    fs::write(path, response.to_string())?;
    Ok(())
}

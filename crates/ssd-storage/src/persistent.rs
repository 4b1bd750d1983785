//! File-backed backing store
//!
//! The NAND image is a text file with one line per LBA:
//!
//! ```text
//! 00 0x00000000
//! 01 0x1298CDEF
//! ...
//! 99 0x00000000
//! ```
//!
//! The image is loaded once on open and rewritten as a whole after every
//! write or erase, through a temporary file and a rename.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::LBA_COUNT;
use crate::error::StorageError;
use crate::{BackingStore, check_erase, check_lba, format_value};

/// Persistent implementation of BackingStore
#[derive(Debug)]
pub struct FileNand {
    path: PathBuf,
    cells: Vec<u32>,
}

impl FileNand {
    /// Open the NAND image at `path`, creating a zero-filled one if missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            debug!(path = ?path, "No NAND image, formatting a fresh one");
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let nand = Self {
                path,
                cells: vec![0; LBA_COUNT as usize],
            };
            nand.store()?;
            return Ok(nand);
        }

        let cells = Self::load(&path)?;
        info!(path = ?path, "Loaded NAND image");
        Ok(Self { path, cells })
    }

    /// Get the path of the NAND image
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the NAND image
    fn load(path: &Path) -> Result<Vec<u32>, StorageError> {
        let reader = BufReader::new(File::open(path)?);
        let mut cells = Vec::with_capacity(LBA_COUNT as usize);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let value = parse_line(cells.len(), &line)?;
            cells.push(value);
        }

        if cells.len() != LBA_COUNT as usize {
            return Err(StorageError::corrupted(format!(
                "expected {} lines, found {}",
                LBA_COUNT,
                cells.len()
            )));
        }
        Ok(cells)
    }

    /// Rewrite the whole image
    fn store(&self) -> Result<(), StorageError> {
        let temp_path = self.path.with_extension("txt.tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            for (lba, value) in self.cells.iter().enumerate() {
                writeln!(writer, "{:02} {}", lba, format_value(*value))?;
            }
            writer.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Parse `"NN 0xVVVVVVVV"`, checking that `NN` matches the line position
fn parse_line(idx: usize, line: &str) -> Result<u32, StorageError> {
    let bad_line = || StorageError::corrupted(format!("line {}: {:?}", idx, line));

    let (lba, value) = line.trim().split_once(' ').ok_or_else(bad_line)?;
    if lba.parse::<usize>().map_err(|_| bad_line())? != idx {
        return Err(bad_line());
    }
    let hex = value.strip_prefix("0x").ok_or_else(bad_line)?;
    u32::from_str_radix(hex, 16).map_err(|_| bad_line())
}

impl BackingStore for FileNand {
    fn read(&self, lba: u32) -> Result<u32, StorageError> {
        check_lba(lba)?;
        Ok(self.cells[lba as usize])
    }

    fn write(&mut self, lba: u32, value: u32) -> Result<(), StorageError> {
        check_lba(lba)?;
        self.cells[lba as usize] = value;
        self.store()
    }

    fn erase(&mut self, lba: u32, size: u32) -> Result<(), StorageError> {
        check_erase(lba, size)?;
        let start = lba as usize;
        self.cells[start..start + size as usize].fill(0);
        self.store()
    }
}

//! Buffer persistence
//!
//! Shadow memory and the pending log are stored together as a single
//! postcard-encoded record, so a device that runs one command per process
//! keeps its pending entries across invocations.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::entry::{LogEntry, ShadowCell};
use crate::error::StorageError;

/// Serializable state of a command buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    /// Pending state per LBA
    pub shadow: Vec<ShadowCell>,
    /// Pending entries, oldest first
    pub log: Vec<LogEntry>,
}

impl BufferSnapshot {
    /// Encode the snapshot
    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|e| StorageError::serialization(e.to_string()))
    }

    /// Decode a snapshot
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(postcard::from_bytes(bytes)?)
    }

    /// Write the snapshot to `path`, replacing any previous one
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let temp_path = path.with_extension("bin.tmp");

        fs::write(&temp_path, self.to_bytes()?)?;
        fs::rename(&temp_path, path)?;

        debug!(path = ?path, pending = self.log.len(), "Saved buffer snapshot");
        Ok(())
    }

    /// Read the snapshot at `path`, if there is one
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>, StorageError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = ?path, "No buffer snapshot, starting empty");
            return Ok(None);
        }

        let snapshot = Self::from_bytes(&fs::read(path)?)?;
        info!(path = ?path, pending = snapshot.log.len(), "Loaded buffer snapshot");
        Ok(Some(snapshot))
    }
}

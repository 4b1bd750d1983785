//! Connection between the shell and a device
//!
//! The shell only sees response text, the same text the `ssd` binary writes
//! into `ssd_output.txt`.

use ssd_storage::device::write_output;
use ssd_storage::{
    BackingStore, BufferConfig, BufferError, DevicePaths, FileNand, Operation, Ssd, StorageError,
};
use tracing::trace;

/// Sends device commands and returns their response text
pub trait DeviceDriver {
    fn send(&mut self, op: Operation) -> Result<String, BufferError>;
}

impl<D: DeviceDriver + ?Sized> DeviceDriver for &mut D {
    fn send(&mut self, op: Operation) -> Result<String, BufferError> {
        (**self).send(op)
    }
}

impl<D: DeviceDriver + ?Sized> DeviceDriver for Box<D> {
    fn send(&mut self, op: Operation) -> Result<String, BufferError> {
        (**self).send(op)
    }
}

/// Drives an in-process device
///
/// When opened from a data directory, every command also updates the
/// output file and the buffer snapshot there, so the state stays shared
/// with the `ssd` binary.
#[derive(Debug)]
pub struct LocalDriver<S: BackingStore> {
    ssd: Ssd<S>,
    paths: Option<DevicePaths>,
}

impl<S: BackingStore> LocalDriver<S> {
    /// Drive `ssd` without persisting anything
    pub fn new(ssd: Ssd<S>) -> Self {
        Self { ssd, paths: None }
    }

    pub fn ssd(&self) -> &Ssd<S> {
        &self.ssd
    }
}

impl LocalDriver<FileNand> {
    /// Open the device stored under `paths`
    pub fn open(paths: DevicePaths, config: BufferConfig) -> Result<Self, StorageError> {
        let ssd = Ssd::open(&paths, config)?;
        Ok(Self {
            ssd,
            paths: Some(paths),
        })
    }
}

impl<S: BackingStore> DeviceDriver for LocalDriver<S> {
    fn send(&mut self, op: Operation) -> Result<String, BufferError> {
        let response = self.ssd.execute(op)?;
        if let Some(paths) = &self.paths {
            write_output(&paths.output, &response)?;
            self.ssd.buffer().snapshot().save(&paths.buffer)?;
        }
        let text = response.to_string();
        trace!(?op, response = %text.trim_end(), "Device responded");
        Ok(text)
    }
}

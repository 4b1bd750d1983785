//! Host side of the SSD emulator
//!
//! [`Shell`] turns user commands and test scripts into device commands and
//! sends them through a [`DeviceDriver`].

pub mod config;
pub mod driver;
pub mod shell;

pub use config::{ShellCli, SsdCli};
pub use driver::{DeviceDriver, LocalDriver};
pub use shell::{Shell, ShellCommand, ShellError, TestScript};

use std::path::PathBuf;

use clap::Parser;
use ssd_logging::LogConfig;
use ssd_storage::DevicePaths;

/// Command line of the `ssd-shell` binary
#[derive(Parser, Debug)]
#[command(name = "ssd-shell", about = "Test shell for the SSD emulator")]
pub struct ShellCli {
    /// Script file listing test scripts to run, one per line
    pub script: Option<PathBuf>,

    /// Directory holding the NAND image, output file and buffer snapshot
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Directory for `latest.log` and its rotations
    #[arg(long, default_value = ".")]
    pub log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ShellCli {
    pub fn device_paths(&self) -> DevicePaths {
        DevicePaths::in_dir(&self.data_dir)
    }

    /// Events go to the rotated shell log only
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            default_level: self.log_level.clone(),
            ..LogConfig::shell(self.log_dir.clone())
        }
    }
}

/// Command line of the one-shot `ssd` binary
#[derive(Parser, Debug)]
#[command(name = "ssd", about = "Run one command against the SSD emulator")]
pub struct SsdCli {
    /// Device command: `R <lba>`, `W <lba> <value>`, `E <lba> <size>` or `F`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Directory holding the NAND image, output file and buffer snapshot
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl SsdCli {
    pub fn device_paths(&self) -> DevicePaths {
        DevicePaths::in_dir(&self.data_dir)
    }

    /// Events go to stderr, the output file belongs to the host
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            default_level: self.log_level.clone(),
            ..LogConfig::default()
        }
    }
}

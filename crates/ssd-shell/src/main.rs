use std::io;

use clap::Parser;
use ssd_logging::SsdSubscriberBuilder;
use ssd_shell::{LocalDriver, Shell, ShellCli};
use ssd_storage::BufferConfig;

fn main() -> anyhow::Result<()> {
    let cli = ShellCli::parse();

    // Keep the guard alive until the shell exits so the log file is complete
    let _guard = SsdSubscriberBuilder::new()
        .with_config(cli.log_config())
        .try_init()?;

    let driver = LocalDriver::open(cli.device_paths(), BufferConfig::default())?;
    let mut shell = Shell::new(driver, io::stdout().lock());

    match &cli.script {
        Some(path) => shell.run_script_file(path)?,
        None => shell.run_interactive(io::stdin().lock())?,
    }

    Ok(())
}

use clap::Parser;
use ssd_logging::SsdSubscriberBuilder;
use ssd_shell::SsdCli;
use ssd_storage::device::write_output;
use ssd_storage::{BufferConfig, Ssd};

fn main() -> anyhow::Result<()> {
    let cli = SsdCli::parse();

    SsdSubscriberBuilder::new()
        .with_config(cli.log_config())
        .try_init()?;

    let paths = cli.device_paths();
    let mut ssd = Ssd::open(&paths, BufferConfig::default())?;
    let response = ssd.run(cli.command.as_slice())?;
    write_output(&paths.output, &response)?;
    ssd.save(&paths)?;

    Ok(())
}

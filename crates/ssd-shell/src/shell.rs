//! Test shell
//!
//! Reads user commands, turns them into device commands and prints the
//! results. Multi-LBA commands are split into as many device commands as
//! needed; test scripts drive long randomized sequences and report
//! `PASS` or `FAIL`.

use std::fs;
use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ssd_storage::device::{parse_lba, parse_value};
use ssd_storage::{BufferError, LBA_COUNT, MAX_ERASE_LEN, Operation, format_value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::driver::DeviceDriver;

/// Printed for anything the shell cannot run
pub const INVALID_COMMAND: &str = "INVALID COMMAND";

/// Interactive prompt
pub const PROMPT: &str = "Shell> ";

const LAST_LBA: u32 = LBA_COUNT - 1;
const SCRIPT_NAME_WIDTH: usize = 26;
const PARTIAL_WRITE_ORDER: [u32; 5] = [4, 0, 3, 1, 2];

const HELP: &str = "\
[Help]
Rule 1. LBA in 0~99
Rule 2. Value in 0x00000000~0xFFFFFFFF

read LBA                  : read one LBA            ex) [Read] LBA 00 : 0x00000000
write LBA VALUE           : write one LBA           ex) [Write] Done
erase LBA SIZE            : erase SIZE LBAs         ex) [Erase] Done
erase_range START END     : erase START..=END       ex) [Erase] Done
fullwrite VALUE           : write every LBA         ex) [Full Write] Done
fullread                  : read every LBA          ex) [Full Read] ...
flush                     : commit the command buffer to NAND
help                      : show this text
exit                      : leave the shell

1_FullWriteAndReadCompare : write random values 5 LBAs at a time and read them back
2_PartialLBAWrite         : write one random value to LBAs 0~4 in mixed order, 30 times
3_WriteReadAging          : write one random value to LBAs 0 and 99, 200 times
4_EraseAndWriteAging      : overwrite then erase every even LBA and the next two, 30 times
";

/// Shell errors
#[derive(Debug, Error)]
pub enum ShellError {
    /// The line is not a shell command, or its arguments are out of range
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),

    /// The device answered `ERROR` to a command the shell expected to succeed
    #[error("device rejected {0:?}")]
    Rejected(Operation),

    /// The device itself failed
    #[error("device error: {0}")]
    Device(#[from] BufferError),

    /// Shell input or output failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Built-in test scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestScript {
    FullWriteAndReadCompare,
    PartialLbaWrite,
    WriteReadAging,
    EraseAndWriteAging,
}

impl TestScript {
    pub const ALL: [Self; 4] = [
        Self::FullWriteAndReadCompare,
        Self::PartialLbaWrite,
        Self::WriteReadAging,
        Self::EraseAndWriteAging,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::FullWriteAndReadCompare => "1_FullWriteAndReadCompare",
            Self::PartialLbaWrite => "2_PartialLBAWrite",
            Self::WriteReadAging => "3_WriteReadAging",
            Self::EraseAndWriteAging => "4_EraseAndWriteAging",
        }
    }

    /// Short form accepted in place of the full name (`1_` .. `4_`)
    pub fn prefix(self) -> &'static str {
        &self.name()[..2]
    }

    /// Look a script up by its full name or its prefix
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|script| name == script.name() || name == script.prefix())
    }

    /// Script named by a line of a script file; only the prefix counts
    pub fn from_line(line: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|script| line.starts_with(script.prefix()))
    }
}

/// A parsed shell command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Read { lba: u32 },
    Write { lba: u32, value: u32 },
    /// `size` may exceed what a single device erase accepts
    Erase { lba: u32, size: u32 },
    /// Inclusive on both ends
    EraseRange { start: u32, end: u32 },
    FullWrite { value: u32 },
    FullRead,
    Flush,
    Help,
    Exit,
    Script(TestScript),
}

impl ShellCommand {
    /// Parse one input line
    pub fn parse(line: &str) -> Result<Self, ShellError> {
        let invalid = || ShellError::InvalidCommand(line.trim().to_string());
        let lba_arg = |text: &str| parse_lba(text).map_err(|_| invalid());
        let value_arg = |text: &str| parse_value(text).map_err(|_| invalid());

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let command = match tokens[..] {
            ["read", lba] => Self::Read { lba: lba_arg(lba)? },
            ["write", lba, value] => Self::Write {
                lba: lba_arg(lba)?,
                value: value_arg(value)?,
            },
            ["erase", lba, size] => {
                let lba = lba_arg(lba)?;
                let size = size.parse::<u32>().map_err(|_| invalid())?;
                if size == 0 || lba.checked_add(size).is_none_or(|end| end > LBA_COUNT) {
                    return Err(invalid());
                }
                Self::Erase { lba, size }
            }
            ["erase_range", start, end] => {
                let (start, end) = (lba_arg(start)?, lba_arg(end)?);
                if start > end {
                    return Err(invalid());
                }
                Self::EraseRange { start, end }
            }
            ["fullwrite", value] => Self::FullWrite {
                value: value_arg(value)?,
            },
            ["fullread"] => Self::FullRead,
            ["flush"] => Self::Flush,
            ["help"] => Self::Help,
            [word] if word.eq_ignore_ascii_case("exit") => Self::Exit,
            [name] => Self::Script(TestScript::from_name(name).ok_or_else(invalid)?),
            _ => return Err(invalid()),
        };
        Ok(command)
    }
}

fn verdict(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

/// The test shell
pub struct Shell<D, W> {
    driver: D,
    out: W,
    rng: StdRng,
}

impl<D: DeviceDriver, W: Write> Shell<D, W> {
    /// Create a shell whose scripts use fresh random values
    pub fn new(driver: D, out: W) -> Self {
        Self::with_rng(driver, out, StdRng::from_rng(&mut rand::rng()))
    }

    /// Create a shell whose scripts replay the same values for `seed`
    pub fn with_seed(driver: D, out: W, seed: u64) -> Self {
        Self::with_rng(driver, out, StdRng::seed_from_u64(seed))
    }

    fn with_rng(driver: D, out: W, rng: StdRng) -> Self {
        Self { driver, out, rng }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Read commands from `input` until `exit` or end of input
    pub fn run_interactive<R: BufRead>(&mut self, input: R) -> Result<(), ShellError> {
        let mut lines = input.lines();
        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            let Some(line) = lines.next() else {
                break;
            };
            if self.run_line(&line?)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Run one input line
    ///
    /// Invalid commands print [`INVALID_COMMAND`] and are not errors.
    pub fn run_line(&mut self, line: &str) -> Result<ControlFlow<()>, ShellError> {
        if line.trim().is_empty() {
            return Ok(ControlFlow::Continue(()));
        }

        match ShellCommand::parse(line).and_then(|command| self.execute(command)) {
            Err(e @ (ShellError::InvalidCommand(_) | ShellError::Rejected(_))) => {
                warn!(header = "shell", error = %e, "FAIL");
                writeln!(self.out, "{INVALID_COMMAND}")?;
                Ok(ControlFlow::Continue(()))
            }
            result => result,
        }
    }

    /// Execute a parsed command
    pub fn execute(&mut self, command: ShellCommand) -> Result<ControlFlow<()>, ShellError> {
        match command {
            ShellCommand::Read { lba } => {
                let value = self.read_value(lba)?;
                writeln!(self.out, "[Read] LBA {lba:02} : {value}")?;
                info!(header = "shell::read", "LBA {lba:02} : {value}");
            }
            ShellCommand::Write { lba, value } => {
                self.write(lba, value)?;
                writeln!(self.out, "[Write] Done")?;
                info!(header = "shell::write", "DONE");
            }
            ShellCommand::Erase { lba, size } => {
                self.erase(lba, size)?;
                writeln!(self.out, "[Erase] Done")?;
                info!(header = "shell::erase", "DONE");
            }
            ShellCommand::EraseRange { start, end } => {
                self.erase(start, end - start + 1)?;
                writeln!(self.out, "[Erase] Done")?;
                info!(header = "shell::erase_range", "DONE");
            }
            ShellCommand::FullWrite { value } => {
                for lba in 0..LBA_COUNT {
                    self.write(lba, value)?;
                }
                writeln!(self.out, "[Full Write] Done")?;
                info!(header = "shell::fullwrite", "DONE");
            }
            ShellCommand::FullRead => {
                writeln!(self.out, "[Full Read]")?;
                for lba in 0..LBA_COUNT {
                    let value = self.read_value(lba)?;
                    writeln!(self.out, "LBA {lba:02} : {value}")?;
                }
                info!(header = "shell::fullread", "DONE");
            }
            ShellCommand::Flush => {
                self.expect_done(Operation::Flush)?;
                writeln!(self.out, "[Flush] Done")?;
                info!(header = "shell::flush", "DONE");
            }
            ShellCommand::Help => {
                self.out.write_all(HELP.as_bytes())?;
                info!(header = "shell::help", "DONE");
            }
            ShellCommand::Exit => {
                info!(header = "shell::exit", "DONE");
                return Ok(ControlFlow::Break(()));
            }
            ShellCommand::Script(script) => {
                let verdict = verdict(self.run_script(script)?);
                writeln!(self.out, "{verdict}")?;
                info!(header = script.name(), "{verdict}");
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Run the scripts listed in a script file, one name per line
    ///
    /// Stops at the first script that fails. A file that cannot be read
    /// prints `ERROR`.
    pub fn run_script_file(&mut self, path: impl AsRef<Path>) -> Result<(), ShellError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(header = "shell::runner", path = %path.display(), error = %e, "FAIL");
                writeln!(self.out, "ERROR")?;
                return Ok(());
            }
        };

        for name in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            write!(self.out, "{name:<width$}___ Run... ", width = SCRIPT_NAME_WIDTH)?;
            self.out.flush()?;

            let Some(script) = TestScript::from_line(name) else {
                writeln!(self.out, "{INVALID_COMMAND}")?;
                warn!(header = "shell::runner", script = name, "FAIL");
                return Ok(());
            };

            let passed = self.run_script(script)?;
            writeln!(self.out, "{}", verdict(passed))?;
            info!(header = "shell::runner", script = script.name(), "{}", verdict(passed));
            if !passed {
                break;
            }
        }
        Ok(())
    }

    /// Run a test script, returning whether it passed
    #[instrument(skip(self))]
    pub fn run_script(&mut self, script: TestScript) -> Result<bool, ShellError> {
        match script {
            TestScript::FullWriteAndReadCompare => self.full_write_and_read_compare(),
            TestScript::PartialLbaWrite => self.partial_lba_write(),
            TestScript::WriteReadAging => self.write_read_aging(),
            TestScript::EraseAndWriteAging => self.erase_and_write_aging(),
        }
    }

    fn full_write_and_read_compare(&mut self) -> Result<bool, ShellError> {
        for start in (0..LBA_COUNT).step_by(5) {
            let values: Vec<u32> = (0..5).map(|_| self.rng.random()).collect();
            for (lba, &value) in (start..).zip(&values) {
                self.write(lba, value)?;
            }
            for (lba, &value) in (start..).zip(&values) {
                if self.read_value(lba)? != format_value(value) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn partial_lba_write(&mut self) -> Result<bool, ShellError> {
        for _ in 0..30 {
            let value: u32 = self.rng.random();
            for lba in PARTIAL_WRITE_ORDER {
                self.write(lba, value)?;
            }

            let reference = self.read_value(0)?;
            if reference != format_value(value) {
                return Ok(false);
            }
            for lba in 1..5 {
                if self.read_value(lba)? != reference {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn write_read_aging(&mut self) -> Result<bool, ShellError> {
        for _ in 0..200 {
            let value: u32 = self.rng.random();
            self.write(0, value)?;
            self.write(LAST_LBA, value)?;

            let first = self.read_value(0)?;
            let last = self.read_value(LAST_LBA)?;
            if first != last || first != format_value(value) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn erase_and_write_aging(&mut self) -> Result<bool, ShellError> {
        self.erase(0, 3)?;
        for _ in 0..30 {
            for lba in (2..LBA_COUNT).step_by(2) {
                let (first, second): (u32, u32) = (self.rng.random(), self.rng.random());
                self.write(lba, first)?;
                self.write(lba, second)?;

                let end = (lba + 2).min(LAST_LBA);
                self.erase(lba, end - lba + 1)?;
                if self.read_value(lba)? != format_value(0) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn expect_done(&mut self, op: Operation) -> Result<(), ShellError> {
        if self.driver.send(op)?.is_empty() {
            Ok(())
        } else {
            Err(ShellError::Rejected(op))
        }
    }

    fn write(&mut self, lba: u32, value: u32) -> Result<(), ShellError> {
        self.expect_done(Operation::Write { lba, value })
    }

    /// Erase `size` LBAs as a series of device erases
    fn erase(&mut self, lba: u32, size: u32) -> Result<(), ShellError> {
        let mut offset = 0;
        while offset < size {
            let chunk = (size - offset).min(MAX_ERASE_LEN);
            self.expect_done(Operation::Erase {
                lba: lba + offset,
                size: chunk,
            })?;
            offset += chunk;
        }
        Ok(())
    }

    /// Read `lba`, returning the value text of the response
    fn read_value(&mut self, lba: u32) -> Result<String, ShellError> {
        let op = Operation::Read { lba };
        let response = self.driver.send(op)?;
        match response.split_whitespace().collect::<Vec<_>>().as_slice() {
            [_, value] => Ok(value.to_string()),
            _ => Err(ShellError::Rejected(op)),
        }
    }
}

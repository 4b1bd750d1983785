//! File-backed device tests
//!
//! Each test opens the device fresh for every command, the way the `ssd`
//! binary does, so pending entries only survive through the buffer snapshot.

use std::fs;

use ssd_storage::device::write_output;
use ssd_storage::{BufferConfig, DevicePaths, LogEntry, Response, Ssd};
use tempfile::TempDir;

fn run_once(paths: &DevicePaths, args: &[&str]) -> String {
    let mut ssd = Ssd::open(paths, BufferConfig::default()).unwrap();
    let response = ssd.run(args).unwrap();
    write_output(&paths.output, &response).unwrap();
    ssd.save(paths).unwrap();
    fs::read_to_string(&paths.output).unwrap()
}

fn nand_line(paths: &DevicePaths, lba: usize) -> String {
    fs::read_to_string(&paths.nand)
        .unwrap()
        .lines()
        .nth(lba)
        .unwrap()
        .to_string()
}

#[test]
fn test_write_stays_pending_across_invocations() {
    let temp = TempDir::new().unwrap();
    let paths = DevicePaths::in_dir(temp.path());

    assert_eq!(run_once(&paths, &["W", "3", "0x1298CDEF"]), "");
    assert_eq!(nand_line(&paths, 3), "03 0x00000000");

    assert_eq!(run_once(&paths, &["R", "3"]), "03 0x1298CDEF\n");

    let ssd = Ssd::open(&paths, BufferConfig::default()).unwrap();
    assert_eq!(
        ssd.buffer().log(),
        &[LogEntry::Write { lba: 3, value: 0x1298CDEF }]
    );
}

#[test]
fn test_flush_reaches_nand_image() {
    let temp = TempDir::new().unwrap();
    let paths = DevicePaths::in_dir(temp.path());

    run_once(&paths, &["W", "3", "0x1298CDEF"]);
    run_once(&paths, &["E", "10", "5"]);
    assert_eq!(run_once(&paths, &["F"]), "");

    assert_eq!(nand_line(&paths, 3), "03 0x1298CDEF");
    let ssd = Ssd::open(&paths, BufferConfig::default()).unwrap();
    assert_eq!(ssd.buffer().pending_count(), 0);
}

#[test]
fn test_sixth_write_spills_to_nand() {
    let temp = TempDir::new().unwrap();
    let paths = DevicePaths::in_dir(temp.path());

    for lba in 0..6 {
        let value = format!("0x{:08X}", 0xA0 + lba);
        run_once(&paths, &["W", &lba.to_string(), &value]);
    }

    assert_eq!(nand_line(&paths, 0), "00 0x000000A0");
    assert_eq!(nand_line(&paths, 1), "01 0x00000000");
    assert_eq!(run_once(&paths, &["R", "5"]), "05 0x000000A5\n");
}

#[test]
fn test_invalid_command_writes_error() {
    let temp = TempDir::new().unwrap();
    let paths = DevicePaths::in_dir(temp.path());

    assert_eq!(run_once(&paths, &["W", "100", "0x1"]), "ERROR");
    assert_eq!(run_once(&paths, &["E", "95", "10"]), "ERROR");
    assert_eq!(run_once(&paths, &["Q"]), "ERROR");
}

#[test]
fn test_response_rendering_matches_output_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ssd_output.txt");

    write_output(&path, &Response::Value { lba: 7, value: 0xFF }).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "07 0x000000FF\n");

    write_output(&path, &Response::Done).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
}

//! Size-based rotation of the live log file
//!
//! Before each write, a live file larger than the limit is rotated:
//! previously rotated `until_*.log` files are renamed to `until_*.zip`, then
//! the live file becomes `until_<yymmdd>_<HH>h_<MM>m_<SS>s.log` and a fresh
//! live file is started.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::{FileConfig, RotationStrategy};

const ROTATED_PREFIX: &str = "until_";

/// Log file writer that rotates by size
#[derive(Debug)]
pub struct SizeRotatingFile {
    directory: PathBuf,
    path: PathBuf,
    max_bytes: Option<u64>,
    file: File,
    written: u64,
}

impl SizeRotatingFile {
    /// Open (or create) the live log file described by `config`
    pub fn open(config: &FileConfig) -> io::Result<Self> {
        fs::create_dir_all(&config.directory)?;
        let path = config.path();
        let file = open_append(&path)?;
        let written = file.metadata()?.len();

        let max_bytes = match config.rotation {
            RotationStrategy::Size(bytes) => Some(bytes),
            RotationStrategy::Never => None,
        };

        Ok(Self {
            directory: config.directory.clone(),
            path,
            max_bytes,
            file,
            written,
        })
    }

    /// Path of the live log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn needs_rotation(&self) -> bool {
        self.max_bytes.is_some_and(|max| self.written > max)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        for entry in fs::read_dir(&self.directory)? {
            let old = entry?.path();
            let stem = old
                .file_name()
                .and_then(|name| name.to_str())
                .filter(|name| name.starts_with(ROTATED_PREFIX))
                .and_then(|name| name.strip_suffix(".log"))
                .map(str::to_string);
            if let Some(stem) = stem {
                fs::rename(&old, unused_path(&self.directory, &stem, "zip"))?;
            }
        }

        let stamp = chrono::Local::now().format("%y%m%d_%Hh_%Mm_%Ss");
        let rotated = unused_path(&self.directory, &format!("{ROTATED_PREFIX}{stamp}"), "log");
        fs::rename(&self.path, &rotated)?;

        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

/// `<stem>.<extension>` under `directory`, or `<stem>_<n>.<extension>` with
/// the first free `n`
fn unused_path(directory: &Path, stem: &str, extension: &str) -> PathBuf {
    let mut candidate = directory.join(format!("{stem}.{extension}"));
    let mut n = 1;
    while candidate.exists() {
        candidate = directory.join(format!("{stem}_{n}.{extension}"));
        n += 1;
    }
    candidate
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for SizeRotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.needs_rotation() {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &Path, rotation: RotationStrategy) -> FileConfig {
        FileConfig {
            directory: dir.to_path_buf(),
            rotation,
            ..FileConfig::default()
        }
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_appends_to_existing_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("latest.log"), "old\n").unwrap();

        let mut file = SizeRotatingFile::open(&config(temp.path(), RotationStrategy::Never)).unwrap();
        file.write_all(b"new\n").unwrap();

        let text = fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "old\nnew\n");
    }

    #[test]
    fn test_rotates_when_over_limit() {
        let temp = TempDir::new().unwrap();
        let mut file =
            SizeRotatingFile::open(&config(temp.path(), RotationStrategy::Size(16))).unwrap();

        file.write_all(b"0123456789abcdefXYZ").unwrap();
        assert_eq!(names(temp.path()), vec!["latest.log"]);

        file.write_all(b"after\n").unwrap();
        let names = names(temp.path());
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|n| n.starts_with("until_") && n.ends_with(".log")));
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "after\n");
    }

    #[test]
    fn test_previous_rotations_are_archived() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("until_990101_00h_00m_00s.log"), "older").unwrap();
        fs::write(temp.path().join("latest.log"), "x".repeat(32)).unwrap();

        let mut file =
            SizeRotatingFile::open(&config(temp.path(), RotationStrategy::Size(16))).unwrap();
        file.write_all(b"line\n").unwrap();

        let names = names(temp.path());
        assert!(names.contains(&"until_990101_00h_00m_00s.zip".to_string()));
        assert_eq!(names.iter().filter(|n| n.ends_with(".log")).count(), 2);
    }

    #[test]
    fn test_rotations_within_one_second_keep_every_archive() {
        let temp = TempDir::new().unwrap();
        let mut file =
            SizeRotatingFile::open(&config(temp.path(), RotationStrategy::Size(4))).unwrap();

        // Every write after the first rotates
        for _ in 0..4 {
            file.write_all(b"0123456789").unwrap();
        }

        let names = names(temp.path());
        assert_eq!(names.len(), 4, "{names:?}");
        assert_eq!(names.iter().filter(|n| n.ends_with(".log")).count(), 2);
        assert_eq!(names.iter().filter(|n| n.ends_with(".zip")).count(), 2);
    }

    #[test]
    fn test_unused_path_adds_counter() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        assert_eq!(unused_path(dir, "until_x", "zip"), dir.join("until_x.zip"));

        fs::write(dir.join("until_x.zip"), "").unwrap();
        fs::write(dir.join("until_x_1.zip"), "").unwrap();
        assert_eq!(unused_path(dir, "until_x", "zip"), dir.join("until_x_2.zip"));
        assert_eq!(unused_path(dir, "until_x", "log"), dir.join("until_x.log"));
    }

    #[test]
    fn test_never_rotates() {
        let temp = TempDir::new().unwrap();
        let mut file = SizeRotatingFile::open(&config(temp.path(), RotationStrategy::Never)).unwrap();
        for _ in 0..100 {
            file.write_all(b"0123456789").unwrap();
        }
        assert_eq!(names(temp.path()), vec!["latest.log"]);
    }
}

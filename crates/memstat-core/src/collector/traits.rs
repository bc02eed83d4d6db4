//! Abstractions for stat-file access to enable testing and mocking.
//!
//! The `FileSystem` trait lets sessions read binary stat files from the real
//! cgroup hierarchy on Linux or from an in-memory mock in tests and CI.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An open stat file that yields a fresh snapshot on every read from offset 0.
pub trait StatFile: Send {
    /// Seeks to the start and reads the whole file into `buf`, replacing its
    /// contents. Returns the number of bytes read.
    fn read_from_start(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;
}

/// Abstraction for the filesystem operations a session needs.
pub trait FileSystem: Send + Sync {
    type File: StatFile;

    /// Opens a stat file for repeated reading.
    fn open(&self, path: &Path) -> io::Result<Self::File>;

    /// Writes a filter line to a control path. Typically needs privilege.
    fn write_control(&self, path: &Path, line: &str) -> io::Result<()>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

/// Stat file opened once and re-read with seek + read.
#[derive(Debug)]
pub struct RealStatFile {
    file: File,
    path: PathBuf,
}

impl RealStatFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatFile for RealStatFile {
    fn read_from_start(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(0))?;
        buf.clear();
        self.file.read_to_end(buf)
    }
}

impl FileSystem for RealFs {
    type File = RealStatFile;

    fn open(&self, path: &Path) -> io::Result<Self::File> {
        Ok(RealStatFile {
            file: File::open(path)?,
            path: path.to_path_buf(),
        })
    }

    fn write_control(&self, path: &Path, line: &str) -> io::Result<()> {
        // Kernel control files take the whole line in a single write.
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_real_fs_rereads_from_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.stat_bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let fs = RealFs::new();
        let mut file = fs.open(&path).unwrap();
        let mut buf = Vec::new();
        assert_eq!(file.read_from_start(&mut buf).unwrap(), 3);
        assert_eq!(buf, vec![1, 2, 3]);

        std::fs::write(&path, [9u8, 8]).unwrap();
        assert_eq!(file.read_from_start(&mut buf).unwrap(), 2);
        assert_eq!(buf, vec![9, 8]);
        assert_eq!(file.path(), path.as_path());
    }

    #[test]
    fn test_real_fs_write_control() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.stat.ks");
        std::fs::write(&path, "previous filter line that is long").unwrap();

        let fs = RealFs::new();
        fs.write_control(&path, "vmstats.state[0]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "vmstats.state[0]");
    }

    #[test]
    fn test_real_fs_missing_paths() {
        let fs = RealFs::new();
        let missing = Path::new("/nonexistent/memstat/12345");
        assert!(fs.open(missing).is_err());
        assert!(fs.write_control(missing, "a.b[0]").is_err());
    }
}

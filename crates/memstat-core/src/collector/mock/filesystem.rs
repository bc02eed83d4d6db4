//! In-memory mock filesystem for testing sessions without a kernel that
//! exposes binary stat files.
//!
//! Each path holds a queue of file contents. A read returns the front of the
//! queue and advances it while more than one version is queued, so a test can
//! script a provider that changes between polls. Control-file writes are
//! recorded for inspection.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::codec::{Checksum, EncodeError, Snapshot, WireEntry, encode_snapshot};
use crate::collector::traits::{FileSystem, StatFile};

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<PathBuf, VecDeque<Vec<u8>>>,
    control_writes: Vec<(PathBuf, String)>,
    /// Paths whose control writes fail with `PermissionDenied`.
    protected: HashSet<PathBuf>,
}

/// In-memory filesystem for testing.
///
/// Clones share state, so a test can keep a handle and change file contents
/// while a session holds an open file.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the contents of a file, discarding any queued versions.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = lock(&self.state);
        state
            .files
            .insert(path.as_ref().to_path_buf(), VecDeque::from([content.into()]));
    }

    /// Queues a later version of a file, returned after the current ones.
    pub fn push_contents(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = lock(&self.state);
        state
            .files
            .entry(path.as_ref().to_path_buf())
            .or_default()
            .push_back(content.into());
    }

    /// Encodes `snapshot` and sets it as the file contents.
    pub fn add_snapshot<E: WireEntry>(
        &mut self,
        path: impl AsRef<Path>,
        snapshot: &Snapshot<E>,
        checksum: Checksum,
    ) -> Result<(), EncodeError> {
        let bytes = encode_snapshot(snapshot, checksum)?;
        self.add_file(path, bytes);
        Ok(())
    }

    /// Makes control writes to `path` fail as if the caller lacked privilege.
    pub fn protect(&mut self, path: impl AsRef<Path>) {
        lock(&self.state)
            .protected
            .insert(path.as_ref().to_path_buf());
    }

    /// Filter lines written to `path`, oldest first.
    pub fn control_writes(&self, path: impl AsRef<Path>) -> Vec<String> {
        let path = path.as_ref();
        lock(&self.state)
            .control_writes
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

/// Open handle into a [`MockFs`] file.
#[derive(Debug)]
pub struct MockStatFile {
    state: Arc<Mutex<MockState>>,
    path: PathBuf,
}

impl StatFile for MockStatFile {
    fn read_from_start(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let mut state = lock(&self.state);
        let queue = state.files.get_mut(&self.path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file removed: {:?}", self.path),
            )
        })?;
        let content = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        buf.clear();
        buf.extend_from_slice(&content);
        Ok(content.len())
    }
}

impl FileSystem for MockFs {
    type File = MockStatFile;

    fn open(&self, path: &Path) -> io::Result<Self::File> {
        if !lock(&self.state).files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            ));
        }
        Ok(MockStatFile {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
        })
    }

    fn write_control(&self, path: &Path, line: &str) -> io::Result<()> {
        let mut state = lock(&self.state);
        if state.protected.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            ));
        }
        state
            .control_writes
            .push((path.to_path_buf(), line.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let fs = MockFs::new();
        let err = fs.open(Path::new("/nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_queued_versions_then_repeat_last() {
        let mut fs = MockFs::new();
        fs.add_file("/stat", vec![1u8]);
        fs.push_contents("/stat", vec![2u8, 2]);

        let mut file = fs.open(Path::new("/stat")).unwrap();
        let mut buf = Vec::new();
        file.read_from_start(&mut buf).unwrap();
        assert_eq!(buf, vec![1]);
        file.read_from_start(&mut buf).unwrap();
        assert_eq!(buf, vec![2, 2]);
        file.read_from_start(&mut buf).unwrap();
        assert_eq!(buf, vec![2, 2]);
    }

    #[test]
    fn test_clone_shares_state() {
        let mut fs = MockFs::new();
        fs.add_file("/stat", vec![1u8]);
        let mut file = fs.open(Path::new("/stat")).unwrap();

        let mut writer = fs.clone();
        writer.add_file("/stat", vec![7u8]);

        let mut buf = Vec::new();
        file.read_from_start(&mut buf).unwrap();
        assert_eq!(buf, vec![7]);
    }

    #[test]
    fn test_control_writes_recorded_and_protected() {
        let mut fs = MockFs::new();
        fs.write_control(Path::new("/ctl"), "a.b[0]").unwrap();
        fs.write_control(Path::new("/other"), "c.d[1]").unwrap();
        assert_eq!(fs.control_writes("/ctl"), vec!["a.b[0]".to_string()]);

        fs.protect("/ctl");
        let err = fs.write_control(Path::new("/ctl"), "a.b[1]").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(fs.control_writes("/ctl").len(), 1);
    }
}

//! Reader sessions over one binary stat file.
//!
//! A session applies its filter exactly once, before the stat file is
//! opened, and then polls by seeking to the start and re-reading. Filter
//! state therefore never changes under a reader mid-session; readers that
//! need a different filter open a new session.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{AnySnapshot, DecodeError, decode_snapshot};
use crate::collector::traits::{FileSystem, StatFile};
use crate::filter::{FilterError, FilterLimits, FilterSpec};

/// What a session reads and how it narrows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub data_path: PathBuf,
    /// Where the filter line is written; `None` writes to `data_path`.
    pub control_path: Option<PathBuf>,
    pub filter: FilterSpec,
    pub limits: FilterLimits,
}

impl SessionConfig {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            control_path: None,
            filter: FilterSpec::all(),
            limits: FilterLimits::default(),
        }
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_control_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.control_path = Some(path.into());
        self
    }

    pub fn with_limits(mut self, limits: FilterLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn control_path(&self) -> &Path {
        self.control_path.as_deref().unwrap_or(&self.data_path)
    }
}

#[derive(Debug)]
pub enum SessionError {
    /// Opening, reading or writing a file failed.
    Io { path: PathBuf, source: io::Error },
    Decode(DecodeError),
    Filter(FilterError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            SessionError::Decode(e) => write!(f, "decode error: {}", e),
            SessionError::Filter(e) => write!(f, "filter error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Io { source, .. } => Some(source),
            SessionError::Decode(e) => Some(e),
            SessionError::Filter(e) => Some(e),
        }
    }
}

impl From<DecodeError> for SessionError {
    fn from(e: DecodeError) -> Self {
        SessionError::Decode(e)
    }
}

impl From<FilterError> for SessionError {
    fn from(e: FilterError) -> Self {
        SessionError::Filter(e)
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> SessionError + '_ {
    move |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One open stat file plus the filter applied at open time.
pub struct StatSession<F: FileSystem> {
    config: SessionConfig,
    file: F::File,
    filter_line: Option<String>,
    buf: Vec<u8>,
    polls: u64,
    version_reported: bool,
}

impl<F: FileSystem> StatSession<F> {
    /// Writes the filter (if any) to the control path, then opens the data path.
    pub fn open(fs: &F, config: SessionConfig) -> Result<Self, SessionError> {
        let filter_line = if config.filter.is_all() {
            None
        } else {
            Some(config.filter.to_control_line(config.limits)?)
        };

        if let Some(line) = &filter_line {
            let control = config.control_path();
            fs.write_control(control, line)
                .map_err(io_error(control))?;
            info!(
                path = %control.display(),
                selectors = config.filter.selectors().len(),
                "filter applied"
            );
        }

        let file = fs
            .open(&config.data_path)
            .map_err(io_error(&config.data_path))?;
        debug!(path = %config.data_path.display(), "stat file opened");

        Ok(Self {
            config,
            file,
            filter_line,
            buf: Vec::with_capacity(4096),
            polls: 0,
            version_reported: false,
        })
    }

    /// Re-reads the file from the start and returns its raw bytes.
    pub fn read_raw(&mut self) -> Result<&[u8], SessionError> {
        self.file
            .read_from_start(&mut self.buf)
            .map_err(io_error(&self.config.data_path))?;
        self.polls += 1;
        Ok(&self.buf)
    }

    /// Re-reads the file and decodes a fresh snapshot.
    ///
    /// A decode failure leaves the raw bytes available via [`Self::last_bytes`].
    pub fn poll(&mut self) -> Result<AnySnapshot, SessionError> {
        self.read_raw()?;
        let snapshot = decode_snapshot(&self.buf).inspect_err(|e| {
            warn!(
                path = %self.config.data_path.display(),
                len = self.buf.len(),
                error = %e,
                "snapshot decode failed"
            );
        })?;

        let header = snapshot.header();
        if !header.is_known_version() && !self.version_reported {
            warn!(
                path = %self.config.data_path.display(),
                version = header.version,
                "unknown snapshot version, reading known fields only"
            );
            self.version_reported = true;
        }
        debug!(
            poll = self.polls,
            family = %header.family,
            entries = snapshot.len(),
            "snapshot decoded"
        );
        Ok(snapshot)
    }

    /// Bytes returned by the most recent read.
    pub fn last_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The control line written at open, if a filter was set.
    pub fn filter_line(&self) -> Option<&str> {
        self.filter_line.as_deref()
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

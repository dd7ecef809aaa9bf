//! PID files for the detached `discovery` and `audio-core` processes.
//!
//! The file holds the decimal PID and a trailing newline, nothing else.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::process;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("I/O error on PID file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("PID file {path} does not contain a valid PID: {content:?}")]
    Invalid { path: PathBuf, content: String },
}

/// What a PID file says about its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidStatus {
    /// No PID file.
    Absent,
    /// The recorded process is alive.
    Running(u32),
    /// The file names a process that no longer exists.
    Stale(u32),
}

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<name>.pid`
    pub fn in_dir(dir: &Path, name: &str) -> Self {
        Self::new(dir.join(format!("{name}.pid")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, pid: u32) -> Result<(), PidFileError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;
        }
        std::fs::write(&self.path, format!("{pid}\n")).map_err(|source| self.io_error(source))
    }

    /// Reads the recorded PID, or `None` if there is no file.
    pub fn read(&self) -> Result<Option<u32>, PidFileError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        match content.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => Ok(Some(pid)),
            _ => Err(PidFileError::Invalid {
                path: self.path.clone(),
                content: content.trim().to_string(),
            }),
        }
    }

    pub fn status(&self) -> Result<PidStatus, PidFileError> {
        Ok(match self.read()? {
            None => PidStatus::Absent,
            Some(pid) if process::is_alive(pid) => PidStatus::Running(pid),
            Some(pid) => PidStatus::Stale(pid),
        })
    }

    /// Deletes the file.  Returns `false` if it was already gone.
    pub fn remove(&self) -> Result<bool, PidFileError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Deletes the file only if it records `pid`.  Used by a foreground
    /// process on exit so it never removes a file written for someone else.
    pub fn remove_if_owned(&self, pid: u32) -> Result<bool, PidFileError> {
        match self.read() {
            Ok(Some(recorded)) if recorded == pid => self.remove(),
            Ok(_) | Err(PidFileError::Invalid { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn io_error(&self, source: io::Error) -> PidFileError {
        PidFileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

//! Supervision of external JackTrip stream processes.
//!
//! [`StreamSupervisor`] launches `jacktrip -C <peer> --clientname <name>`
//! per stream and keeps the child handles keyed by PID.  Stopping a stream
//! sends SIGTERM, waits up to the grace period, and kills the process if it
//! is still running.  Children are spawned with `kill_on_drop`, so dropping
//! the supervisor never leaves orphans behind.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::process;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream program '{program}' was not found")]
    ToolNotFound { program: String },

    #[error("failed to launch '{program}': {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("no stream is running with PID {0}")]
    UnknownProcess(u32),

    #[error("failed to signal stream PID {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// How a stopped stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// The process exited within the grace period.
    Exited(ExitStatus),
    /// The grace period ran out and the process was killed.
    Killed,
}

/// Arguments passed to the stream program.
pub fn stream_args(peer_address: &str, client_name: &str) -> [String; 4] {
    [
        "-C".to_string(),
        peer_address.to_string(),
        "--clientname".to_string(),
        client_name.to_string(),
    ]
}

#[derive(Debug)]
pub struct StreamSupervisor {
    program: String,
    stop_grace: Duration,
    children: HashMap<u32, Child>,
}

impl StreamSupervisor {
    pub fn new(program: impl Into<String>, stop_grace: Duration) -> Self {
        Self {
            program: program.into(),
            stop_grace,
            children: HashMap::new(),
        }
    }

    /// Launches a stream to `peer_address` and returns its PID.
    ///
    /// # Errors
    ///
    /// - [`StreamError::ToolNotFound`] if the program is not on `PATH` (or
    ///   the configured path does not exist).
    /// - [`StreamError::LaunchFailed`] if the OS refuses to start it.
    pub fn start_stream(&mut self, peer_address: &str, client_name: &str) -> Result<u32, StreamError> {
        let path = resolve_program(&self.program).ok_or_else(|| StreamError::ToolNotFound {
            program: self.program.clone(),
        })?;

        let launch_failed = |source| StreamError::LaunchFailed {
            program: self.program.clone(),
            source,
        };
        let child = Command::new(&path)
            .args(stream_args(peer_address, client_name))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_failed)?;
        let pid = child
            .id()
            .ok_or_else(|| launch_failed(io::Error::other("process exited before its PID was read")))?;

        info!(pid, peer = peer_address, client = client_name, program = %path.display(), "stream started");
        self.children.insert(pid, child);
        Ok(pid)
    }

    /// Stops the stream with `pid`, escalating to a kill after the grace
    /// period.
    ///
    /// # Errors
    ///
    /// - [`StreamError::UnknownProcess`] if `pid` is not a stream started by
    ///   this supervisor.
    /// - [`StreamError::Signal`] if the process could not be signalled or
    ///   killed.
    pub async fn stop_stream(&mut self, pid: u32) -> Result<StreamExit, StreamError> {
        let mut child = self
            .children
            .remove(&pid)
            .ok_or(StreamError::UnknownProcess(pid))?;

        match process::terminate(pid) {
            Ok(()) => debug!(pid, "sent SIGTERM to stream"),
            Err(e) if process::is_no_such_process(&e) => debug!(pid, "stream already exited"),
            Err(source) => return Err(StreamError::Signal { pid, source }),
        }

        match tokio::time::timeout(self.stop_grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid, %status, "stream stopped");
                Ok(StreamExit::Exited(status))
            }
            Ok(Err(source)) => Err(StreamError::Signal { pid, source }),
            Err(_) => {
                warn!(pid, grace_ms = self.stop_grace.as_millis() as u64, "stream ignored SIGTERM; killing");
                child
                    .kill()
                    .await
                    .map_err(|source| StreamError::Signal { pid, source })?;
                Ok(StreamExit::Killed)
            }
        }
    }

    /// Stops every tracked stream, returning each PID with its outcome.
    pub async fn stop_all(&mut self) -> Vec<(u32, Result<StreamExit, StreamError>)> {
        let pids = self.pids();
        let mut results = Vec::with_capacity(pids.len());
        for pid in pids {
            results.push((pid, self.stop_stream(pid).await));
        }
        results
    }

    /// Waits for the stream with `pid` to exit on its own and stops tracking
    /// it.
    pub async fn wait(&mut self, pid: u32) -> Result<ExitStatus, StreamError> {
        let child = self
            .children
            .get_mut(&pid)
            .ok_or(StreamError::UnknownProcess(pid))?;
        let status = child
            .wait()
            .await
            .map_err(|source| StreamError::Signal { pid, source })?;
        self.children.remove(&pid);
        Ok(status)
    }

    /// PIDs of tracked streams, ascending.
    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.children.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn is_tracked(&self, pid: u32) -> bool {
        self.children.contains_key(&pid)
    }
}

/// Resolves `program` to an executable path.  Names containing a path
/// separator are used as given; bare names are searched on `PATH`.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

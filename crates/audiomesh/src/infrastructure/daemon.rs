//! Detached background processes tracked by a PID file.
//!
//! `start_detached` re-launches the current executable with the same
//! arguments plus `--foreground`, redirects its output to a log file next to
//! the PID file, records the child's PID, and returns.  `stop_detached`
//! sends SIGTERM to the recorded PID and removes the file.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info};

use super::pidfile::{PidFile, PidFileError, PidStatus};
use super::process;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    PidFile(#[from] PidFileError),

    #[error("failed to open daemon log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch background process: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to signal PID {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A live process is already recorded; nothing was launched.
    AlreadyRunning(u32),
    /// A new background process was launched.
    Spawned(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No PID file.
    NotRunning,
    /// The PID file named a dead process; the file was removed.
    Stale(u32),
    /// SIGTERM was delivered and the file was removed.
    Signalled(u32),
}

/// Launches `program args… --foreground` in the background unless the PID
/// file names a live process.
// The launching CLI exits right after this returns; init reaps the child.
#[allow(clippy::zombie_processes)]
pub fn start_detached(
    pid_file: &PidFile,
    program: &Path,
    args: &[OsString],
    log_path: &Path,
) -> Result<StartOutcome, DaemonError> {
    match pid_file.status()? {
        PidStatus::Running(pid) => return Ok(StartOutcome::AlreadyRunning(pid)),
        PidStatus::Stale(pid) => {
            debug!(pid, path = %pid_file.path().display(), "removing stale PID file");
            pid_file.remove()?;
        }
        PidStatus::Absent => {}
    }

    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|source| DaemonError::Log {
            path: log_path.to_path_buf(),
            source,
        })?;
    let log_err = log.try_clone().map_err(|source| DaemonError::Log {
        path: log_path.to_path_buf(),
        source,
    })?;

    let mut command = Command::new(program);
    command
        .args(args)
        .arg("--foreground")
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err);
    #[cfg(unix)]
    {
        // Own process group, so a Ctrl-C in the launching terminal does not
        // reach the background process.
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command.spawn().map_err(DaemonError::Spawn)?;
    let pid = child.id();
    pid_file.write(pid)?;
    info!(pid, path = %pid_file.path().display(), "background process started");
    Ok(StartOutcome::Spawned(pid))
}

/// Signals the process recorded in `pid_file` and removes the file.
pub fn stop_detached(pid_file: &PidFile) -> Result<StopOutcome, DaemonError> {
    let outcome = match pid_file.status()? {
        PidStatus::Absent => return Ok(StopOutcome::NotRunning),
        PidStatus::Stale(pid) => StopOutcome::Stale(pid),
        PidStatus::Running(pid) => match process::terminate(pid) {
            Ok(()) => StopOutcome::Signalled(pid),
            Err(e) if process::is_no_such_process(&e) => StopOutcome::Stale(pid),
            Err(source) => return Err(DaemonError::Signal { pid, source }),
        },
    };
    pid_file.remove()?;
    Ok(outcome)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_stop_without_pid_file_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let file = PidFile::in_dir(dir.path(), "discovery");

        assert_eq!(stop_detached(&file).unwrap(), StopOutcome::NotRunning);
    }

    #[test]
    fn test_stop_with_stale_pid_removes_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let file = PidFile::in_dir(dir.path(), "discovery");
        file.write(i32::MAX as u32).unwrap();

        // Act
        let outcome = stop_detached(&file).unwrap();

        // Assert
        assert_eq!(outcome, StopOutcome::Stale(i32::MAX as u32));
        assert!(!file.path().exists());
    }

    #[test]
    fn test_stop_signals_recorded_process() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let file = PidFile::in_dir(dir.path(), "audio-core");
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        file.write(child.id()).unwrap();

        // Act
        let outcome = stop_detached(&file).unwrap();
        let status = child.wait().unwrap();

        // Assert
        assert_eq!(outcome, StopOutcome::Signalled(child.id()));
        assert!(!status.success());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_start_spawns_and_records_pid() {
        // Arrange: `sleep 30 --foreground` is rejected by sleep at once, which
        // is fine; only the launch and the PID file matter here.
        let dir = tempfile::tempdir().unwrap();
        let file = PidFile::in_dir(dir.path(), "discovery");
        let log = dir.path().join("discovery.log");

        // Act
        let outcome = start_detached(&file, Path::new("sleep"), &["30".into()], &log).unwrap();

        // Assert
        let StartOutcome::Spawned(pid) = outcome else {
            panic!("expected a spawn, got {outcome:?}");
        };
        assert_eq!(file.read().unwrap(), Some(pid));
        assert!(log.exists());
    }

    #[test]
    fn test_start_with_live_pid_does_not_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let file = PidFile::in_dir(dir.path(), "discovery");
        file.write(std::process::id()).unwrap();

        let outcome = start_detached(
            &file,
            Path::new("/nonexistent/audiomesh"),
            &[],
            &dir.path().join("d.log"),
        )
        .unwrap();

        assert_eq!(outcome, StartOutcome::AlreadyRunning(std::process::id()));
    }
}

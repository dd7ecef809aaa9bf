//! POSIX signal helpers shared by the stream supervisor and the PID-file
//! daemons.

use std::io;

#[cfg(unix)]
fn to_pid(pid: u32) -> io::Result<libc::pid_t> {
    // 0 and negative values address process groups, never a single process.
    match libc::pid_t::try_from(pid) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid process id {pid}"),
        )),
    }
}

/// Sends SIGTERM to `pid`.
#[cfg(unix)]
pub fn terminate(pid: u32) -> io::Result<()> {
    let pid = to_pid(pid)?;
    // SAFETY: kill(2) takes plain integers and has no memory-safety preconditions.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub fn terminate(pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot signal PID {pid} on this platform"),
    ))
}

/// Whether a process with this PID exists.  A process owned by another user
/// counts as alive.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let Ok(pid) = to_pid(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs the permission and existence checks only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    true
}

/// Whether `err` means the target process no longer exists.
#[cfg(unix)]
pub fn is_no_such_process(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ESRCH)
}

#[cfg(not(unix))]
pub fn is_no_such_process(_err: &io::Error) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn test_unused_pid_is_not_alive() {
        assert!(!is_alive(i32::MAX as u32));
    }

    #[test]
    fn test_pid_zero_is_rejected() {
        assert!(!is_alive(0));
        assert_eq!(terminate(0).unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_terminate_missing_process_reports_esrch() {
        let err = terminate(i32::MAX as u32).unwrap_err();
        assert!(is_no_such_process(&err));
    }

    #[test]
    fn test_terminate_stops_child() {
        // Arrange
        let mut child = std::process::Command::new("sleep").arg("30").spawn().expect("spawn sleep");

        // Act
        terminate(child.id()).expect("signal");
        let status = child.wait().expect("wait");

        // Assert
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }
}

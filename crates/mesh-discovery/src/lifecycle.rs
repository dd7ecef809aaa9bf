//! Lifecycle states shared by the announcer and the listener.
//!
//! ```text
//! Created ──► Starting ──► Running ──► Stopping ──► Stopped
//!                │                                     ▲
//!                └──────────── start() failed ─────────┘
//! ```
//!
//! Only `Running` sends announcements, processes datagrams, or sweeps.  There
//! is no way back from `Stopped`; a fresh instance is needed to run again.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed; `start()` has not been called.
    Created,
    /// Sockets are being set up.
    Starting,
    /// Background tasks are live.
    Running,
    /// Background tasks have been signalled and are being awaited.
    Stopping,
    /// Tasks have exited and the socket is released.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

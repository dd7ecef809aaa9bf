//! Multicast network components.
//!
//! - [`socket`] – socket2 setup for the send and receive sockets
//! - [`announcer`] – periodic announcement sender
//! - [`listener`] – announcement receiver and timeout sweep
//!
//! Each component owns one socket and one or two tokio tasks.  Shutdown is
//! signalled over a `watch` channel and `stop()` awaits the task handles, so
//! after `stop()` returns no callback is running and the socket is closed.

pub mod announcer;
pub mod listener;
pub mod socket;

/// Clock used by the background tasks.
///
/// Goes through tokio's clock so paused-time tests can drive sweeps.
pub(crate) fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

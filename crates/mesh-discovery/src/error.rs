//! Error types for discovery operations.

use std::net::SocketAddr;
use std::time::Duration;

use mesh_core::NodeId;
use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Error type for announcer and listener operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Creating, configuring, binding, or joining the multicast socket failed.
    ///
    /// Fatal to `start()`.
    #[error("failed to set up discovery socket on {addr}: {source}")]
    SocketSetup {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A single announcement could not be transmitted.
    ///
    /// The periodic loop logs this and tries again on the next tick.
    #[error("failed to send announcement to {dest}: {source}")]
    Send {
        dest: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `start()` was called on an instance that is not freshly created.
    #[error("cannot start: instance is already {0}")]
    InvalidState(LifecycleState),

    /// A configuration value cannot be used (for example a zero interval).
    #[error("invalid discovery configuration: {0}")]
    InvalidConfig(String),
}

/// Reported to [`crate::PeerObserver::on_timeout`] when a peer is evicted.
///
/// This is a notification payload, never something that stops the listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("peer {node_id} timed out after {silent_for:?} of silence (timeout {timeout:?})")]
pub struct PeerTimeoutError {
    pub node_id: NodeId,
    /// Time since the peer's last announcement when the sweep noticed it.
    pub silent_for: Duration,
    /// The listener's configured peer timeout.
    pub timeout: Duration,
}

//! Construction parameters for the announcer and the listener.
//!
//! Both sides of a discovery domain must agree on the multicast group and
//! port; everything else is local to one node.  The structs are plain data
//! with no environment reads, so callers (the CLI, tests) decide where the
//! values come from.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use mesh_core::protocol::messages::{DEFAULT_MULTICAST_GROUP, DEFAULT_MULTICAST_PORT};
use mesh_core::NodeId;

use crate::error::DiscoveryError;

/// Default time between announcements.
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(5);

/// Default silence after which a peer is considered gone.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// Keeps announcements on the local segment.
pub const DEFAULT_MULTICAST_TTL: u32 = 1;

/// The reference deployment's group, `239.255.0.1:50000`.
pub fn default_group() -> SocketAddrV4 {
    SocketAddrV4::new(DEFAULT_MULTICAST_GROUP, DEFAULT_MULTICAST_PORT)
}

/// Settings for an [`crate::Announcer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncerConfig {
    /// Identifier carried in every announcement.  Supplied by the caller.
    pub node_id: NodeId,
    /// Service port advertised to peers.
    pub service_port: u16,
    /// Time between periodic announcements.
    pub interval: Duration,
    /// Local interface address to bind and send from.
    pub interface: Ipv4Addr,
    /// Destination multicast group and port.
    pub group: SocketAddrV4,
    /// `IP_MULTICAST_TTL` for outbound packets.
    pub multicast_ttl: u32,
}

impl AnnouncerConfig {
    /// Creates a config with default interval, interface, group, and TTL.
    pub fn new(node_id: NodeId, service_port: u16) -> Self {
        Self {
            node_id,
            service_port,
            interval: DEFAULT_ANNOUNCE_INTERVAL,
            interface: Ipv4Addr::UNSPECIFIED,
            group: default_group(),
            multicast_ttl: DEFAULT_MULTICAST_TTL,
        }
    }

    /// Rejects a zero interval, which would turn the send loop into a spin.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.interval.is_zero() {
            return Err(DiscoveryError::InvalidConfig(
                "announce interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for a [`crate::Listener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Local interface address to bind and join the group on.
    pub interface: Ipv4Addr,
    /// Multicast group to join; its port is the port the listener binds.
    pub group: SocketAddrV4,
    /// Silence after which a peer is evicted.  Also the sweep interval, so
    /// eviction happens between 1× and 2× this value after the last
    /// announcement.
    pub peer_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            interface: Ipv4Addr::UNSPECIFIED,
            group: default_group(),
            peer_timeout: DEFAULT_PEER_TIMEOUT,
        }
    }
}

impl ListenerConfig {
    /// Rejects a zero peer timeout, which is also the sweep period.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.peer_timeout.is_zero() {
            return Err(DiscoveryError::InvalidConfig(
                "peer timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

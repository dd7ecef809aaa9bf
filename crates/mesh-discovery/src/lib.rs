//! mesh-discovery library entry point.
//!
//! LAN peer discovery over IP multicast.  Two independent components share
//! nothing but the 26-byte wire format from `mesh-core`:
//!
//! - [`Announcer`] – owns a send-only multicast socket and sends this node's
//!   announcement once on start and then on a fixed interval.
//! - [`Listener`] – owns a receive-only multicast socket, reports every valid
//!   announcement to a [`PeerObserver`], and sweeps out peers that have gone
//!   silent for longer than the peer timeout.
//!
//! # Layering
//!
//! ```text
//! application/     PeerObserver trait, PeerTracker (receive + sweep rules)
//! infrastructure/  socket2 setup, Announcer and Listener tokio tasks
//! ```
//!
//! The application layer never touches a socket, so the receive path and the
//! sweep can be driven in tests with crafted datagrams and explicit instants.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mesh_core::NodeId;
//! use mesh_discovery::{Announcer, AnnouncerConfig, CallbackObserver, Listener, ListenerConfig};
//!
//! # async fn run() -> Result<(), mesh_discovery::DiscoveryError> {
//! let mut announcer = Announcer::new(AnnouncerConfig::new(NodeId::random(), 4464));
//! announcer.start().await?;
//!
//! let observer = CallbackObserver::new(|peer| println!("{} at {}", peer.node_id, peer.source_ip))
//!     .with_removed(|node_id| println!("{node_id} left"));
//! let mut listener = Listener::new(ListenerConfig::default(), Arc::new(observer));
//! listener.start().await?;
//!
//! // ... later
//! listener.stop().await;
//! announcer.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod lifecycle;

pub use application::observer::{
    CallbackObserver, ChannelObserver, DiscoveryEvent, PeerAnnouncement, PeerObserver,
};
pub use application::peer_tracker::PeerTracker;
pub use config::{AnnouncerConfig, ListenerConfig};
pub use error::{DiscoveryError, PeerTimeoutError};
pub use infrastructure::network::{announcer::Announcer, listener::Listener};
pub use lifecycle::LifecycleState;

//! # mesh-core
//!
//! Shared library for AudioMesh containing the discovery wire codec, the
//! node identifier type, and the peer liveness table.
//!
//! This crate is used by both the discovery runtime and the CLI.
//! It has zero dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview
//!
//! AudioMesh nodes find each other on a LAN by multicasting a tiny fixed-size
//! announcement every few seconds.  Every node listens for those announcements
//! and keeps a table of who it has heard from recently; peers that go quiet
//! for longer than a timeout are evicted.
//!
//! This crate (`mesh-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How an announcement travels over the network.  The
//!   record is encoded into exactly 26 bytes (16-byte node id, 16-bit service
//!   port, 64-bit timestamp) in network byte order.
//!
//! - **`domain`** – Pure liveness bookkeeping with no clock of its own.  The
//!   [`PeerTable`] is fed explicit `Instant`s, which keeps expiry rules
//!   deterministic and easy to test.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `mesh_core::NodeId` instead of `mesh_core::protocol::messages::NodeId`.
pub use domain::peers::{ExpiredPeer, PeerTable, PeerUpdate};
pub use protocol::codec::{decode_announcement, encode_announcement, DecodeError};
pub use protocol::messages::{Announcement, NodeId};

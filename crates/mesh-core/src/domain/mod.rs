//! Domain entities for AudioMesh discovery.
//!
//! This module contains pure liveness bookkeeping with no infrastructure
//! dependencies.  Nothing here reads a clock, opens a socket, or spawns a
//! task: callers pass in the `Instant` at which something happened, so every
//! rule can be exercised in a plain unit test.

/// Peer liveness table — last-seen times keyed by node id.
///
/// See [`peers::PeerTable`] for the main type.
pub mod peers;

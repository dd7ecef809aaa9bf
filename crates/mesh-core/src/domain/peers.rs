//! Peer liveness table.
//!
//! The `PeerTable` remembers, for every node that has announced itself, the
//! local monotonic instant of its most recent announcement.  It answers one
//! question on each sweep: which peers have been silent for longer than the
//! timeout?
//!
//! # Lifecycle of an entry
//!
//! ```text
//! announcement ──► observe() ──► entry created (PeerUpdate::New)
//!                                   │
//! announcement ──► observe() ──► entry refreshed (PeerUpdate::Refreshed)
//!                                   │
//! sweep ─────────► expire()  ──► removed once now - last_seen > timeout
//! ```
//!
//! An entry is keyed only by node id.  A peer that reappears from a new IP
//! address or source port refreshes its existing entry instead of creating a
//! second one.
//!
//! # Expiry granularity
//!
//! The table itself is exact: `expire(now)` removes precisely the peers whose
//! silence exceeds the timeout at `now`.  How promptly that is noticed depends
//! on how often the caller sweeps; the discovery listener sweeps once per
//! timeout, so a silent peer is reported between 1× and 2× the timeout after
//! its last announcement.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::protocol::messages::NodeId;

/// Result of recording an announcement in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerUpdate {
    /// The node was not in the table before this announcement.
    New,
    /// The node was already known; its last-seen instant moved forward.
    Refreshed,
}

/// A peer removed by [`PeerTable::expire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredPeer {
    pub node_id: NodeId,
    /// How long the peer had been silent when it was evicted.
    pub silent_for: Duration,
}

/// In-memory liveness table for one listener.
///
/// # HashMap choice
///
/// A `HashMap<NodeId, Instant>` gives O(1) refresh on the hot receive path.
/// Sweeps walk the whole map, which is fine for LAN-sized peer counts.
#[derive(Debug, Clone)]
pub struct PeerTable {
    last_seen: HashMap<NodeId, Instant>,
    timeout: Duration,
}

impl PeerTable {
    /// Creates an empty table that expires peers silent for longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: HashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Records an announcement from `node_id` received at `now`.
    pub fn observe(&mut self, node_id: NodeId, now: Instant) -> PeerUpdate {
        match self.last_seen.insert(node_id, now) {
            Some(_) => PeerUpdate::Refreshed,
            None => PeerUpdate::New,
        }
    }

    /// Removes and returns every peer with `now - last_seen > timeout`.
    ///
    /// The comparison is strict: a peer silent for exactly `timeout` survives.
    /// The result is sorted by node id so callers see a stable order.
    pub fn expire(&mut self, now: Instant) -> Vec<ExpiredPeer> {
        let timeout = self.timeout;
        let mut expired: Vec<ExpiredPeer> = self
            .last_seen
            .iter()
            .filter_map(|(node_id, last)| {
                let silent_for = now.saturating_duration_since(*last);
                (silent_for > timeout).then_some(ExpiredPeer {
                    node_id: *node_id,
                    silent_for,
                })
            })
            .collect();
        expired.sort_by_key(|peer| peer.node_id);

        for peer in &expired {
            self.last_seen.remove(&peer.node_id);
        }
        expired
    }

    /// Returns the last-seen instant for a peer, if it is known.
    pub fn last_seen(&self, node_id: &NodeId) -> Option<Instant> {
        self.last_seen.get(node_id).copied()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.last_seen.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    /// Returns the known node ids, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.last_seen.keys().copied().collect();
        ids.sort();
        ids
    }
}

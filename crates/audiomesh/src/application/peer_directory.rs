//! The CLI's view of the mesh.
//!
//! [`PeerDirectory`] folds [`DiscoveryEvent`]s into a sorted
//! `node_id → (address, port, timestamp)` map and reports which changes are
//! worth printing.  A plain refresh from an unchanged address is not a
//! change; the peer's timestamp is updated silently.

use std::collections::BTreeMap;
use std::net::IpAddr;

use mesh_core::NodeId;
use mesh_discovery::{DiscoveryEvent, PeerAnnouncement};
use serde::Serialize;

/// What happened to a peer, as printed in the `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Timeout,
    Removed,
}

/// A printable peer change.  Address fields are omitted when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerChange {
    pub event: ChangeKind,
    pub node_id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
}

impl PeerChange {
    fn with_record(event: ChangeKind, node_id: NodeId, record: Option<&PeerRecord>) -> Self {
        Self {
            event,
            node_id,
            ip: record.map(|r| r.ip),
            port: record.map(|r| r.port),
            timestamp_ms: record.map(|r| r.timestamp_ms),
        }
    }
}

/// Last known details of one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub node_id: NodeId,
    pub ip: IpAddr,
    pub port: u16,
    pub timestamp_ms: u64,
}

impl From<&PeerAnnouncement> for PeerRecord {
    fn from(a: &PeerAnnouncement) -> Self {
        Self {
            node_id: a.node_id,
            ip: a.source_ip,
            port: a.service_port,
            timestamp_ms: a.timestamp_ms,
        }
    }
}

#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: BTreeMap<NodeId, PeerRecord>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event, returning the change to report if any.
    pub fn apply(&mut self, event: DiscoveryEvent) -> Option<PeerChange> {
        match event {
            DiscoveryEvent::Announced(announcement) => {
                let record = PeerRecord::from(&announcement);
                let node_id = record.node_id;
                let kind = match self.peers.insert(node_id, record) {
                    None => ChangeKind::Added,
                    Some(prev) if prev.ip != announcement.source_ip || prev.port != announcement.service_port => {
                        ChangeKind::Updated
                    }
                    Some(_) => return None,
                };
                Some(PeerChange::with_record(kind, node_id, self.peers.get(&node_id)))
            }
            DiscoveryEvent::TimedOut(error) => Some(PeerChange::with_record(
                ChangeKind::Timeout,
                error.node_id,
                self.peers.get(&error.node_id),
            )),
            DiscoveryEvent::Removed(node_id) => {
                let removed = self.peers.remove(&node_id);
                Some(PeerChange::with_record(ChangeKind::Removed, node_id, removed.as_ref()))
            }
        }
    }

    /// Known peers in ascending node-id order.
    pub fn rows(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&PeerRecord> {
        self.peers.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

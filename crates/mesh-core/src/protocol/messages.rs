//! Discovery announcement types and wire constants.
//!
//! An announcement is the only message on the discovery channel.  It has a
//! fixed layout, so there is no header, version byte, or length prefix: a
//! datagram either is exactly [`ANNOUNCEMENT_SIZE`] bytes long or it is not an
//! announcement at all.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// ── Wire constants ────────────────────────────────────────────────────────────

/// Width of the node identifier field in bytes.
pub const NODE_ID_LEN: usize = 16;

/// Total size of an encoded announcement in bytes (16 + 2 + 8).
pub const ANNOUNCEMENT_SIZE: usize = NODE_ID_LEN + 2 + 8;

/// Byte offset of the big-endian `u16` service port.
pub const PORT_OFFSET: usize = 16;

/// Byte offset of the big-endian `u64` millisecond timestamp.
pub const TIMESTAMP_OFFSET: usize = 18;

/// Multicast group used by the reference deployment.
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

/// UDP port used by the reference deployment.
pub const DEFAULT_MULTICAST_PORT: u16 = 50000;

// ── Node identifier ───────────────────────────────────────────────────────────

/// Opaque 16-byte node identifier.
///
/// Nodes normally use a random UUID, but the wire format does not validate
/// UUID structure: any 16 bytes are a valid `NodeId` and survive a round trip
/// unchanged.  `Display` renders the bytes in hyphenated UUID form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_ID_LEN]);

impl NodeId {
    /// Wraps raw identifier bytes.
    pub const fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random (v4 UUID) identifier.
    pub fn random() -> Self {
        Self::from(Uuid::new_v4())
    }

    /// Returns the raw identifier bytes.
    pub const fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Reinterprets the identifier bytes as a UUID.
    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.into_bytes())
    }
}

impl From<[u8; NODE_ID_LEN]> for NodeId {
    fn from(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_uuid().hyphenated(), f)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_uuid().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(Self::from)
    }
}

// ── Announcement ──────────────────────────────────────────────────────────────

/// One presence announcement as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Announcement {
    /// Identifier of the announcing node.
    pub node_id: NodeId,
    /// Port on which the announcing node offers its service.
    pub port: u16,
    /// Sender's clock in milliseconds when the packet was built.
    ///
    /// Informational only: receivers must not order or expire peers by it.
    pub timestamp_ms: u64,
}

impl Announcement {
    pub fn new(node_id: NodeId, port: u16, timestamp_ms: u64) -> Self {
        Self {
            node_id,
            port,
            timestamp_ms,
        }
    }

    /// Builds an announcement stamped with the current wall-clock time.
    pub fn now(node_id: NodeId, port: u16) -> Self {
        Self::new(node_id, port, current_timestamp_ms())
    }
}

/// Returns the current time as milliseconds since the Unix epoch.
///
/// A clock set before 1970 yields 0 rather than an error.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announcement_size_is_26_bytes() {
        assert_eq!(ANNOUNCEMENT_SIZE, 26);
        assert_eq!(TIMESTAMP_OFFSET + 8, ANNOUNCEMENT_SIZE);
    }

    #[test]
    fn test_node_id_display_uses_hyphenated_uuid() {
        // Arrange
        let uuid = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();

        // Act
        let id = NodeId::from(uuid);

        // Assert
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn test_node_id_accepts_non_uuid_bytes() {
        // b"a" * 16 is not a well-formed v4 UUID but must still be usable.
        let id = NodeId::from_bytes([b'a'; 16]);
        assert_eq!(id.as_bytes(), &[b'a'; 16]);
    }

    #[test]
    fn test_random_node_ids_differ() {
        assert_ne!(NodeId::random(), NodeId::random());
    }

    #[test]
    fn test_announcement_now_has_positive_timestamp() {
        let ann = Announcement::now(NodeId::random(), 4464);
        assert!(ann.timestamp_ms > 0, "timestamp must be positive");
        assert_eq!(ann.port, 4464);
    }
}

//! Integration tests for the mesh-core announcement codec.
//!
//! These tests exercise the codec and the liveness table through the public
//! API only, the same way the discovery runtime uses them.

use std::time::{Duration, Instant};

use mesh_core::{
    decode_announcement, encode_announcement,
    protocol::messages::{ANNOUNCEMENT_SIZE, PORT_OFFSET, TIMESTAMP_OFFSET},
    Announcement, DecodeError, NodeId, PeerTable, PeerUpdate,
};
use uuid::Uuid;

/// Encodes an announcement and decodes it again.
fn roundtrip(ann: Announcement) -> Announcement {
    let bytes = encode_announcement(&ann);
    assert_eq!(bytes.len(), ANNOUNCEMENT_SIZE, "encoded size must be fixed");
    decode_announcement(&bytes).expect("decode must succeed")
}

#[test]
fn test_roundtrip_uuid_node_id() {
    let original = Announcement::new(NodeId::from(Uuid::new_v4()), 1234, 42);
    assert_eq!(original, roundtrip(original));
}

#[test]
fn test_roundtrip_arbitrary_node_id_bytes() {
    // Any 16 bytes are a valid node id, UUID-shaped or not.
    let mut raw = [0u8; 16];
    for (i, b) in raw.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(37);
    }
    let original = Announcement::new(NodeId::from_bytes(raw), 65535, u64::MAX);

    assert_eq!(original, roundtrip(original));
}

#[test]
fn test_crafted_packet_matches_reference_bytes() {
    // Arrange: encode(b"b" * 16, 10, 99)
    let ann = Announcement::new(NodeId::from_bytes([b'b'; 16]), 10, 99);

    // Act
    let bytes = encode_announcement(&ann);

    // Assert
    let mut expected = vec![b'b'; 16];
    expected.extend_from_slice(&[0x00, 0x0A]);
    expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0x63]);
    assert_eq!(bytes.to_vec(), expected);
}

#[test]
fn test_port_is_readable_at_fixed_offset() {
    let bytes = encode_announcement(&Announcement::new(NodeId::from_bytes([b'a'; 16]), 5001, 7));

    let port = u16::from_be_bytes([bytes[PORT_OFFSET], bytes[PORT_OFFSET + 1]]);
    let ts = u64::from_be_bytes(bytes[TIMESTAMP_OFFSET..].try_into().unwrap());

    assert_eq!(port, 5001);
    assert_eq!(ts, 7);
}

#[test]
fn test_every_other_length_is_rejected() {
    let buf = vec![0u8; 64];
    for len in (0..64).filter(|&n| n != ANNOUNCEMENT_SIZE) {
        assert_eq!(
            decode_announcement(&buf[..len]),
            Err(DecodeError::InvalidLength {
                expected: ANNOUNCEMENT_SIZE,
                actual: len
            }),
            "length {len} must be rejected"
        );
    }
}

#[test]
fn test_decoded_announcements_drive_the_peer_table() {
    // Arrange
    let mut table = PeerTable::new(Duration::from_secs(10));
    let t0 = Instant::now();
    let a = roundtrip(Announcement::new(NodeId::from_bytes([1; 16]), 1, 0));
    let b = roundtrip(Announcement::new(NodeId::from_bytes([2; 16]), 2, 0));

    // Act
    assert_eq!(table.observe(a.node_id, t0), PeerUpdate::New);
    assert_eq!(table.observe(b.node_id, t0 + Duration::from_secs(9)), PeerUpdate::New);
    let expired = table.expire(t0 + Duration::from_secs(11));

    // Assert
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].node_id, a.node_id);
    assert_eq!(table.node_ids(), vec![b.node_id]);
}

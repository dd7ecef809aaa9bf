//! Binary codec for discovery announcements.
//!
//! Wire format:
//! ```text
//! [node_id:16][port:2][timestamp_ms:8]
//! ```
//! Total size: 26 bytes. All multi-byte integers are big-endian.
//!
//! There is no checksum or version byte.  Corruption is left to the transport
//! (UDP already carries a checksum) and anything that is not exactly 26 bytes
//! long is rejected before any field is read.

use thiserror::Error;

use crate::protocol::messages::{
    Announcement, NodeId, ANNOUNCEMENT_SIZE, NODE_ID_LEN, PORT_OFFSET, TIMESTAMP_OFFSET,
};

/// Errors that can occur while decoding an announcement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The datagram is not exactly [`ANNOUNCEMENT_SIZE`] bytes long.
    #[error("invalid announcement length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`Announcement`] into its fixed 26-byte wire form.
///
/// Encoding cannot fail: every field has a fixed width.
///
/// # Examples
///
/// ```rust
/// use mesh_core::{decode_announcement, encode_announcement, Announcement, NodeId};
///
/// let ann = Announcement::new(NodeId::from_bytes([b'b'; 16]), 10, 99);
/// let bytes = encode_announcement(&ann);
/// assert_eq!(bytes.len(), 26);
/// assert_eq!(decode_announcement(&bytes).unwrap(), ann);
/// ```
pub fn encode_announcement(announcement: &Announcement) -> [u8; ANNOUNCEMENT_SIZE] {
    let mut buf = [0u8; ANNOUNCEMENT_SIZE];
    buf[..NODE_ID_LEN].copy_from_slice(announcement.node_id.as_bytes());
    buf[PORT_OFFSET..TIMESTAMP_OFFSET].copy_from_slice(&announcement.port.to_be_bytes());
    buf[TIMESTAMP_OFFSET..].copy_from_slice(&announcement.timestamp_ms.to_be_bytes());
    buf
}

/// Decodes an [`Announcement`] from a datagram.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] unless `bytes` is exactly
/// [`ANNOUNCEMENT_SIZE`] long.  Trailing data is not tolerated.
///
/// # Examples
///
/// ```rust
/// use mesh_core::{decode_announcement, DecodeError};
///
/// assert_eq!(
///     decode_announcement(b"bad"),
///     Err(DecodeError::InvalidLength { expected: 26, actual: 3 })
/// );
/// ```
pub fn decode_announcement(bytes: &[u8]) -> Result<Announcement, DecodeError> {
    let bytes: &[u8; ANNOUNCEMENT_SIZE] =
        bytes.try_into().map_err(|_| DecodeError::InvalidLength {
            expected: ANNOUNCEMENT_SIZE,
            actual: bytes.len(),
        })?;

    let mut node_id = [0u8; NODE_ID_LEN];
    node_id.copy_from_slice(&bytes[..NODE_ID_LEN]);

    let port = u16::from_be_bytes([bytes[PORT_OFFSET], bytes[PORT_OFFSET + 1]]);

    let mut timestamp = [0u8; 8];
    timestamp.copy_from_slice(&bytes[TIMESTAMP_OFFSET..]);

    Ok(Announcement {
        node_id: NodeId::from_bytes(node_id),
        port,
        timestamp_ms: u64::from_be_bytes(timestamp),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

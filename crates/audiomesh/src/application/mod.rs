//! Application layer: turning discovery events into what the CLI shows.

pub mod peer_directory;

pub use peer_directory::{ChangeKind, PeerChange, PeerDirectory, PeerRecord};

//! Protocol module containing the announcement record and its binary codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_announcement, encode_announcement, DecodeError};
pub use messages::*;

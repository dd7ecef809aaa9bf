//! Application layer: what the listener does with a datagram or a sweep tick,
//! independent of sockets and tasks.

pub mod observer;
pub mod peer_tracker;

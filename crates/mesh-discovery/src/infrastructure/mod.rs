//! Infrastructure layer: sockets and background tasks.

pub mod network;

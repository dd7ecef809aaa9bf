//! AudioMesh node library.
//!
//! Backs the `audiomesh` binary.  Discovery itself lives in
//! `mesh-discovery`; this crate adds what a node needs around it:
//!
//! ```text
//! domain/          AppConfig (TOML, platform config dir)
//! application/     PeerDirectory: discovery events → printable changes
//! infrastructure/  stream supervisor, health API, PID files, daemons, output
//! cli              clap definitions
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

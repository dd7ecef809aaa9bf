//! Infrastructure layer: processes, files, HTTP, and stdout.
//!
//! - [`stream`] – JackTrip process supervision
//! - [`health`] – axum health endpoint
//! - [`pidfile`] / [`daemon`] – detached background commands
//! - [`process`] – POSIX signal helpers
//! - [`output`] – table and JSON-lines rendering

pub mod daemon;
pub mod health;
pub mod output;
pub mod pidfile;
pub mod process;
pub mod stream;

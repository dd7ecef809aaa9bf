//! Command-line definitions for the `audiomesh` binary.
//!
//! ```text
//! audiomesh [--config PATH] discovery start [--foreground] [--json] [--interface IP]
//!                                           [--service-port N] [--node-id UUID]
//!                                           [--timeout-ms N] [--pid-file PATH]
//! audiomesh [--config PATH] discovery stop [--pid-file PATH]
//! audiomesh [--config PATH] audio-core start --peer IP --name NAME [--foreground]
//! audiomesh [--config PATH] audio-core stop [--pid-file PATH]
//! audiomesh [--config PATH] api [--bind IP] [--port N]
//! ```
//!
//! Flags override values from the config file; the overrides are applied by
//! the `apply_to` methods so the binary never mixes the two sources by hand.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::domain::AppConfig;
use crate::infrastructure::output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "audiomesh",
    about = "LAN peer discovery and JackTrip stream control for AudioMesh nodes",
    version
)]
pub struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config dir.
    #[arg(long, global = true, env = "AUDIOMESH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Announce this node and watch for peers.
    Discovery {
        #[command(subcommand)]
        action: DiscoveryAction,
    },
    /// Run or stop a JackTrip stream to a peer.
    AudioCore {
        #[command(subcommand)]
        action: AudioCoreAction,
    },
    /// Serve the HTTP health endpoint.
    Api(ApiArgs),
}

#[derive(Debug, Subcommand)]
pub enum DiscoveryAction {
    Start(DiscoveryStartArgs),
    Stop(StopArgs),
}

#[derive(Debug, Subcommand)]
pub enum AudioCoreAction {
    Start(AudioCoreStartArgs),
    Stop(StopArgs),
}

#[derive(Debug, Args)]
pub struct DiscoveryStartArgs {
    /// Stay attached to the terminal instead of running in the background.
    #[arg(long)]
    pub foreground: bool,

    /// Print one JSON object per peer change instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Interface address to announce and listen on.
    #[arg(long)]
    pub interface: Option<Ipv4Addr>,

    /// Service port advertised to peers.
    #[arg(long)]
    pub service_port: Option<u16>,

    /// Fixed node id (UUID).  Random per run when neither this nor the
    /// config file sets one.
    #[arg(long)]
    pub node_id: Option<Uuid>,

    /// Peer timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// PID file location.  Defaults to `discovery.pid` in the config dir.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

impl DiscoveryStartArgs {
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(interface) = self.interface {
            config.node.interface = interface;
        }
        if let Some(port) = self.service_port {
            config.node.service_port = port;
        }
        if let Some(node_id) = self.node_id {
            config.node.node_id = Some(node_id);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.discovery.peer_timeout_ms = timeout_ms;
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Table
        }
    }
}

#[derive(Debug, Args)]
pub struct AudioCoreStartArgs {
    /// Address of the peer running the JackTrip server.
    #[arg(long)]
    pub peer: String,

    /// JACK client name for this stream.
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub foreground: bool,

    /// PID file location.  Defaults to `audio-core.pid` in the config dir.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct StopArgs {
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ApiArgs {
    #[arg(long)]
    pub bind: Option<Ipv4Addr>,

    #[arg(long)]
    pub port: Option<u16>,
}

impl ApiArgs {
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(bind) = self.bind {
            config.api.bind = bind;
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
    }
}

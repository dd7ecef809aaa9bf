//! TOML configuration for an AudioMesh node.
//!
//! Read from the platform-appropriate config file:
//! - Linux:    `$XDG_CONFIG_HOME/audiomesh/config.toml` (or `~/.config/…`)
//! - macOS:    `~/Library/Application Support/AudioMesh/config.toml`
//! - Windows:  `%APPDATA%\AudioMesh\config.toml`
//!
//! ```toml
//! log_level = "info"
//!
//! [node]
//! service_port = 4464
//! interface = "0.0.0.0"
//!
//! [discovery]
//! group = "239.255.0.1"
//! port = 50000
//! announce_interval_ms = 5000
//! peer_timeout_ms = 10000
//!
//! [stream]
//! program = "jacktrip"
//!
//! [api]
//! bind = "127.0.0.1"
//! port = 8000
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section, or
//! a missing key all fall back to the values above.  PID files are kept in
//! the same directory as the config file.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mesh_core::NodeId;
use mesh_discovery::{AnnouncerConfig, ListenerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Fallback `tracing` filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub api: ApiSettings,
}

/// Identity and local addressing of this node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Fixed node id.  A random id is generated per run when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<Uuid>,
    /// Service port advertised in announcements.
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    /// Interface used for both sending and receiving multicast.
    #[serde(default = "default_interface")]
    pub interface: Ipv4Addr,
}

/// Multicast discovery parameters.  `group` and `port` must match on every
/// node of a mesh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySettings {
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,
    #[serde(default = "default_discovery_port")]
    pub port: u16,
    #[serde(default = "default_announce_interval_ms")]
    pub announce_interval_ms: u64,
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
    #[serde(default = "default_multicast_ttl")]
    pub multicast_ttl: u32,
}

/// Stream process supervision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamSettings {
    /// Program name looked up on `PATH`, or an absolute path.
    #[serde(default = "default_program")]
    pub program: String,
    /// Time allowed between SIGTERM and SIGKILL when stopping a stream.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

/// Health API listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSettings {
    #[serde(default = "default_api_bind")]
    pub bind: Ipv4Addr,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_service_port() -> u16 {
    4464
}
fn default_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}
fn default_group() -> Ipv4Addr {
    mesh_core::protocol::messages::DEFAULT_MULTICAST_GROUP
}
fn default_discovery_port() -> u16 {
    mesh_core::protocol::messages::DEFAULT_MULTICAST_PORT
}
fn default_announce_interval_ms() -> u64 {
    5_000
}
fn default_peer_timeout_ms() -> u64 {
    10_000
}
fn default_multicast_ttl() -> u32 {
    1
}
fn default_program() -> String {
    "jacktrip".to_string()
}
fn default_stop_grace_ms() -> u64 {
    5_000
}
fn default_api_bind() -> Ipv4Addr {
    Ipv4Addr::LOCALHOST
}
fn default_api_port() -> u16 {
    8000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            node: NodeConfig::default(),
            discovery: DiscoverySettings::default(),
            stream: StreamSettings::default(),
            api: ApiSettings::default(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            service_port: default_service_port(),
            interface: default_interface(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            group: default_group(),
            port: default_discovery_port(),
            announce_interval_ms: default_announce_interval_ms(),
            peer_timeout_ms: default_peer_timeout_ms(),
            multicast_ttl: default_multicast_ttl(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_api_bind(),
            port: default_api_port(),
        }
    }
}

// ── Conversions into component configs ────────────────────────────────────────

impl AppConfig {
    /// The node id from the file, or a fresh random one.
    pub fn node_id(&self) -> NodeId {
        self.node.node_id.map(NodeId::from).unwrap_or_else(NodeId::random)
    }

    pub fn group_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.discovery.group, self.discovery.port)
    }

    pub fn announcer_config(&self, node_id: NodeId) -> AnnouncerConfig {
        AnnouncerConfig {
            node_id,
            service_port: self.node.service_port,
            interval: Duration::from_millis(self.discovery.announce_interval_ms),
            interface: self.node.interface,
            group: self.group_addr(),
            multicast_ttl: self.discovery.multicast_ttl,
        }
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            interface: self.node.interface,
            group: self.group_addr(),
            peer_timeout: Duration::from_millis(self.discovery.peer_timeout_ms),
        }
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stream.stop_grace_ms)
    }

    pub fn api_addr(&self) -> SocketAddr {
        SocketAddr::from((self.api.bind, self.api.port))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory cannot
/// be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning defaults if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Loads from the platform config file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("AudioMesh"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("audiomesh"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("AudioMesh")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

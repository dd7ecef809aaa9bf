//! Domain layer: node configuration.

pub mod config;

pub use config::{AppConfig, ConfigError};

//! Configuration management for chain-notify
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, an optional TOML file,
//! environment variables and command-line flags, in that order.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::cli::RunArgs;

/// Prefix for environment overrides, e.g. `CHAIN_NOTIFY_ZMQ__PUBHASHBLOCK`.
pub const ENV_PREFIX: &str = "CHAIN_NOTIFY_";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Enabled notifiers, keyed by notifier type.
    #[serde(default)]
    pub zmq: NotificationConfig,
    /// Settings for the publish transport.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Settings for the Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Which notifiers are enabled and where they publish.
///
/// Each entry maps a notifier type (`pubhashblock`, `pubrawtx`, ...) to the
/// address it binds. An absent or empty address leaves that type disabled.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct NotificationConfig {
    #[serde(flatten)]
    pub endpoints: BTreeMap<String, String>,
}

impl NotificationConfig {
    /// Adds or replaces the address for `key`.
    pub fn with(mut self, key: &str, address: &str) -> Self {
        self.endpoints.insert(key.to_string(), address.to_string());
        self
    }

    /// The configured address for `key`, if the notifier is enabled.
    pub fn address(&self, key: &str) -> Option<&str> {
        self.endpoints
            .get(key)
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
    }

    /// True when no notifier has a usable address.
    pub fn is_empty(&self) -> bool {
        self.endpoints.keys().all(|k| self.address(k).is_none())
    }
}

/// Configuration for the publish transport.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Messages ZeroMQ queues per subscriber before dropping further ones.
    pub high_water_mark: i32,
    /// Messages buffered per in-process subscriber.
    pub inproc_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 1000,
            inproc_capacity: 1024,
        }
    }
}

/// Configuration for the metrics exporter.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics on `listen_address`.
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: SocketAddr::from(([127, 0, 0, 1], 9898)),
        }
    }
}

impl Config {
    /// Loads the configuration by layering defaults, the optional config
    /// file, environment variables and command-line flags.
    pub fn load(args: &RunArgs) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &args.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(args.clone())
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            zmq: NotificationConfig::default(),
            transport: TransportConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

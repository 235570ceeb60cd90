//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. The `run` arguments are also a figment `Provider`, so flags
//! given on the command line override the config file and environment.

use clap::{Args, Parser, Subcommand};
use figment::{
    providers::Serialized,
    value::{Dict, Map},
    Error, Metadata, Profile, Provider,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Publishes blockchain events to subscribers over a pub/sub transport.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read newline-delimited JSON chain events from stdin and publish them.
    Run(RunArgs),
    /// Subscribe to a ZeroMQ publisher and print every message received.
    Listen(ListenArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Publish block hashes at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub zmqpubhashblock: Option<String>,

    /// Publish transaction hashes at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub zmqpubhashtx: Option<String>,

    /// Publish locked transaction hashes at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub zmqpubhashtxlock: Option<String>,

    /// Publish serialized blocks at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub zmqpubrawblock: Option<String>,

    /// Publish serialized transactions at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub zmqpubrawtx: Option<String>,

    /// Publish serialized locked transactions at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub zmqpubrawtxlock: Option<String>,

    /// Publish governance vote hashes at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub zmqpubgvote: Option<String>,

    /// Publish governance object hashes at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub zmqpubgobject: Option<String>,

    /// Serve Prometheus metrics at ADDR.
    #[arg(long, value_name = "ADDR")]
    pub metrics_listen: Option<SocketAddr>,
}

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Publisher address, e.g. tcp://127.0.0.1:28332.
    #[arg(long, value_name = "ADDR")]
    pub connect: String,

    /// Only print messages with this topic.
    #[arg(long, value_name = "TOPIC")]
    pub topic: Option<String>,

    /// Exit after this many printed messages.
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
}

/// The subset of `Config` that command-line flags can override.
#[derive(Serialize, Default)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    zmq: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<MetricsOverrides>,
}

#[derive(Serialize)]
struct MetricsOverrides {
    enabled: bool,
    listen_address: SocketAddr,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        let notifiers = [
            ("pubhashblock", &self.zmqpubhashblock),
            ("pubhashtx", &self.zmqpubhashtx),
            ("pubhashtxlock", &self.zmqpubhashtxlock),
            ("pubrawblock", &self.zmqpubrawblock),
            ("pubrawtx", &self.zmqpubrawtx),
            ("pubrawtxlock", &self.zmqpubrawtxlock),
            ("pubgvote", &self.zmqpubgvote),
            ("pubgobject", &self.zmqpubgobject),
        ];

        Overrides {
            log_level: self.log_level.clone(),
            zmq: notifiers
                .into_iter()
                .filter_map(|(key, address)| address.clone().map(|a| (key.to_string(), a)))
                .collect(),
            metrics: self.metrics_listen.map(|listen_address| MetricsOverrides {
                enabled: true,
                listen_address,
            }),
        }
    }
}

impl Provider for RunArgs {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Serialized::defaults(self.overrides()).data()
    }
}

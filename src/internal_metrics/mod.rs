//! # Internal Metrics Module
//!
//! Counters and gauges describing the dispatcher, recorded through the
//! `metrics` facade. Without an installed recorder every call is a no-op, so
//! the library can record unconditionally.
//!
//! ## Components:
//!
//! - **Recording helpers**: `record_published`, `record_eviction` and
//!   `set_active_notifiers`, called from the notifiers and the dispatcher.
//!
//! - **`MetricsBuilder`**: Installs the Prometheus recorder and binds the
//!   listener for the exporter.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint for Prometheus to scrape.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use anyhow::{Context, Result};
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub mod server;

pub const NOTIFICATIONS_PUBLISHED: &str = "notifications_published_total";
pub const NOTIFIER_EVICTIONS: &str = "notifier_evictions_total";
pub const NOTIFIERS_ACTIVE: &str = "notifiers_active";

/// Registers descriptions for every metric with the current recorder.
pub fn describe() {
    metrics::describe_counter!(NOTIFICATIONS_PUBLISHED, Unit::Count, "Total number of messages published, labeled by notifier type.");
    metrics::describe_counter!(NOTIFIER_EVICTIONS, Unit::Count, "Total number of notifiers removed after a failed publish, labeled by notifier type.");
    metrics::describe_gauge!(NOTIFIERS_ACTIVE, Unit::Count, "The number of notifiers currently receiving events.");
}

/// Counts one message published by a notifier of type `kind`.
pub fn record_published(kind: &str) {
    metrics::counter!(NOTIFICATIONS_PUBLISHED, "kind" => kind.to_string()).increment(1);
}

/// Counts one notifier of type `kind` retired after a failure.
pub fn record_eviction(kind: &str) {
    metrics::counter!(NOTIFIER_EVICTIONS, "kind" => kind.to_string()).increment(1);
}

pub fn set_active_notifiers(count: usize) {
    metrics::gauge!(NOTIFIERS_ACTIVE).set(count as f64);
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder globally and prepares the exporter.
    ///
    /// Returns `None` when metrics are disabled. The returned server is not
    /// running yet; spawn [`MetricsServer::run`] to serve it. The address is
    /// the one actually bound, which matters when the configured port is 0.
    pub fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Option<(MetricsServer, SocketAddr)>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        // Bind before installing the recorder so a bad address leaves the
        // process without a half-configured exporter.
        let listener = std::net::TcpListener::bind(self.config.listen_address).with_context(|| {
            format!(
                "Failed to bind metrics server to {}",
                self.config.listen_address
            )
        })?;
        let addr = listener
            .local_addr()
            .context("Failed to get local address for metrics server")?;

        // The listener must be non-blocking to be used with Tokio.
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;

        metrics::set_global_recorder(recorder)
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
        describe();

        Ok(Some((MetricsServer::new(listener, handle, shutdown_rx), addr)))
    }
}

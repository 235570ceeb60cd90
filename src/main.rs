//! chain-notify - Blockchain event notifications over pub/sub sockets
//!
//! `run` feeds newline-delimited JSON chain events from stdin into the
//! notification dispatcher. `listen` subscribes to a ZeroMQ publisher and
//! prints what it receives.

use anyhow::{Context, Result};
use chain_notify::{
    cli::{Cli, Command, ListenArgs, RunArgs},
    config::Config,
    formatting,
    internal_metrics::MetricsBuilder,
    transport::{zeromq::ZmqSubscriber, DefaultTransport, Endpoint, TransportError},
    ChainEvent, ChainListener, NotificationDispatcher, NotifierRegistry,
};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Listen(args) => {
            init_tracing("info");
            listen(args).await
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

async fn run(args: RunArgs) -> Result<()> {
    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&args).unwrap_or_else(|err| {
        init_tracing("info");
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    init_tracing(&config.log_level);
    info!("chain-notify starting up...");

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    for (key, address) in &config.zmq.endpoints {
        info!("Notifier {}: {}", key, address);
    }
    info!("Send High-Water Mark: {}", config.transport.high_water_mark);
    info!("In-process Capacity: {}", config.transport.inproc_capacity);
    info!(
        "Metrics: {}",
        if config.metrics.enabled {
            config.metrics.listen_address.to_string()
        } else {
            "Disabled".to_string()
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // =========================================================================
    // Metrics exporter, if enabled
    // =========================================================================
    let mut metrics_task = None;
    match MetricsBuilder::new(config.metrics.clone()).build(shutdown_rx.clone()) {
        Ok(Some((server, addr))) => {
            info!("Metrics server listening on http://{}/metrics", addr);
            metrics_task = Some(tokio::spawn(server.run()));
        }
        Ok(None) => {}
        Err(e) => error!("Metrics disabled: {:#}", e),
    }

    // =========================================================================
    // Dispatcher
    // =========================================================================
    let transport = Arc::new(DefaultTransport::from_config(&config.transport));
    let registry = NotifierRegistry::builtin();
    let mut dispatcher =
        match NotificationDispatcher::try_create(&config.zmq, &registry, transport) {
            Ok(Some(dispatcher)) => dispatcher,
            Ok(None) => {
                info!("No notifiers enabled, nothing to publish");
                return Ok(());
            }
            Err(e) => {
                error!("Notifications disabled: {}", e);
                return Ok(());
            }
        };
    info!(notifiers = dispatcher.len(), "Dispatcher ready, reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut processed: u64 = 0;
    let mut line_number: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    debug!("End of input");
                    break;
                };
                line_number += 1;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ChainEvent>(&line) {
                    Ok(event) => {
                        debug!(category = event.category(), "Dispatching event");
                        dispatcher.dispatch(&event);
                        processed += 1;
                    }
                    Err(e) => warn!(line = line_number, error = %e, "Skipping malformed event"),
                }
            }
        }
    }

    dispatcher.shutdown();
    info!(processed, remaining = dispatcher.len(), "Processed events");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = metrics_task {
        if let Err(e) = handle.await {
            error!("Metrics task panicked: {:?}", e);
        }
    }

    info!("Exiting.");
    Ok(())
}

async fn listen(args: ListenArgs) -> Result<()> {
    let endpoint: Endpoint = args.connect.parse()?;
    if !matches!(endpoint, Endpoint::Tcp { .. }) {
        anyhow::bail!("listen only supports tcp:// endpoints, got {}", endpoint);
    }

    let topics: Vec<&str> = args.topic.as_deref().into_iter().collect();
    let mut subscriber = ZmqSubscriber::connect(&endpoint, &topics)
        .with_context(|| format!("Failed to connect to {}", endpoint))?;
    // Wake up regularly to notice a shutdown request.
    subscriber.set_read_timeout(Some(Duration::from_millis(250)))?;
    info!(%endpoint, "Subscribed");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut printed = 0usize;
        while !*shutdown_rx.borrow() {
            if args.count.is_some_and(|count| printed >= count) {
                break;
            }
            let message = match subscriber.recv() {
                Ok(message) => message,
                Err(TransportError::Timeout) => continue,
                Err(TransportError::Frame(reason)) => {
                    warn!(%reason, "Skipping malformed message");
                    continue;
                }
                Err(TransportError::Closed) => break,
                Err(e) => return Err(e.into()),
            };
            // Subscriptions match by prefix: `hashtx` also receives `hashtxlock`.
            if let Some(topic) = &args.topic {
                if formatting::topic(&message) != Some(topic.as_str()) {
                    continue;
                }
            }
            println!(
                "{} {}",
                chrono::Utc::now().to_rfc3339(),
                formatting::format_message(&message)
            );
            printed += 1;
        }
        Ok(())
    });

    tokio::select! {
        result = &mut worker => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            worker.await?
        }
    }
}

#[path = "../helpers/mod.rs"]
mod helpers;

use chain_notify::cli::{Cli, Command, RunArgs};
use chain_notify::config::{Config, MetricsConfig, TransportConfig};
use clap::Parser;
use helpers::test_utils::create_config_file;
use serial_test::serial;

fn run_args(argv: &[&str]) -> RunArgs {
    let mut full = vec!["chain-notify", "run"];
    full.extend_from_slice(argv);
    match Cli::try_parse_from(full).unwrap().command {
        Command::Run(args) => args,
        other => panic!("expected run, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let (_dir, path) = create_config_file(
        r#"
        log_level = "debug"

        [zmq]
        pubhashblock = "tcp://127.0.0.1:28332"
        pubrawtx = "tcp://127.0.0.1:28333"
        pubgvote = ""

        [transport]
        high_water_mark = 5000
        inproc_capacity = 16

        [metrics]
        enabled = true
        listen_address = "0.0.0.0:9100"
        "#,
    );

    let config = Config::load(&RunArgs {
        config: Some(path),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.zmq.address("pubhashblock"), Some("tcp://127.0.0.1:28332"));
    assert_eq!(config.zmq.address("pubrawtx"), Some("tcp://127.0.0.1:28333"));
    assert_eq!(config.zmq.address("pubgvote"), None);
    assert_eq!(config.transport.high_water_mark, 5000);
    assert_eq!(config.transport.inproc_capacity, 16);
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.listen_address.port(), 9100);
}

#[test]
#[serial]
fn test_partial_file_keeps_defaults() {
    let (_dir, path) = create_config_file(
        r#"
        [zmq]
        pubhashtx = "inproc://tx"
        "#,
    );

    let config = Config::load(&run_args(&["--config", path.to_str().unwrap()])).unwrap();

    assert_eq!(config.log_level, "info");
    assert_eq!(config.transport, TransportConfig::default());
    assert_eq!(config.metrics, MetricsConfig::default());
    assert_eq!(config.zmq.endpoints.len(), 1);
}

#[test]
#[serial]
fn test_no_sources_yields_defaults() {
    let config = Config::load(&RunArgs::default()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let (_dir, path) = create_config_file(
        r#"
        [zmq]
        pubhashtx = "tcp://127.0.0.1:1"
        "#,
    );
    std::env::set_var("CHAIN_NOTIFY_ZMQ__PUBHASHTX", "tcp://127.0.0.1:2");
    std::env::set_var("CHAIN_NOTIFY_TRANSPORT__HIGH_WATER_MARK", "42");

    let result = Config::load(&run_args(&["--config", path.to_str().unwrap()]));

    std::env::remove_var("CHAIN_NOTIFY_ZMQ__PUBHASHTX");
    std::env::remove_var("CHAIN_NOTIFY_TRANSPORT__HIGH_WATER_MARK");

    let config = result.unwrap();
    assert_eq!(config.zmq.address("pubhashtx"), Some("tcp://127.0.0.1:2"));
    assert_eq!(config.transport.high_water_mark, 42);
}

#[test]
#[serial]
fn test_cli_overrides_env_and_file() {
    let (_dir, path) = create_config_file(
        r#"
        log_level = "warn"
        [zmq]
        pubrawblock = "tcp://127.0.0.1:1"
        "#,
    );
    std::env::set_var("CHAIN_NOTIFY_ZMQ__PUBRAWBLOCK", "tcp://127.0.0.1:2");

    let result = Config::load(&run_args(&[
        "--config",
        path.to_str().unwrap(),
        "--zmqpubrawblock",
        "tcp://127.0.0.1:3",
        "--log-level",
        "trace",
        "--metrics-listen",
        "127.0.0.1:0",
    ]));

    std::env::remove_var("CHAIN_NOTIFY_ZMQ__PUBRAWBLOCK");

    let config = result.unwrap();
    assert_eq!(config.log_level, "trace");
    assert_eq!(config.zmq.address("pubrawblock"), Some("tcp://127.0.0.1:3"));
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.listen_address.port(), 0);
}

#[test]
#[serial]
fn test_cli_keeps_file_entries_it_does_not_mention() {
    let (_dir, path) = create_config_file(
        r#"
        [zmq]
        pubgobject = "tcp://127.0.0.1:1"
        "#,
    );

    let config = Config::load(&run_args(&[
        "--config",
        path.to_str().unwrap(),
        "--zmqpubgvote",
        "tcp://127.0.0.1:2",
    ]))
    .unwrap();

    assert_eq!(config.zmq.address("pubgobject"), Some("tcp://127.0.0.1:1"));
    assert_eq!(config.zmq.address("pubgvote"), Some("tcp://127.0.0.1:2"));
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let (_dir, path) = create_config_file("[transport]\nhigh_water_mark = \"lots\"");
    assert!(Config::load(&run_args(&["--config", path.to_str().unwrap()])).is_err());
}

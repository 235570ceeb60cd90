#![allow(dead_code)]
use chain_notify::events::{Block, BlockTip, Hash256, Transaction};
use chain_notify::transport::zeromq::ZmqSubscriber;
use chain_notify::transport::{Endpoint, Multipart, TransportError};
use std::time::{Duration, Instant};
use std::{fs::File, io::Write, net::TcpListener, path::PathBuf};

pub fn create_config_file(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("chain-notify.toml");
    let mut file = File::create(&file_path).unwrap();
    writeln!(file, "{}", content).unwrap();
    (dir, file_path)
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn sample_tx(byte: u8) -> Transaction {
    Transaction {
        txid: Hash256([byte; 32]),
        raw: vec![0x02, 0x00, 0x00, 0x00, byte],
    }
}

/// A tip that advanced past its fork point.
pub fn advancing_tip(byte: u8) -> BlockTip {
    BlockTip {
        new_tip: Block {
            hash: Hash256([byte; 32]),
            height: byte as u32,
            raw: vec![0x00, byte],
        },
        fork_point: Some(Hash256([byte.wrapping_sub(1); 32])),
        initial_download: false,
    }
}

/// A subscriber on the local publisher at `port`, polling every 100ms.
pub fn subscriber(port: u16, topics: &[&str]) -> ZmqSubscriber {
    let endpoint: Endpoint = format!("tcp://127.0.0.1:{}", port).parse().unwrap();
    let subscriber = ZmqSubscriber::connect(&endpoint, topics).unwrap();
    subscriber
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();
    subscriber
}

/// Calls `publish` until `subscriber` receives a message.
///
/// A subscription takes a moment to reach the publisher, and anything
/// published before that is dropped.
pub fn recv_while_publishing(subscriber: &mut ZmqSubscriber, mut publish: impl FnMut()) -> Multipart {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        publish();
        match subscriber.recv() {
            Ok(message) => return message,
            Err(TransportError::Timeout) if Instant::now() < deadline => {}
            Err(e) => panic!("no message received: {}", e),
        }
    }
}

/// Receives until the subscriber has been idle for one read timeout.
pub fn drain(subscriber: &mut ZmqSubscriber) -> Vec<Multipart> {
    std::iter::from_fn(|| subscriber.recv().ok()).collect()
}

//! ZeroMQ publish backend.
//!
//! Every bound endpoint is a ZeroMQ PUB socket. Publishing never blocks: once
//! a subscriber's queue reaches the high-water mark, ZeroMQ drops further
//! messages for that subscriber and the publish still succeeds.

use super::{Endpoint, Multipart, PublishSocket, Transport, TransportError};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Largest message a [`ZmqSubscriber`] accepts. A peer announcing a larger
/// frame is disconnected before any of it is read.
pub const MAX_MESSAGE_SIZE: i64 = 4 * 1024 * 1024;

/// Binds [`ZmqPublisher`]s on one ZeroMQ context.
#[derive(Clone)]
pub struct ZmqTransport {
    context: zmq::Context,
    high_water_mark: i32,
}

impl ZmqTransport {
    pub fn new(high_water_mark: i32) -> Self {
        Self {
            context: zmq::Context::new(),
            high_water_mark,
        }
    }
}

impl Transport for ZmqTransport {
    fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn PublishSocket>, TransportError> {
        Ok(Box::new(ZmqPublisher::bind(
            &self.context,
            endpoint,
            self.high_water_mark,
        )?))
    }
}

impl fmt::Debug for ZmqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZmqTransport")
            .field("high_water_mark", &self.high_water_mark)
            .finish_non_exhaustive()
    }
}

/// A bound ZeroMQ PUB socket.
pub struct ZmqPublisher {
    endpoint: Endpoint,
    socket: zmq::Socket,
}

impl ZmqPublisher {
    pub fn bind(
        context: &zmq::Context,
        endpoint: &Endpoint,
        high_water_mark: i32,
    ) -> Result<Self, TransportError> {
        let bind_error = |source: zmq::Error| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };

        let socket = context.socket(zmq::PUB).map_err(bind_error)?;
        socket.set_sndhwm(high_water_mark).map_err(bind_error)?;
        socket.set_tcp_keepalive(1).map_err(bind_error)?;
        socket.set_linger(0).map_err(bind_error)?;
        if endpoint.is_ipv6() {
            socket.set_ipv6(true).map_err(bind_error)?;
        }
        socket
            .bind(&endpoint.to_string())
            .map_err(|source| match source {
                zmq::Error::EADDRINUSE => TransportError::AddressInUse(endpoint.to_string()),
                source => bind_error(source),
            })?;

        info!(%endpoint, high_water_mark, "ZeroMQ publisher bound");
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }
}

impl PublishSocket for ZmqPublisher {
    fn send_multipart(&mut self, parts: &[&[u8]]) -> Result<(), TransportError> {
        self.socket
            .send_multipart(parts.iter().copied(), zmq::DONTWAIT)
            .map_err(TransportError::Send)
    }
}

impl Drop for ZmqPublisher {
    fn drop(&mut self) {
        debug!(endpoint = %self.endpoint, "ZeroMQ publisher closed");
    }
}

/// A ZeroMQ SUB socket connected to a publisher.
pub struct ZmqSubscriber {
    socket: zmq::Socket,
}

impl ZmqSubscriber {
    /// Connects to `endpoint`, subscribed to every topic starting with one
    /// of `topics`, or to everything when `topics` is empty.
    pub fn connect(endpoint: &Endpoint, topics: &[&str]) -> Result<Self, TransportError> {
        let socket = zmq::Context::new().socket(zmq::SUB)?;
        socket.set_maxmsgsize(MAX_MESSAGE_SIZE)?;
        socket.set_linger(0)?;
        if endpoint.is_ipv6() {
            socket.set_ipv6(true)?;
        }
        if topics.is_empty() {
            socket.set_subscribe(b"")?;
        }
        for topic in topics {
            socket.set_subscribe(topic.as_bytes())?;
        }
        socket.connect(&endpoint.to_string())?;
        debug!(%endpoint, ?topics, "Subscriber connecting");
        Ok(Self { socket })
    }

    /// `None` waits forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        let millis = match timeout {
            Some(timeout) => i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX),
            None => -1,
        };
        Ok(self.socket.set_rcvtimeo(millis)?)
    }

    /// Waits for the next notification. Returns [`TransportError::Timeout`]
    /// when the read timeout passes first and [`TransportError::Frame`] for
    /// a message that is not `[topic, body, sequence]`.
    pub fn recv(&mut self) -> Result<Multipart, TransportError> {
        let message = self.socket.recv_multipart(0).map_err(|e| match e {
            zmq::Error::EAGAIN => TransportError::Timeout,
            zmq::Error::ETERM => TransportError::Closed,
            e => TransportError::Zmq(e),
        })?;
        check_notification(&message)?;
        Ok(message)
    }
}

/// Checks that `message` has the `[topic, body, sequence]` layout with a
/// four-byte sequence.
pub fn check_notification(message: &[Vec<u8>]) -> Result<(), TransportError> {
    match message {
        [topic, _, _] if topic.is_empty() => Err(TransportError::Frame("empty topic".into())),
        [_, _, sequence] if sequence.len() != 4 => Err(TransportError::Frame(format!(
            "sequence of {} bytes",
            sequence.len()
        ))),
        [_, _, _] => Ok(()),
        parts => Err(TransportError::Frame(format!("{} parts", parts.len()))),
    }
}

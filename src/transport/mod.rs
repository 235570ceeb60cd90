//! Publish transport used by the notifiers.
//!
//! A [`Transport`] knows how to bind publish sockets for an [`Endpoint`]. The
//! dispatcher wraps it in a [`TransportContext`], which is the one shared
//! resource every notifier binds through. The context hands out reference
//! counted sockets so that several notifiers configured at the same address
//! publish through a single bound socket.
//!
//! Two backends ship with the crate:
//!
//! - [`zeromq`]: ZeroMQ PUB sockets for `tcp://` endpoints, readable by any
//!   ZeroMQ SUB socket.
//! - [`inproc`]: an in-process hub built on `tokio::sync::broadcast`, used for
//!   embedding and tests.

pub mod inproc;
pub mod zeromq;

use crate::config::TransportConfig;
use inproc::InprocHub;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tracing::{debug, info, warn};
use zeromq::ZmqTransport;

/// A multipart message as received by a subscriber.
pub type Multipart = Vec<Vec<u8>>;

/// A publish socket shared between every notifier bound to the same address.
pub type SharedSocket = Arc<Mutex<Box<dyn PublishSocket>>>;

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: zmq::Error,
    },
    #[error("address already in use: {0}")]
    AddressInUse(String),
    #[error("publish failed: {0}")]
    Send(#[source] zmq::Error),
    #[error("malformed frame: {0}")]
    Frame(String),
    #[error("socket is closed")]
    Closed,
    #[error("timed out waiting for a message")]
    Timeout,
    #[error("transport context unavailable: {0}")]
    ContextUnavailable(String),
    #[error(transparent)]
    Zmq(#[from] zmq::Error),
}

/// A transport address: `tcp://host:port` or `inproc://name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `host` may be `*` to listen on all interfaces.
    Tcp { host: String, port: u16 },
    Inproc(String),
}

impl Endpoint {
    /// True for a TCP endpoint with a bracketed IPv6 host, e.g. `tcp://[::1]:28332`.
    pub fn is_ipv6(&self) -> bool {
        matches!(self, Endpoint::Tcp { host, .. } if host.contains(':'))
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidEndpoint(s.to_string());
        if let Some(rest) = s.strip_prefix("tcp://") {
            let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
            if host.is_empty() {
                return Err(invalid());
            }
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            })
        } else if let Some(name) = s.strip_prefix("inproc://") {
            if name.is_empty() {
                return Err(invalid());
            }
            Ok(Endpoint::Inproc(name.to_string()))
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Endpoint::Inproc(name) => write!(f, "inproc://{}", name),
        }
    }
}

/// A bound publish socket.
pub trait PublishSocket: Send {
    /// Publishes one multipart message. Fire-and-forget: subscribers that
    /// cannot keep up are the socket's concern, not the caller's.
    fn send_multipart(&mut self, parts: &[&[u8]]) -> Result<(), TransportError>;
}

/// A factory for publish sockets.
pub trait Transport: Send + Sync {
    /// Called once when a context is created on top of this transport.
    fn open(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Binds a new publish socket at `endpoint`.
    fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn PublishSocket>, TransportError>;
}

/// The transport used by the binary: ZeroMQ and in-process endpoints.
#[derive(Clone)]
pub struct DefaultTransport {
    zmq: ZmqTransport,
    inproc: InprocHub,
}

impl DefaultTransport {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            zmq: ZmqTransport::new(config.high_water_mark),
            inproc: InprocHub::new(config.inproc_capacity),
        }
    }

    /// The hub backing `inproc://` endpoints, for attaching subscribers.
    pub fn inproc(&self) -> &InprocHub {
        &self.inproc
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl Transport for DefaultTransport {
    fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn PublishSocket>, TransportError> {
        match endpoint {
            Endpoint::Tcp { .. } => self.zmq.bind(endpoint),
            Endpoint::Inproc(_) => self.inproc.bind(endpoint),
        }
    }
}

/// The shared context notifiers bind their sockets through.
///
/// Sockets are tracked weakly: a socket stays bound while at least one
/// notifier holds it and is closed when the last holder lets go.
pub struct TransportContext {
    transport: Arc<dyn Transport>,
    sockets: HashMap<Endpoint, Weak<Mutex<Box<dyn PublishSocket>>>>,
}

impl TransportContext {
    /// Creates a context on top of `transport`.
    pub fn open(transport: Arc<dyn Transport>) -> Result<Self, TransportError> {
        transport.open()?;
        debug!("Transport context opened");
        Ok(Self {
            transport,
            sockets: HashMap::new(),
        })
    }

    /// Returns a socket bound at `address`, reusing one that another
    /// notifier already holds at the same endpoint.
    pub fn bind(&mut self, address: &str) -> Result<SharedSocket, TransportError> {
        let endpoint: Endpoint = address.parse()?;
        if let Some(existing) = self.sockets.get(&endpoint).and_then(Weak::upgrade) {
            debug!(%endpoint, "Reusing bound socket");
            return Ok(existing);
        }

        let socket: SharedSocket = Arc::new(Mutex::new(self.transport.bind(&endpoint)?));
        info!(%endpoint, "Bound publish socket");
        self.sockets.insert(endpoint, Arc::downgrade(&socket));
        Ok(socket)
    }

    /// The number of sockets that are still held by at least one notifier.
    pub fn live_sockets(&self) -> usize {
        self.sockets.values().filter(|s| s.strong_count() > 0).count()
    }

    /// Destroys the context.
    pub fn terminate(self) {
        let live = self.live_sockets();
        if live > 0 {
            warn!(live, "Terminating transport context with sockets still bound");
        }
        debug!("Transport context terminated");
    }
}

impl fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportContext")
            .field("live_sockets", &self.live_sockets())
            .finish_non_exhaustive()
    }
}

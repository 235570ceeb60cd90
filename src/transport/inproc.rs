//! In-process publish backend.
//!
//! Each `inproc://name` endpoint maps to a `tokio::sync::broadcast` channel.
//! Subscribers can attach before or after the publisher binds; a name can be
//! bound by only one live socket at a time.

use super::{Endpoint, Multipart, PublishSocket, Transport, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, trace};

struct Channel {
    sender: broadcast::Sender<Multipart>,
    bound: bool,
}

type Channels = Arc<Mutex<HashMap<String, Channel>>>;

/// The registry of in-process endpoints.
#[derive(Clone)]
pub struct InprocHub {
    capacity: usize,
    channels: Channels,
}

impl InprocHub {
    /// Creates a hub whose channels buffer up to `capacity` messages per
    /// subscriber. Lagging subscribers lose the oldest messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attaches a subscriber to `name`.
    pub fn subscribe(&self, name: &str) -> broadcast::Receiver<Multipart> {
        let mut channels = lock(&self.channels);
        self.channel(&mut channels, name).sender.subscribe()
    }

    /// Whether a live socket is currently bound at `name`.
    pub fn is_bound(&self, name: &str) -> bool {
        lock(&self.channels).get(name).is_some_and(|c| c.bound)
    }

    fn channel<'a>(
        &self,
        channels: &'a mut HashMap<String, Channel>,
        name: &str,
    ) -> &'a mut Channel {
        channels.entry(name.to_string()).or_insert_with(|| Channel {
            sender: broadcast::channel(self.capacity).0,
            bound: false,
        })
    }
}

impl Transport for InprocHub {
    fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn PublishSocket>, TransportError> {
        let Endpoint::Inproc(name) = endpoint else {
            return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
        };

        let mut channels = lock(&self.channels);
        let channel = self.channel(&mut channels, name);
        if channel.bound {
            return Err(TransportError::AddressInUse(endpoint.to_string()));
        }
        channel.bound = true;
        debug!(%endpoint, "In-process publisher bound");

        Ok(Box::new(InprocPublisher {
            name: name.clone(),
            sender: channel.sender.clone(),
            channels: self.channels.clone(),
        }))
    }
}

/// A publish socket bound to an `inproc://` endpoint.
pub struct InprocPublisher {
    name: String,
    sender: broadcast::Sender<Multipart>,
    channels: Channels,
}

impl PublishSocket for InprocPublisher {
    fn send_multipart(&mut self, parts: &[&[u8]]) -> Result<(), TransportError> {
        let message: Multipart = parts.iter().map(|p| p.to_vec()).collect();
        // Publishing with nobody listening is not a failure.
        let receivers = self.sender.send(message).unwrap_or(0);
        trace!(name = %self.name, receivers, "Published in-process message");
        Ok(())
    }
}

impl Drop for InprocPublisher {
    fn drop(&mut self) {
        if let Some(channel) = lock(&self.channels).get_mut(&self.name) {
            channel.bound = false;
        }
        debug!(name = %self.name, "In-process publisher closed");
    }
}

fn lock(channels: &Channels) -> MutexGuard<'_, HashMap<String, Channel>> {
    channels.lock().unwrap_or_else(PoisonError::into_inner)
}

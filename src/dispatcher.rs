//! The notification dispatcher.
//!
//! Owns the transport context and the active notifiers, and fans every chain
//! event out to them. A notifier that fails to publish is shut down and
//! removed for good; the remaining notifiers keep receiving events.
//!
//! The dispatcher does no locking of its own. Broadcast methods take
//! `&mut self`, so callers raising events from several threads wrap it in a
//! `Mutex`.

use crate::config::NotificationConfig;
use crate::events::{BlockTip, ChainEvent, GovernanceObject, GovernanceVote, Transaction};
use crate::internal_metrics;
use crate::notifier::{Notifier, NotifierError};
use crate::registry::NotifierRegistry;
use crate::transport::{Transport, TransportContext, TransportError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is already initialized")]
    AlreadyInitialized,
    #[error("unable to initialize transport context: {0}")]
    Context(#[source] TransportError),
    #[error("notifier {kind} failed to initialize (address = {address}): {source}")]
    Notifier {
        kind: String,
        address: String,
        #[source]
        source: NotifierError,
    },
}

/// Receives chain events from the application layer.
///
/// The application registers a listener once at startup and calls it wherever
/// the events are raised. Every method defaults to doing nothing.
pub trait ChainListener {
    fn on_block_tip(&mut self, _tip: &BlockTip) {}

    fn on_transaction(&mut self, _tx: &Transaction) {}

    fn on_transaction_lock(&mut self, _tx: &Transaction) {}

    fn on_governance_vote(&mut self, _vote: &GovernanceVote) {}

    fn on_governance_object(&mut self, _object: &GovernanceObject) {}

    /// Routes a tagged event to the matching method.
    fn dispatch(&mut self, event: &ChainEvent) {
        match event {
            ChainEvent::BlockTip(tip) => self.on_block_tip(tip),
            ChainEvent::Transaction(tx) => self.on_transaction(tx),
            ChainEvent::TransactionLock(tx) => self.on_transaction_lock(tx),
            ChainEvent::GovernanceVote(vote) => self.on_governance_vote(vote),
            ChainEvent::GovernanceObject(object) => self.on_governance_object(object),
        }
    }
}

/// Fans chain events out to every live notifier.
pub struct NotificationDispatcher {
    transport: Arc<dyn Transport>,
    context: Option<TransportContext>,
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotificationDispatcher {
    /// Wraps `notifiers` without initializing anything.
    pub fn new(notifiers: Vec<Box<dyn Notifier>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            context: None,
            notifiers,
        }
    }

    /// Builds and initializes a dispatcher for every enabled notifier.
    ///
    /// Returns `None` when nothing is enabled or when initialization fails;
    /// in the latter case everything that was set up has been torn down.
    pub fn create(
        config: &NotificationConfig,
        registry: &NotifierRegistry,
        transport: Arc<dyn Transport>,
    ) -> Option<Self> {
        Self::try_create(config, registry, transport).unwrap_or_else(|e| {
            error!(error = %e, "Notifications disabled");
            None
        })
    }

    /// Like [`create`](Self::create), but reports why initialization failed.
    pub fn try_create(
        config: &NotificationConfig,
        registry: &NotifierRegistry,
        transport: Arc<dyn Transport>,
    ) -> Result<Option<Self>, DispatchError> {
        let notifiers = registry.create(config);
        if notifiers.is_empty() {
            debug!("No notifiers configured");
            return Ok(None);
        }

        let mut dispatcher = Self::new(notifiers, transport);
        // On error the dispatcher is dropped here, which shuts it down.
        dispatcher.initialize()?;
        Ok(Some(dispatcher))
    }

    /// Creates the transport context and initializes every notifier in order.
    ///
    /// Stops at the first notifier that fails. Notifiers after it are left
    /// untouched and the context stays open; call [`shutdown`](Self::shutdown)
    /// (or drop the dispatcher) to release what was bound.
    #[instrument(skip_all, fields(notifiers = self.notifiers.len()))]
    pub fn initialize(&mut self) -> Result<(), DispatchError> {
        info!("Initializing notification dispatcher");
        if self.context.is_some() {
            return Err(DispatchError::AlreadyInitialized);
        }

        let context = TransportContext::open(self.transport.clone()).map_err(|e| {
            error!(error = %e, "Unable to initialize transport context");
            DispatchError::Context(e)
        })?;
        let context = self.context.insert(context);

        for notifier in self.notifiers.iter_mut() {
            match notifier.initialize(context) {
                Ok(()) => {
                    info!(kind = notifier.kind(), address = notifier.address(), "Notifier ready");
                }
                Err(source) => {
                    error!(
                        kind = notifier.kind(),
                        address = notifier.address(),
                        error = %source,
                        "Notifier failed"
                    );
                    return Err(DispatchError::Notifier {
                        kind: notifier.kind().to_string(),
                        address: notifier.address().to_string(),
                        source,
                    });
                }
            }
        }

        internal_metrics::set_active_notifiers(self.notifiers.len());
        Ok(())
    }

    /// Shuts down every notifier and destroys the context. Does nothing if
    /// the dispatcher is not initialized.
    pub fn shutdown(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };

        info!("Shutting down notification dispatcher");
        for notifier in self.notifiers.iter_mut() {
            info!(kind = notifier.kind(), address = notifier.address(), "Shutting down notifier");
            notifier.shutdown();
        }
        context.terminate();
        internal_metrics::set_active_notifiers(0);
    }

    /// True between a successful `initialize` and `shutdown`.
    pub fn is_active(&self) -> bool {
        self.context.is_some()
    }

    /// The live notifiers, in dispatch order.
    pub fn notifiers(&self) -> &[Box<dyn Notifier>] {
        &self.notifiers
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Publishes a new chain tip. Skipped entirely during initial block
    /// download and when the tip did not advance.
    pub fn on_block_tip(&mut self, tip: &BlockTip) {
        if tip.is_replay_or_noop() {
            trace!(height = tip.new_tip.height, "Skipping block tip notification");
            return;
        }
        self.broadcast("block_tip", |n| n.notify_block(&tip.new_tip));
    }

    pub fn on_transaction(&mut self, tx: &Transaction) {
        self.broadcast("transaction", |n| n.notify_transaction(tx));
    }

    pub fn on_transaction_lock(&mut self, tx: &Transaction) {
        self.broadcast("transaction_lock", |n| n.notify_transaction_lock(tx));
    }

    pub fn on_governance_vote(&mut self, vote: &GovernanceVote) {
        self.broadcast("governance_vote", |n| n.notify_governance_vote(vote));
    }

    pub fn on_governance_object(&mut self, object: &GovernanceObject) {
        self.broadcast("governance_object", |n| n.notify_governance_object(object));
    }

    /// Offers an event to every notifier, retiring the ones that fail.
    fn broadcast<F>(&mut self, category: &'static str, mut notify: F)
    where
        F: FnMut(&mut dyn Notifier) -> Result<(), NotifierError>,
    {
        if self.context.is_none() {
            trace!(category, "Dispatcher inactive, dropping event");
            return;
        }

        let before = self.notifiers.len();
        self.notifiers.retain_mut(|notifier| match notify(notifier.as_mut()) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    kind = notifier.kind(),
                    address = notifier.address(),
                    category,
                    error = %e,
                    "Notifier failed to publish, removing it"
                );
                internal_metrics::record_eviction(notifier.kind());
                notifier.shutdown();
                false
            }
        });

        if self.notifiers.len() != before {
            internal_metrics::set_active_notifiers(self.notifiers.len());
        }
    }
}

impl ChainListener for NotificationDispatcher {
    fn on_block_tip(&mut self, tip: &BlockTip) {
        NotificationDispatcher::on_block_tip(self, tip)
    }

    fn on_transaction(&mut self, tx: &Transaction) {
        NotificationDispatcher::on_transaction(self, tx)
    }

    fn on_transaction_lock(&mut self, tx: &Transaction) {
        NotificationDispatcher::on_transaction_lock(self, tx)
    }

    fn on_governance_vote(&mut self, vote: &GovernanceVote) {
        NotificationDispatcher::on_governance_vote(self, vote)
    }

    fn on_governance_object(&mut self, object: &GovernanceObject) {
        NotificationDispatcher::on_governance_object(self, object)
    }
}

impl Drop for NotificationDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("active", &self.is_active())
            .field(
                "notifiers",
                &self
                    .notifiers
                    .iter()
                    .map(|n| (n.kind(), n.address()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

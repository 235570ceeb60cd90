//! Notifiers: one publish endpoint for one event category.
//!
//! The [`Notifier`] trait gives every category a `notify_*` method with a
//! no-op default, so the dispatcher can offer every event to every notifier
//! and each concrete notifier only overrides the category it publishes.

use crate::events::{Block, GovernanceObject, GovernanceVote, Transaction};
use crate::internal_metrics;
use crate::transport::{SharedSocket, TransportContext, TransportError};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("notifier is not initialized")]
    NotInitialized,
    #[error("notifier is already initialized")]
    AlreadyInitialized,
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("publish to {address} failed: {source}")]
    Publish {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("socket lock poisoned")]
    Poisoned,
}

/// A configured publish endpoint.
///
/// Implementations must report failures through return values and never
/// panic: the dispatcher relies on a failed `notify_*` to retire the notifier.
pub trait Notifier: Send {
    /// The configuration key this notifier was created for, e.g. `pubhashblock`.
    fn kind(&self) -> &str;

    /// The transport address this notifier publishes to.
    fn address(&self) -> &str;

    /// Binds the notifier's socket on the shared context.
    fn initialize(&mut self, context: &mut TransportContext) -> Result<(), NotifierError>;

    /// Releases the socket. Safe to call repeatedly or before `initialize`.
    fn shutdown(&mut self);

    fn notify_block(&mut self, _block: &Block) -> Result<(), NotifierError> {
        Ok(())
    }

    fn notify_transaction(&mut self, _tx: &Transaction) -> Result<(), NotifierError> {
        Ok(())
    }

    fn notify_transaction_lock(&mut self, _tx: &Transaction) -> Result<(), NotifierError> {
        Ok(())
    }

    fn notify_governance_vote(&mut self, _vote: &GovernanceVote) -> Result<(), NotifierError> {
        Ok(())
    }

    fn notify_governance_object(
        &mut self,
        _object: &GovernanceObject,
    ) -> Result<(), NotifierError> {
        Ok(())
    }
}

/// The built-in notifier types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotifierKind {
    HashBlock,
    HashTx,
    HashTxLock,
    RawBlock,
    RawTx,
    RawTxLock,
    GovernanceVote,
    GovernanceObject,
}

impl NotifierKind {
    pub const ALL: [NotifierKind; 8] = [
        NotifierKind::HashBlock,
        NotifierKind::HashTx,
        NotifierKind::HashTxLock,
        NotifierKind::RawBlock,
        NotifierKind::RawTx,
        NotifierKind::RawTxLock,
        NotifierKind::GovernanceVote,
        NotifierKind::GovernanceObject,
    ];

    /// The configuration key enabling this notifier.
    pub fn key(&self) -> &'static str {
        match self {
            NotifierKind::HashBlock => "pubhashblock",
            NotifierKind::HashTx => "pubhashtx",
            NotifierKind::HashTxLock => "pubhashtxlock",
            NotifierKind::RawBlock => "pubrawblock",
            NotifierKind::RawTx => "pubrawtx",
            NotifierKind::RawTxLock => "pubrawtxlock",
            NotifierKind::GovernanceVote => "pubgvote",
            NotifierKind::GovernanceObject => "pubgobject",
        }
    }

    /// The topic sent as the first part of every message.
    pub fn topic(&self) -> &'static str {
        match self {
            NotifierKind::HashBlock => "hashblock",
            NotifierKind::HashTx => "hashtx",
            NotifierKind::HashTxLock => "hashtxlock",
            NotifierKind::RawBlock => "rawblock",
            NotifierKind::RawTx => "rawtx",
            NotifierKind::RawTxLock => "rawtxlock",
            NotifierKind::GovernanceVote => "hashgovernancevote",
            NotifierKind::GovernanceObject => "hashgovernanceobject",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Socket handling shared by the built-in notifiers.
///
/// Every message is `[topic, body, sequence]`, where `sequence` is a
/// little-endian `u32` counting this notifier's successful publishes.
pub struct Publisher {
    kind: NotifierKind,
    address: String,
    socket: Option<SharedSocket>,
    sequence: u32,
}

impl Publisher {
    pub fn new(kind: NotifierKind, address: String) -> Self {
        Self {
            kind,
            address,
            socket: None,
            sequence: 0,
        }
    }

    pub fn kind(&self) -> NotifierKind {
        self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_bound(&self) -> bool {
        self.socket.is_some()
    }

    /// The sequence number the next message will carry.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn initialize(&mut self, context: &mut TransportContext) -> Result<(), NotifierError> {
        if self.socket.is_some() {
            return Err(NotifierError::AlreadyInitialized);
        }
        let socket = context
            .bind(&self.address)
            .map_err(|source| NotifierError::Bind {
                address: self.address.clone(),
                source,
            })?;
        self.socket = Some(socket);
        Ok(())
    }

    pub fn shutdown(&mut self) {
        if self.socket.take().is_some() {
            debug!(kind = %self.kind, address = %self.address, "Released publish socket");
        }
    }

    pub fn publish(&mut self, body: &[u8]) -> Result<(), NotifierError> {
        let socket = self.socket.as_ref().ok_or(NotifierError::NotInitialized)?;
        {
            let mut socket = socket.lock().map_err(|_| NotifierError::Poisoned)?;
            socket
                .send_multipart(&[
                    self.kind.topic().as_bytes(),
                    body,
                    &self.sequence.to_le_bytes(),
                ])
                .map_err(|source| NotifierError::Publish {
                    address: self.address.clone(),
                    source,
                })?;
        }
        trace!(topic = self.kind.topic(), sequence = self.sequence, len = body.len(), "Published");
        self.sequence = self.sequence.wrapping_add(1);
        internal_metrics::record_published(self.kind.key());
        Ok(())
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .field("bound", &self.is_bound())
            .field("sequence", &self.sequence)
            .finish()
    }
}

macro_rules! publish_notifier {
    (
        $(#[$doc:meta])*
        $name:ident, $kind:expr,
        fn $method:ident(&mut $this:ident, $arg:ident: &$ty:ty) $body:block
    ) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name {
            publisher: Publisher,
        }

        impl $name {
            pub fn new(address: String) -> Self {
                Self {
                    publisher: Publisher::new($kind, address),
                }
            }

            pub fn publisher(&self) -> &Publisher {
                &self.publisher
            }
        }

        impl Notifier for $name {
            fn kind(&self) -> &str {
                self.publisher.kind().key()
            }

            fn address(&self) -> &str {
                self.publisher.address()
            }

            fn initialize(&mut self, context: &mut TransportContext) -> Result<(), NotifierError> {
                self.publisher.initialize(context)
            }

            fn shutdown(&mut self) {
                self.publisher.shutdown()
            }

            fn $method(&mut $this, $arg: &$ty) -> Result<(), NotifierError> $body
        }
    };
}

publish_notifier! {
    /// Publishes the hash of each new tip.
    HashBlockNotifier, NotifierKind::HashBlock,
    fn notify_block(&mut self, block: &Block) {
        self.publisher.publish(&block.hash.to_reversed_bytes())
    }
}

publish_notifier! {
    /// Publishes the txid of each transaction.
    HashTransactionNotifier, NotifierKind::HashTx,
    fn notify_transaction(&mut self, tx: &Transaction) {
        self.publisher.publish(&tx.txid.to_reversed_bytes())
    }
}

publish_notifier! {
    /// Publishes the txid of each locked transaction.
    HashTransactionLockNotifier, NotifierKind::HashTxLock,
    fn notify_transaction_lock(&mut self, tx: &Transaction) {
        self.publisher.publish(&tx.txid.to_reversed_bytes())
    }
}

publish_notifier! {
    /// Publishes each new tip block, serialized.
    RawBlockNotifier, NotifierKind::RawBlock,
    fn notify_block(&mut self, block: &Block) {
        self.publisher.publish(&block.raw)
    }
}

publish_notifier! {
    /// Publishes each transaction, serialized.
    RawTransactionNotifier, NotifierKind::RawTx,
    fn notify_transaction(&mut self, tx: &Transaction) {
        self.publisher.publish(&tx.raw)
    }
}

publish_notifier! {
    /// Publishes each locked transaction, serialized.
    RawTransactionLockNotifier, NotifierKind::RawTxLock,
    fn notify_transaction_lock(&mut self, tx: &Transaction) {
        self.publisher.publish(&tx.raw)
    }
}

publish_notifier! {
    /// Publishes the hash of each governance vote.
    GovernanceVoteNotifier, NotifierKind::GovernanceVote,
    fn notify_governance_vote(&mut self, vote: &GovernanceVote) {
        self.publisher.publish(&vote.hash.to_reversed_bytes())
    }
}

publish_notifier! {
    /// Publishes the hash of each governance object.
    GovernanceObjectNotifier, NotifierKind::GovernanceObject,
    fn notify_governance_object(&mut self, object: &GovernanceObject) {
        self.publisher.publish(&object.hash.to_reversed_bytes())
    }
}

/// Constructs the built-in notifier for `kind`.
pub fn builtin(kind: NotifierKind, address: String) -> Box<dyn Notifier> {
    match kind {
        NotifierKind::HashBlock => Box::new(HashBlockNotifier::new(address)),
        NotifierKind::HashTx => Box::new(HashTransactionNotifier::new(address)),
        NotifierKind::HashTxLock => Box::new(HashTransactionLockNotifier::new(address)),
        NotifierKind::RawBlock => Box::new(RawBlockNotifier::new(address)),
        NotifierKind::RawTx => Box::new(RawTransactionNotifier::new(address)),
        NotifierKind::RawTxLock => Box::new(RawTransactionLockNotifier::new(address)),
        NotifierKind::GovernanceVote => Box::new(GovernanceVoteNotifier::new(address)),
        NotifierKind::GovernanceObject => Box::new(GovernanceObjectNotifier::new(address)),
    }
}

//! Maps configuration keys to notifier constructors.

use crate::config::NotificationConfig;
use crate::events::{Block, GovernanceObject, GovernanceVote, Transaction};
use crate::notifier::{self, Notifier, NotifierError, NotifierKind};
use crate::transport::TransportContext;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Builds a notifier from its type key and configured address.
pub type NotifierFactory = Box<dyn Fn(&str, &str) -> Box<dyn Notifier> + Send + Sync>;

/// The set of notifier types that can be enabled from configuration.
///
/// Factories are kept in a sorted map, so `create` always yields notifiers in
/// key order regardless of how the configuration lists them.
pub struct NotifierRegistry {
    factories: BTreeMap<String, NotifierFactory>,
}

impl NotifierRegistry {
    /// A registry with no factories.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry holding the eight built-in notifier types.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for kind in NotifierKind::ALL {
            registry.register(kind.key(), move |_, address| {
                notifier::builtin(kind, address.to_string())
            });
        }
        registry
    }

    /// Adds a factory for `key`, replacing any existing one.
    pub fn register<F>(&mut self, key: &str, factory: F) -> &mut Self
    where
        F: Fn(&str, &str) -> Box<dyn Notifier> + Send + Sync + 'static,
    {
        self.factories.insert(key.to_string(), Box::new(factory));
        self
    }

    /// Registered keys, in the order `create` uses.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Instantiates one uninitialized notifier per enabled, recognized key.
    /// Each notifier reports the key it was created under as its `kind`.
    pub fn create(&self, config: &NotificationConfig) -> Vec<Box<dyn Notifier>> {
        for key in config.endpoints.keys() {
            if !self.contains(key) {
                debug!(key = %key, "Ignoring unrecognized notifier type");
            }
        }

        self.factories
            .iter()
            .filter_map(|(key, factory)| {
                let address = config.address(key)?;
                debug!(kind = %key, address, "Creating notifier");
                Some(Box::new(Tagged {
                    key: key.clone(),
                    inner: factory(key, address),
                }) as Box<dyn Notifier>)
            })
            .collect()
    }
}

/// A notifier tagged with the configuration key that enabled it.
struct Tagged {
    key: String,
    inner: Box<dyn Notifier>,
}

impl Notifier for Tagged {
    fn kind(&self) -> &str {
        &self.key
    }

    fn address(&self) -> &str {
        self.inner.address()
    }

    fn initialize(&mut self, context: &mut TransportContext) -> Result<(), NotifierError> {
        self.inner.initialize(context)
    }

    fn shutdown(&mut self) {
        self.inner.shutdown()
    }

    fn notify_block(&mut self, block: &Block) -> Result<(), NotifierError> {
        self.inner.notify_block(block)
    }

    fn notify_transaction(&mut self, tx: &Transaction) -> Result<(), NotifierError> {
        self.inner.notify_transaction(tx)
    }

    fn notify_transaction_lock(&mut self, tx: &Transaction) -> Result<(), NotifierError> {
        self.inner.notify_transaction_lock(tx)
    }

    fn notify_governance_vote(&mut self, vote: &GovernanceVote) -> Result<(), NotifierError> {
        self.inner.notify_governance_vote(vote)
    }

    fn notify_governance_object(
        &mut self,
        object: &GovernanceObject,
    ) -> Result<(), NotifierError> {
        self.inner.notify_governance_object(object)
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

#![allow(dead_code)]
//! A notifier that journals every call instead of publishing.

use chain_notify::events::{Block, GovernanceObject, GovernanceVote, Transaction};
use chain_notify::notifier::{Notifier, NotifierError};
use chain_notify::transport::{TransportContext, TransportError};
use chain_notify::NotifierRegistry;
use std::sync::{Arc, Mutex};

/// Shared, ordered log of `kind:call` entries across notifiers.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

pub fn count(journal: &Journal, entry: &str) -> usize {
    journal.lock().unwrap().iter().filter(|e| *e == entry).count()
}

pub struct RecordingNotifier {
    kind: String,
    address: String,
    journal: Journal,
    fail_initialize: bool,
    fail_from: Option<usize>,
    publishes: usize,
}

impl RecordingNotifier {
    pub fn new(kind: &str, address: &str, journal: &Journal) -> Self {
        Self {
            kind: kind.to_string(),
            address: address.to_string(),
            journal: journal.clone(),
            fail_initialize: false,
            fail_from: None,
            publishes: 0,
        }
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    /// Fails the `n`th publish (1-based) and every one after it.
    pub fn failing_from(mut self, n: usize) -> Self {
        self.fail_from = Some(n);
        self
    }

    fn record(&self, call: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.kind, call));
    }

    fn publish(&mut self, category: &str) -> Result<(), NotifierError> {
        self.record(category);
        self.publishes += 1;
        match self.fail_from {
            Some(n) if self.publishes >= n => Err(NotifierError::Publish {
                address: self.address.clone(),
                source: TransportError::Closed,
            }),
            _ => Ok(()),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn initialize(&mut self, _context: &mut TransportContext) -> Result<(), NotifierError> {
        self.record("initialize");
        if self.fail_initialize {
            return Err(NotifierError::Bind {
                address: self.address.clone(),
                source: TransportError::InvalidEndpoint(self.address.clone()),
            });
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.record("shutdown");
    }

    fn notify_block(&mut self, _block: &Block) -> Result<(), NotifierError> {
        self.publish("block")
    }

    fn notify_transaction(&mut self, _tx: &Transaction) -> Result<(), NotifierError> {
        self.publish("transaction")
    }

    fn notify_transaction_lock(&mut self, _tx: &Transaction) -> Result<(), NotifierError> {
        self.publish("transaction_lock")
    }

    fn notify_governance_vote(&mut self, _vote: &GovernanceVote) -> Result<(), NotifierError> {
        self.publish("governance_vote")
    }

    fn notify_governance_object(
        &mut self,
        _object: &GovernanceObject,
    ) -> Result<(), NotifierError> {
        self.publish("governance_object")
    }
}

/// How a registered recording notifier should behave.
#[derive(Clone, Copy)]
pub enum Behavior {
    Healthy,
    FailInitialize,
    FailFrom(usize),
}

/// A registry holding one recording factory per `(key, behavior)`.
pub fn recording_registry(journal: &Journal, keys: &[(&str, Behavior)]) -> NotifierRegistry {
    let mut registry = NotifierRegistry::empty();
    for (key, behavior) in keys {
        let journal = journal.clone();
        let behavior = *behavior;
        registry.register(key, move |kind, address| {
            let notifier = RecordingNotifier::new(kind, address, &journal);
            let notifier = match behavior {
                Behavior::Healthy => notifier,
                Behavior::FailInitialize => notifier.failing_initialize(),
                Behavior::FailFrom(n) => notifier.failing_from(n),
            };
            Box::new(notifier) as Box<dyn Notifier>
        });
    }
    registry
}

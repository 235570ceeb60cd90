//! chain-notify - Blockchain event notifications over pub/sub sockets
//!
//! This library provides the notifier contract, the registry that turns
//! configuration into notifiers, and the dispatcher that fans chain events
//! out to every enabled notifier.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod formatting;
pub mod internal_metrics;
pub mod notifier;
pub mod registry;
pub mod transport;

// Re-export the main types for convenience
pub use dispatcher::{ChainListener, DispatchError, NotificationDispatcher};
pub use events::*;
pub use notifier::{Notifier, NotifierError, NotifierKind};
pub use registry::{NotifierFactory, NotifierRegistry};

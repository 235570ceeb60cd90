//! Chain event values raised by the application layer.
//!
//! These are the payloads handed to the dispatcher's broadcast methods. They
//! carry exactly what the notifiers publish: identifiers for the `hash*`
//! topics and serialized bytes for the `raw*` topics.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{hex::Hex, serde_as};
use std::fmt;
use std::str::FromStr;

/// A 256-bit identifier (block hash, txid, governance hash).
///
/// Stored in internal byte order. `Display`, `FromStr` and serde use the
/// conventional reversed hex form that block explorers show.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Returns the bytes in reversed (display) order, as published on the wire.
    pub fn to_reversed_bytes(&self) -> [u8; 32] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_reversed_bytes()))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A connected block.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    pub hash: Hash256,
    pub height: u32,
    /// Consensus-serialized block.
    #[serde_as(as = "Hex")]
    #[serde(default)]
    pub raw: Vec<u8>,
}

/// An update of the active chain tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTip {
    /// The new tip of the active chain.
    pub new_tip: Block,
    /// The last block shared by the old and new chains, if any.
    #[serde(default)]
    pub fork_point: Option<Hash256>,
    /// Set while the node is still catching up on historical blocks.
    #[serde(default)]
    pub initial_download: bool,
}

impl BlockTip {
    /// True when publishing this update would only replay history or
    /// announce a tip that did not advance (blocks were disconnected without
    /// any new ones being connected).
    pub fn is_replay_or_noop(&self) -> bool {
        self.initial_download || self.fork_point == Some(self.new_tip.hash)
    }
}

/// A transaction entering the mempool or a block.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Transaction {
    pub txid: Hash256,
    /// Consensus-serialized transaction.
    #[serde_as(as = "Hex")]
    #[serde(default)]
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GovernanceVote {
    pub hash: Hash256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GovernanceObject {
    pub hash: Hash256,
}

/// Any event the dispatcher knows how to broadcast.
///
/// The binary reads these as newline-delimited JSON, e.g.
/// `{"event":"transaction","txid":"…","raw":"0100…"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChainEvent {
    BlockTip(BlockTip),
    Transaction(Transaction),
    TransactionLock(Transaction),
    GovernanceVote(GovernanceVote),
    GovernanceObject(GovernanceObject),
}

impl ChainEvent {
    /// A short label for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            ChainEvent::BlockTip(_) => "block_tip",
            ChainEvent::Transaction(_) => "transaction",
            ChainEvent::TransactionLock(_) => "transaction_lock",
            ChainEvent::GovernanceVote(_) => "governance_vote",
            ChainEvent::GovernanceObject(_) => "governance_object",
        }
    }
}

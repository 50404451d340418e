//! Gossip protocol messages
//!
//! Frames are single-line JSON objects of the form
//! `{"type": "CHAIN" | "TRANSACTION", "data": ...}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consensus::Block;
use crate::constants::MAX_MESSAGE_SIZE;
use crate::validation::Transaction;

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GossipMessage {
    /// Full chain snapshot
    Chain(Vec<Block>),
    /// A single pending transaction
    Transaction(Transaction),
}

/// Borrowed form used when encoding, avoids cloning the chain per broadcast
#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
enum OutboundMessage<'a> {
    Chain(&'a [Block]),
    Transaction(&'a Transaction),
}

/// Why an inbound frame was dropped
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Message too large: {0} bytes")]
    TooLarge(usize),
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl GossipMessage {
    /// Decode one frame. Unknown `type` tags are reported as malformed.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        if frame.len() > MAX_MESSAGE_SIZE {
            return Err(DecodeError::TooLarge(frame.len()));
        }
        Ok(serde_json::from_str(frame)?)
    }

    /// Wire tag for this message
    pub fn kind(&self) -> &'static str {
        match self {
            GossipMessage::Chain(_) => "CHAIN",
            GossipMessage::Transaction(_) => "TRANSACTION",
        }
    }
}

pub fn encode_chain(chain: &[Block]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundMessage::Chain(chain))
}

pub fn encode_transaction(tx: &Transaction) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundMessage::Transaction(tx))
}

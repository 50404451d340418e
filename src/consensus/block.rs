//! Block structure for the Sever chain
//!
//! A block carries either an ordered transaction list or a free-form JSON
//! payload, and is sealed by a proof-of-work nonce.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::crypto::{meets_difficulty, sha256_hex};
use crate::validation::Transaction;

/// Block contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    /// Transactions drained from the pending pool
    Transactions(Vec<Transaction>),
    /// Arbitrary payload (genesis text, demo blocks)
    Payload(serde_json::Value),
}

impl BlockData {
    /// Canonical JSON used in the block hash
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<Vec<Transaction>> for BlockData {
    fn from(txs: Vec<Transaction>) -> Self {
        BlockData::Transactions(txs)
    }
}

impl From<serde_json::Value> for BlockData {
    fn from(value: serde_json::Value) -> Self {
        BlockData::Payload(value)
    }
}

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Position in the chain
    pub index: u64,
    /// Creation time (milliseconds since Unix epoch)
    pub timestamp: u64,
    pub data: BlockData,
    /// Hash of the preceding block, `"0"` for genesis
    pub previous_hash: String,
    /// Nonce used for PoW
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Create a block with nonce 0 and its initial hash
    pub fn new(
        index: u64,
        timestamp: u64,
        data: impl Into<BlockData>,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            data: data.into(),
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Hex SHA-256 over index, previous hash, timestamp, data JSON and nonce
    pub fn calculate_hash(&self) -> String {
        let preimage = format!(
            "{}{}{}{}{}",
            self.index,
            self.previous_hash,
            self.timestamp,
            self.data.canonical_json(),
            self.nonce
        );
        sha256_hex(preimage.as_bytes())
    }

    /// Stored hash matches the block contents
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Transactions carried by this block (empty for payload blocks)
    pub fn transactions(&self) -> &[Transaction] {
        match &self.data {
            BlockData::Transactions(txs) => txs,
            BlockData::Payload(_) => &[],
        }
    }

    /// Refresh the hash after editing fields
    pub fn rehash(&mut self) {
        self.hash = self.calculate_hash();
    }

    /// Mine until the hash has `difficulty` leading zeros. Never gives up.
    pub fn mine(&mut self, difficulty: usize) {
        let never = AtomicBool::new(false);
        self.mine_until(difficulty, &never);
    }

    /// Mine until the target is met or `stop` is raised.
    ///
    /// Returns `false` when interrupted; the block is then left at the last
    /// nonce tried.
    pub fn mine_until(&mut self, difficulty: usize, stop: &AtomicBool) -> bool {
        self.hash = self.calculate_hash();

        while !meets_difficulty(&self.hash, difficulty) {
            if stop.load(Ordering::SeqCst) {
                return false;
            }
            self.advance_nonce();
            self.hash = self.calculate_hash();
        }

        info!(index = self.index, nonce = self.nonce, hash = %self.hash, "Block mined");
        true
    }

    fn advance_nonce(&mut self) {
        match self.nonce.checked_add(1) {
            Some(next) => self.nonce = next,
            None => {
                // Nonce space exhausted: move the timestamp and start over
                self.nonce = 0;
                self.timestamp = now_millis().max(self.timestamp.saturating_add(1));
            }
        }
    }
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

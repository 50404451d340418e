//! Read-only explorer queries over a block sequence

use serde::Serialize;

use crate::consensus::Block;
use crate::validation::Transaction;

/// One row of the block listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub index: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: u64,
    pub tx_count: usize,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            hash: block.hash.clone(),
            previous_hash: block.previous_hash.clone(),
            timestamp: block.timestamp,
            tx_count: block.transactions().len(),
        }
    }
}

/// A transaction together with the block that holds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(flatten)]
    pub tx: Transaction,
    pub block_index: u64,
}

pub fn block_summaries(chain: &[Block]) -> Vec<BlockSummary> {
    chain.iter().map(BlockSummary::from).collect()
}

/// Find a block by decimal index or by hash
pub fn find_block<'a>(chain: &'a [Block], id: &str) -> Option<&'a Block> {
    let index = id.parse::<u64>().ok();
    chain
        .iter()
        .find(|b| Some(b.index) == index || b.hash == id)
}

/// Every transaction in chain order
pub fn all_transactions(chain: &[Block]) -> Vec<TransactionRecord> {
    chain
        .iter()
        .flat_map(|block| {
            block.transactions().iter().map(move |tx| TransactionRecord {
                tx: tx.clone(),
                block_index: block.index,
            })
        })
        .collect()
}

/// Transactions sent or received by `address`
pub fn transactions_for_address(chain: &[Block], address: &str) -> Vec<TransactionRecord> {
    all_transactions(chain)
        .into_iter()
        .filter(|r| r.tx.from_address.as_deref() == Some(address) || r.tx.to_address == address)
        .collect()
}

//! Block miner implementation
//!
//! Runs proof-of-work on a blocking worker so the node keeps serving peers,
//! and can be interrupted through a shared stop signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::consensus::{Block, ChainError};
use crate::storage::{lock_chain, SharedChain};

/// Mining result
#[derive(Debug)]
pub enum MiningResult {
    /// Successfully mined a block
    Success(Block),
    /// Mining was interrupted
    Interrupted,
}

/// Block miner
#[derive(Clone)]
pub struct Miner {
    /// Address credited with the block reward
    reward_address: String,
    /// Stop signal
    stop_signal: Arc<AtomicBool>,
}

impl Miner {
    pub fn new(reward_address: impl Into<String>) -> Self {
        Self {
            reward_address: reward_address.into(),
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn reward_address(&self) -> &str {
        &self.reward_address
    }

    /// Get a stop signal handle
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }

    /// Mine a block on the current thread until found or stopped
    pub fn mine_block(&self, mut block: Block, difficulty: usize) -> MiningResult {
        if block.mine_until(difficulty, &self.stop_signal) {
            MiningResult::Success(block)
        } else {
            MiningResult::Interrupted
        }
    }

    /// Mine a block on a blocking worker task
    pub async fn mine_block_async(&self, block: Block, difficulty: usize) -> MiningResult {
        let miner = self.clone();
        match tokio::task::spawn_blocking(move || miner.mine_block(block, difficulty)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Mining worker failed");
                MiningResult::Interrupted
            }
        }
    }

    /// Mine the pending pool of a shared chain.
    ///
    /// The chain lock is only held to snapshot the candidate and to commit
    /// the result. Fails with [`ChainError::StaleBlock`] if the tip moved
    /// meanwhile; the pending pool is then left intact.
    pub async fn mine_pending(&self, chain: &SharedChain) -> Result<MiningResult, ChainError> {
        let (candidate, difficulty) = {
            let chain = lock_chain(chain);
            (chain.candidate_block(&self.reward_address), chain.difficulty())
        };

        match self.mine_block_async(candidate, difficulty).await {
            MiningResult::Success(block) => {
                let mut chain = lock_chain(chain);
                let committed = chain.commit_block(block)?.clone();
                info!(index = committed.index, txs = committed.transactions().len(), "Pending transactions mined");
                Ok(MiningResult::Success(committed))
            }
            MiningResult::Interrupted => Ok(MiningResult::Interrupted),
        }
    }
}

//! Chain state management
//!
//! Owns the block sequence, the pending transaction pool and the mining and
//! replacement rules. Peers are notified through a [`Broadcaster`] hook.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::consensus::{
    check_difficulty, is_valid_chain, meets_pow, now_millis, validate_chain,
    validate_chain_with_pow, Block, ChainError,
};
use crate::constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use crate::node::create_genesis_block;
use crate::validation::{Transaction, TransactionError};

/// Outbound notifications raised by chain mutations
pub trait Broadcaster: Send + Sync {
    fn broadcast_chain(&self, chain: &[Block]);
    fn broadcast_transaction(&self, tx: &Transaction);
}

/// Chain handle shared between the miner, the gossip layer and callers
pub type SharedChain = Arc<Mutex<Blockchain>>;

/// Lock a shared chain, recovering the state if a holder panicked
pub fn lock_chain(chain: &SharedChain) -> MutexGuard<'_, Blockchain> {
    chain.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Chain parameters
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Leading zero hex digits required of mined blocks
    pub difficulty: usize,
    /// Paid to the miner of each pending-pool block
    pub mining_reward: u64,
    /// Also require proof-of-work when adopting a peer chain
    pub enforce_pow_on_replace: bool,
}

impl ChainConfig {
    /// Build a config, rejecting difficulties that are zero or unsatisfiable
    pub fn new(
        difficulty: usize,
        mining_reward: u64,
        enforce_pow_on_replace: bool,
    ) -> Result<Self, ChainError> {
        Ok(Self {
            difficulty: check_difficulty(difficulty)?,
            mining_reward,
            enforce_pow_on_replace,
        })
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            enforce_pow_on_replace: false,
        }
    }
}

/// Result of offering a peer chain to [`Blockchain::replace_chain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    NotLonger,
    Invalid,
}

/// Result of a transaction received from a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GossipTxOutcome {
    Accepted,
    Duplicate,
}

pub struct Blockchain {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    config: ChainConfig,
    /// Ids of pooled transactions not yet committed to a block
    seen_transactions: HashSet<String>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
}

impl fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blockchain")
            .field("height", &self.chain.len())
            .field("tip", &self.latest_block().hash)
            .field("pending", &self.pending_transactions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl Blockchain {
    /// Create a chain holding a fresh genesis block
    pub fn new(config: ChainConfig) -> Self {
        Self::with_genesis(config, create_genesis_block(now_millis()))
    }

    /// Create a chain on top of a given genesis block
    pub fn with_genesis(config: ChainConfig, genesis: Block) -> Self {
        Self {
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            config,
            seen_transactions: HashSet::new(),
            broadcaster: None,
        }
    }

    pub fn into_shared(self) -> SharedChain {
        Arc::new(Mutex::new(self))
    }

    pub fn set_broadcaster(&mut self, broadcaster: Arc<dyn Broadcaster>) {
        self.broadcaster = Some(broadcaster);
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: a chain holds at least its genesis block
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    pub fn mining_reward(&self) -> u64 {
        self.config.mining_reward
    }

    pub fn latest_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    /// Link a block to the tip, mine it and append it
    pub fn add_block(&mut self, mut block: Block) -> &Block {
        block.previous_hash = self.latest_block().hash.clone();
        block.mine(self.config.difficulty);
        self.chain.push(block);
        self.notify_chain();
        self.latest_block()
    }

    pub fn is_chain_valid(&self) -> bool {
        is_valid_chain(&self.chain)
    }

    /// Validate a transaction and queue it for the next block
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), TransactionError> {
        let has_from = tx.from_address.as_deref().is_some_and(|a| !a.is_empty());
        if !has_from || tx.to_address.is_empty() {
            return Err(TransactionError::MissingAddress);
        }
        if !tx.is_valid()? {
            return Err(TransactionError::InvalidTransaction);
        }

        debug!(hash = %tx.calculate_hash(), amount = tx.amount, "Transaction queued");
        self.seen_transactions.insert(tx.id());
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast_transaction(&tx);
        }
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// Accept a transaction relayed by a peer, dropping ones already seen
    pub fn accept_gossiped_transaction(
        &mut self,
        tx: Transaction,
    ) -> Result<GossipTxOutcome, TransactionError> {
        let id = tx.id();
        if self.seen_transactions.contains(&id) || self.is_committed(&id) {
            debug!(hash = %tx.calculate_hash(), "Duplicate transaction ignored");
            return Ok(GossipTxOutcome::Duplicate);
        }
        self.add_transaction(tx)?;
        Ok(GossipTxOutcome::Accepted)
    }

    /// Build an unmined block from the pending pool plus the reward.
    ///
    /// The pool is left untouched; see [`Blockchain::commit_block`].
    pub fn candidate_block(&self, reward_address: &str) -> Block {
        let mut txs = self.pending_transactions.clone();
        txs.push(Transaction::reward(reward_address, self.config.mining_reward));
        Block::new(
            self.chain.len() as u64,
            now_millis(),
            txs,
            self.latest_block().hash.clone(),
        )
    }

    /// Append a block mined outside the lock from [`Blockchain::candidate_block`]
    pub fn commit_block(&mut self, block: Block) -> Result<&Block, ChainError> {
        if block.previous_hash != self.latest_block().hash {
            return Err(ChainError::StaleBlock);
        }
        let index = self.chain.len();
        if !block.has_valid_hash() {
            return Err(ChainError::HashMismatch { index });
        }
        if !meets_pow(&block, self.config.difficulty) {
            return Err(ChainError::InsufficientWork { index });
        }

        let included: HashSet<String> = block.transactions().iter().map(Transaction::id).collect();
        self.pending_transactions.retain(|tx| !included.contains(&tx.id()));
        self.forget_committed(&included);
        self.chain.push(block);
        self.notify_chain();
        Ok(self.latest_block())
    }

    /// Drain the pending pool into a newly mined block paying `reward_address`
    pub fn mine_pending_transactions(&mut self, reward_address: &str) -> &Block {
        let mut txs = std::mem::take(&mut self.pending_transactions);
        self.seen_transactions.clear();
        txs.push(Transaction::reward(reward_address, self.config.mining_reward));

        let mut block = Block::new(
            self.chain.len() as u64,
            now_millis(),
            txs,
            self.latest_block().hash.clone(),
        );
        block.mine(self.config.difficulty);
        self.chain.push(block);
        self.notify_chain();
        self.latest_block()
    }

    /// Net amount received by `address` across all blocks
    pub fn get_balance_of_address(&self, address: &str) -> i128 {
        let mut balance: i128 = 0;
        for tx in self.chain.iter().flat_map(Block::transactions) {
            if tx.from_address.as_deref() == Some(address) {
                balance -= i128::from(tx.amount);
            }
            if tx.to_address == address {
                balance += i128::from(tx.amount);
            }
        }
        balance
    }

    /// Adopt `candidate` if it is strictly longer and valid
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> ReplaceOutcome {
        if candidate.len() <= self.chain.len() {
            info!(
                received = candidate.len(),
                local = self.chain.len(),
                "Received chain is not longer than current chain"
            );
            return ReplaceOutcome::NotLonger;
        }

        let verdict = if self.config.enforce_pow_on_replace {
            validate_chain_with_pow(&candidate, self.config.difficulty)
        } else {
            validate_chain(&candidate)
        };
        if let Err(e) = verdict {
            info!(error = %e, "Received chain is invalid");
            return ReplaceOutcome::Invalid;
        }

        info!(
            from = self.chain.len(),
            to = candidate.len(),
            "Replacing blockchain with the received chain"
        );
        let adopted: HashSet<String> = candidate
            .iter()
            .flat_map(Block::transactions)
            .map(Transaction::id)
            .collect();
        self.pending_transactions.retain(|tx| !adopted.contains(&tx.id()));
        self.forget_committed(&adopted);
        self.chain = candidate;
        ReplaceOutcome::Replaced
    }

    /// Transaction id already carried by a block of the chain
    fn is_committed(&self, id: &str) -> bool {
        self.chain
            .iter()
            .flat_map(Block::transactions)
            .any(|tx| tx.id() == id)
    }

    fn forget_committed(&mut self, ids: &HashSet<String>) {
        self.seen_transactions.retain(|id| !ids.contains(id));
    }

    fn notify_chain(&self) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast_chain(&self.chain);
        }
    }
}

//! Sever Network Blockchain Core Library
//!
//! A pedagogical proof-of-work chain: signed account transfers, a pending
//! pool, longest-valid-chain replacement, JSON gossip between peers and an
//! off-chain token ledger.

pub mod consensus;
pub mod crypto;
pub mod explorer;
pub mod mining;
pub mod node;
pub mod p2p;
pub mod storage;
pub mod token;
pub mod validation;
pub mod wallet;

/// Protocol constants
pub mod constants {
    /// Leading zero hex digits required by default
    pub const DEFAULT_DIFFICULTY: usize = 2;

    /// Reward paid to the miner of a pending-pool block
    pub const DEFAULT_MINING_REWARD: u64 = 100;

    /// Largest satisfiable difficulty, one zero per hex digit of a SHA-256 hash
    pub const MAX_DIFFICULTY: usize = crate::crypto::HASH_HEX_LEN;

    /// Default gossip port
    pub const DEFAULT_P2P_PORT: u16 = 6001;

    /// Initial token supply (15 wallets * 1500 tokens)
    pub const DEFAULT_TOKEN_SUPPLY: u64 = 22_500;

    /// Wallets funded from the creator account at startup
    pub const DEFAULT_WALLET_COUNT: usize = 15;

    /// Account credited with the whole token supply
    pub const CREATOR_ACCOUNT: &str = "creator";

    /// Genesis block payload
    pub const GENESIS_PAYLOAD: &str = "Genesis Block";

    /// Largest gossip frame accepted from a peer (16 MB)
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
}

//! Chain validation
//!
//! Pure functions over a candidate block sequence. The default validator
//! checks hash integrity and linkage only; proof-of-work is checked by the
//! stricter variant.

use thiserror::Error;

use crate::consensus::Block;
use crate::constants::MAX_DIFFICULTY;
use crate::crypto::meets_difficulty;
use crate::node::is_genesis;

/// Previous hash carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Chain errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Genesis block must be index 0, link to \"0\" and match its hash")]
    InvalidGenesis,
    #[error("Block {index} hash does not match its contents")]
    HashMismatch { index: usize },
    #[error("Block {index} does not link to its predecessor")]
    BrokenLink { index: usize },
    #[error("Block {index} does not meet the difficulty target")]
    InsufficientWork { index: usize },
    #[error("Mined block no longer extends the chain tip")]
    StaleBlock,
    #[error("Difficulty must be between 1 and {max}, got {0}", max = MAX_DIFFICULTY)]
    InvalidDifficulty(usize),
}

/// Accept difficulties that are positive and satisfiable by a hex SHA-256 hash
pub fn check_difficulty(difficulty: usize) -> Result<usize, ChainError> {
    if (1..=MAX_DIFFICULTY).contains(&difficulty) {
        Ok(difficulty)
    } else {
        Err(ChainError::InvalidDifficulty(difficulty))
    }
}

/// Block hash has `difficulty` leading zero characters
pub fn meets_pow(block: &Block, difficulty: usize) -> bool {
    meets_difficulty(&block.hash, difficulty)
}

/// Validate hash integrity and linkage of every block after genesis
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    let genesis = chain.first().ok_or(ChainError::EmptyChain)?;
    if !is_genesis(genesis) {
        return Err(ChainError::InvalidGenesis);
    }

    for (i, pair) in chain.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let index = i + 1;

        if !current.has_valid_hash() {
            return Err(ChainError::HashMismatch { index });
        }
        if current.previous_hash != previous.hash {
            return Err(ChainError::BrokenLink { index });
        }
    }

    Ok(())
}

/// Like [`validate_chain`], and every non-genesis hash must meet `difficulty`
pub fn validate_chain_with_pow(chain: &[Block], difficulty: usize) -> Result<(), ChainError> {
    validate_chain(chain)?;

    for (index, block) in chain.iter().enumerate().skip(1) {
        if !meets_pow(block, difficulty) {
            return Err(ChainError::InsufficientWork { index });
        }
    }

    Ok(())
}

pub fn is_valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}

pub fn is_valid_chain_with_pow(chain: &[Block], difficulty: usize) -> bool {
    validate_chain_with_pow(chain, difficulty).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Transaction;
    use serde_json::json;

    fn mined_chain(len: usize, difficulty: usize) -> Vec<Block> {
        let mut chain = vec![Block::new(0, 0, json!("Genesis Block"), GENESIS_PREVIOUS_HASH)];
        for i in 1..len {
            let prev = chain[i - 1].hash.clone();
            let mut block = Block::new(i as u64, i as u64, vec![Transaction::reward("m", 1)], prev);
            block.mine(difficulty);
            chain.push(block);
        }
        chain
    }

    #[test]
    fn test_valid_chain() {
        let chain = mined_chain(4, 1);
        assert_eq!(validate_chain(&chain), Ok(()));
        assert!(is_valid_chain_with_pow(&chain, 1));
    }

    #[test]
    fn test_genesis_only_is_valid() {
        assert!(is_valid_chain(&mined_chain(1, 1)));
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert_eq!(validate_chain(&[]), Err(ChainError::EmptyChain));
    }

    #[test]
    fn test_bad_genesis_rejected() {
        let mut chain = mined_chain(2, 1);
        chain[0].previous_hash = "1".into();
        assert_eq!(validate_chain(&chain), Err(ChainError::InvalidGenesis));
    }

    #[test]
    fn test_tampered_genesis_rejected() {
        let mut chain = mined_chain(2, 1);
        chain[0].timestamp = 42;
        assert_eq!(validate_chain(&chain), Err(ChainError::InvalidGenesis));

        let mut chain = mined_chain(2, 1);
        chain[0].index = 1;
        chain[0].rehash();
        assert_eq!(validate_chain(&chain), Err(ChainError::InvalidGenesis));
    }

    #[test]
    fn test_difficulty_bounds() {
        assert_eq!(check_difficulty(1), Ok(1));
        assert_eq!(check_difficulty(MAX_DIFFICULTY), Ok(MAX_DIFFICULTY));
        assert_eq!(check_difficulty(0), Err(ChainError::InvalidDifficulty(0)));
        assert_eq!(check_difficulty(65), Err(ChainError::InvalidDifficulty(65)));
    }

    #[test]
    fn test_tampered_data_rejected() {
        let mut chain = mined_chain(3, 1);
        chain[1].data = vec![Transaction::reward("thief", 1_000)].into();
        assert_eq!(validate_chain(&chain), Err(ChainError::HashMismatch { index: 1 }));
    }

    #[test]
    fn test_tampered_fields_rejected() {
        let chain = mined_chain(3, 1);

        let mut c = chain.clone();
        c[2].nonce += 1;
        assert!(!is_valid_chain(&c));

        let mut c = chain.clone();
        c[2].timestamp += 1;
        assert!(!is_valid_chain(&c));

        let mut c = chain.clone();
        c[1].index = 9;
        assert!(!is_valid_chain(&c));
    }

    #[test]
    fn test_relinked_block_rejected() {
        let mut chain = mined_chain(3, 1);
        chain[2].previous_hash = "f".repeat(64);
        chain[2].rehash();
        assert_eq!(validate_chain(&chain), Err(ChainError::BrokenLink { index: 2 }));
    }

    #[test]
    fn test_unmined_chain_passes_default_but_not_pow() {
        let genesis = Block::new(0, 0, json!("Genesis Block"), GENESIS_PREVIOUS_HASH);
        let mut next = Block::new(1, 1, json!({ "amount": 4 }), genesis.hash.clone());
        // Find a nonce whose hash does NOT start with zero
        while next.hash.starts_with('0') {
            next.nonce += 1;
            next.rehash();
        }
        let chain = vec![genesis, next];

        assert!(is_valid_chain(&chain));
        assert_eq!(
            validate_chain_with_pow(&chain, 1),
            Err(ChainError::InsufficientWork { index: 1 })
        );
    }
}

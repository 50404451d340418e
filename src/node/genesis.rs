//! Genesis block generation
//!
//! The genesis block is unmined, carries a text payload and links to `"0"`.

use serde_json::json;

use crate::consensus::{Block, GENESIS_PREVIOUS_HASH};
use crate::constants::GENESIS_PAYLOAD;

/// Create the genesis block stamped with `timestamp` (milliseconds)
pub fn create_genesis_block(timestamp: u64) -> Block {
    Block::new(0, timestamp, json!(GENESIS_PAYLOAD), GENESIS_PREVIOUS_HASH)
}

/// Check that a block is shaped like a genesis block
pub fn is_genesis(block: &Block) -> bool {
    block.index == 0 && block.previous_hash == GENESIS_PREVIOUS_HASH && block.has_valid_hash()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_determinism() {
        let genesis1 = create_genesis_block(1_700_000_000_000);
        let genesis2 = create_genesis_block(1_700_000_000_000);

        assert_eq!(genesis1.hash, genesis2.hash);
        assert_eq!(genesis1.nonce, 0);
        assert!(is_genesis(&genesis1));
    }

    #[test]
    fn test_genesis_depends_on_timestamp() {
        assert_ne!(create_genesis_block(1).hash, create_genesis_block(2).hash);
    }

    #[test]
    fn test_non_genesis_detected() {
        let genesis = create_genesis_block(1);
        let next = Block::new(1, 2, json!("x"), genesis.hash.clone());
        assert!(!is_genesis(&next));
    }
}

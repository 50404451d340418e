//! Property-based and adversarial tests for the Sever chain
//!
//! These tests verify invariants hold under random inputs and tampering.

use proptest::prelude::*;
use serde_json::json;
use sever_core::consensus::{is_valid_chain, is_valid_chain_with_pow, Block};
use sever_core::constants::CREATOR_ACCOUNT;
use sever_core::crypto::meets_difficulty;
use sever_core::storage::{Blockchain, ChainConfig, ReplaceOutcome};
use sever_core::token::TokenLedger;
use sever_core::validation::Transaction;
use sever_core::wallet::KeyPair;

fn easy_chain() -> Blockchain {
    Blockchain::new(ChainConfig {
        difficulty: 1,
        ..ChainConfig::default()
    })
}

fn chain_of(len: u64) -> Blockchain {
    let mut chain = easy_chain();
    for i in 1..len {
        chain.add_block(Block::new(i, 1_000 + i, json!({ "amount": i }), ""));
    }
    chain
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

proptest! {
    /// Block hash is deterministic
    #[test]
    fn prop_block_hash_deterministic(
        index in 0u64..1_000_000u64,
        timestamp in 0u64..u64::MAX,
        amount in 0u64..u64::MAX,
        previous in "[0-9a-f]{64}",
    ) {
        let a = Block::new(index, timestamp, json!({ "amount": amount }), previous.clone());
        let b = Block::new(index, timestamp, json!({ "amount": amount }), previous);

        prop_assert_eq!(&a.hash, &b.hash);
        prop_assert_eq!(a.hash.len(), 64);
        prop_assert!(a.has_valid_hash());
    }

    /// Different nonces produce different hashes
    #[test]
    fn prop_different_nonce_different_hash(
        nonce_a in 0u64..u64::MAX,
        nonce_b in 0u64..u64::MAX,
    ) {
        prop_assume!(nonce_a != nonce_b);

        let mut block = Block::new(1, 0, json!("payload"), "prev");
        block.nonce = nonce_a;
        let hash_a = block.calculate_hash();
        block.nonce = nonce_b;
        let hash_b = block.calculate_hash();

        prop_assert_ne!(hash_a, hash_b);
    }

    /// Mined hashes always carry the required zero prefix
    #[test]
    fn prop_mined_block_meets_difficulty(
        difficulty in 1usize..=3,
        timestamp in 0u64..1_000_000_000u64,
        amount in 0u64..1_000u64,
    ) {
        let mut block = Block::new(1, timestamp, json!({ "amount": amount }), "prev");
        block.mine(difficulty);

        prop_assert!(meets_difficulty(&block.hash, difficulty));
        prop_assert!(block.has_valid_hash());
    }

    /// Token transfers never create or destroy supply
    #[test]
    fn prop_token_supply_conserved(
        supply in 1u64..1_000_000u64,
        transfers in prop::collection::vec((0usize..4, 0usize..4, 0u64..500_000u64), 0..40),
    ) {
        let accounts = [CREATOR_ACCOUNT, "alice", "bob", "carol"];
        let mut token = TokenLedger::new("Sever N", "SN", supply);

        for (from, to, amount) in transfers {
            let before = token.balance_of(accounts[from]);
            let moved = token.transfer(accounts[from], accounts[to], amount);
            prop_assert_eq!(moved, before >= amount);
            prop_assert_eq!(token.circulating(), supply);
        }
    }

    /// System transactions verify without any signature
    #[test]
    fn prop_system_transaction_valid(to in "[a-z0-9]{1,40}", amount in 0u64..u64::MAX) {
        let tx = Transaction::reward(to, amount);
        prop_assert!(tx.is_system());
        prop_assert_eq!(tx.is_valid(), Ok(true));
    }

    /// Changing any field of a non-genesis block breaks validation
    #[test]
    fn prop_tampering_invalidates_chain(
        len in 2u64..6u64,
        victim in 1usize..6usize,
        amount in 1_000u64..u64::MAX,
    ) {
        let chain = chain_of(len);
        let victim = victim % chain.len();
        prop_assume!(victim > 0);

        let mut blocks = chain.chain().to_vec();
        prop_assert!(is_valid_chain(&blocks));

        blocks[victim].data = json!({ "amount": amount }).into();
        prop_assert!(!is_valid_chain(&blocks));

        // Rehashing alone still breaks the successor's link
        blocks[victim].hash = blocks[victim].calculate_hash();
        prop_assert_eq!(is_valid_chain(&blocks), victim + 1 == blocks.len());
    }
}

// ============================================================================
// ADVERSARIAL TESTS
// ============================================================================

/// A forged transfer is refused and leaves the pool empty
#[test]
fn test_forged_signature_rejected() {
    let alice = KeyPair::generate();
    let mallory = KeyPair::generate();

    let mut tx = Transaction::new(alice.address.clone(), "mallory", 500);
    assert!(tx.sign(mallory.private_key()).is_err());

    let mut signed = alice.create_transaction("bob", 5).unwrap();
    signed.amount = 500;

    let mut chain = easy_chain();
    assert!(chain.add_transaction(signed).is_err());
    assert!(chain.pending_transactions().is_empty());
}

/// A longer chain that was never mined is adopted unless PoW is enforced
#[test]
fn test_unmined_longer_chain() {
    let local = chain_of(2);

    let mut forged = local.chain().to_vec();
    for i in 2..5u64 {
        let previous = forged.last().unwrap().hash.clone();
        forged.push(Block::new(i, 5_000 + i, json!({ "amount": 1_000_000 }), previous));
    }
    assert!(is_valid_chain(&forged));

    let mut lenient = Blockchain::with_genesis(ChainConfig::default(), local.chain()[0].clone());
    let mut strict = Blockchain::with_genesis(
        ChainConfig {
            difficulty: 4,
            enforce_pow_on_replace: true,
            ..ChainConfig::default()
        },
        local.chain()[0].clone(),
    );

    if !is_valid_chain_with_pow(&forged, 4) {
        assert_eq!(strict.replace_chain(forged.clone()), ReplaceOutcome::Invalid);
        assert_eq!(strict.len(), 1);
    }
    assert_eq!(lenient.replace_chain(forged), ReplaceOutcome::Replaced);
    assert_eq!(lenient.len(), 5);
}

/// Equal-length chains never replace the local one
#[test]
fn test_equal_length_chain_ignored() {
    let mut a = chain_of(3);
    let b = chain_of(3);
    let original_tip = a.latest_block().hash.clone();

    assert_eq!(a.replace_chain(b.chain().to_vec()), ReplaceOutcome::NotLonger);
    assert_eq!(a.latest_block().hash, original_tip);
}

/// A chain whose genesis was swapped out is refused
#[test]
fn test_foreign_genesis_rejected() {
    let mut local = easy_chain();
    let mut foreign = chain_of(3).chain().to_vec();
    foreign[0].previous_hash = "ff".to_string();

    assert_eq!(local.replace_chain(foreign), ReplaceOutcome::Invalid);
    assert_eq!(local.len(), 1);
}

//! Wallet implementation
//!
//! Key generation, transaction signing and the initial token distribution.
//! The wallet does not touch consensus state.

use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::constants::CREATOR_ACCOUNT;
use crate::crypto::{KeyError, PrivateKey, PublicKey};
use crate::token::TokenLedger;
use crate::validation::{Transaction, TransactionError};

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("Unknown address")]
    UnknownAddress,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// A wallet key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    private_key: PrivateKey,
    pub public_key: PublicKey,
    /// Hex public key, the account address
    pub address: String,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self::from_private_key(PrivateKey::generate())
    }

    fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        let address = public_key.to_address();
        Self {
            private_key,
            public_key,
            address,
        }
    }

    /// Import from a hex private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, WalletError> {
        Ok(Self::from_private_key(PrivateKey::from_hex(hex_key)?))
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn private_key_hex(&self) -> String {
        self.private_key.to_hex()
    }

    /// Build and sign a transfer from this key
    pub fn create_transaction(
        &self,
        to_address: impl Into<String>,
        amount: u64,
    ) -> Result<Transaction, TransactionError> {
        let mut tx = Transaction::new(self.address.clone(), to_address, amount);
        tx.sign(&self.private_key)?;
        Ok(tx)
    }
}

/// A simple wallet
#[derive(Debug, Default)]
pub struct Wallet {
    /// address -> keypair
    keys: HashMap<String, KeyPair>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new key and add to wallet
    pub fn generate_key(&mut self) -> &KeyPair {
        self.add_key(KeyPair::generate())
    }

    /// Import a hex private key
    pub fn import_key(&mut self, hex_key: &str) -> Result<&KeyPair, WalletError> {
        let keypair = KeyPair::from_private_key_hex(hex_key)?;
        Ok(self.add_key(keypair))
    }

    /// Store a key pair. An address already held keeps its existing entry.
    pub fn add_key(&mut self, keypair: KeyPair) -> &KeyPair {
        let address = keypair.address.clone();
        self.keys.entry(address).or_insert(keypair)
    }

    pub fn get_key_for_address(&self, address: &str) -> Option<&KeyPair> {
        self.keys.get(address)
    }

    pub fn get_addresses(&self) -> Vec<&str> {
        self.keys.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sign a transfer from one of this wallet's addresses
    pub fn create_transaction(
        &self,
        from_address: &str,
        to_address: &str,
        amount: u64,
    ) -> Result<Transaction, WalletError> {
        let keypair = self
            .get_key_for_address(from_address)
            .ok_or(WalletError::UnknownAddress)?;
        Ok(keypair.create_transaction(to_address, amount)?)
    }
}

/// Generate `count` wallets and fund each from the creator account.
///
/// Stops early once the creator can no longer cover `amount_each`.
pub fn fund_initial_wallets(token: &mut TokenLedger, count: usize, amount_each: u64) -> Vec<KeyPair> {
    let mut funded = Vec::with_capacity(count);
    for _ in 0..count {
        let keypair = KeyPair::generate();
        if !token.transfer(CREATOR_ACCOUNT, &keypair.address, amount_each) {
            break;
        }
        funded.push(keypair);
    }

    info!(
        wallets = funded.len(),
        amount_each,
        creator_remaining = token.balance_of(CREATOR_ACCOUNT),
        "Initial wallets funded"
    );
    funded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_signs_valid_transaction() {
        let keypair = KeyPair::generate();
        let tx = keypair.create_transaction("bob", 42).unwrap();

        assert_eq!(tx.from_address.as_deref(), Some(keypair.address.as_str()));
        assert_eq!(tx.is_valid(), Ok(true));
    }

    #[test]
    fn test_import_roundtrip() {
        let keypair = KeyPair::generate();
        let imported = KeyPair::from_private_key_hex(&keypair.private_key_hex()).unwrap();
        assert_eq!(imported.address, keypair.address);

        assert!(KeyPair::from_private_key_hex("zz").is_err());
    }

    #[test]
    fn test_wallet_lookup() {
        let mut wallet = Wallet::new();
        let address = wallet.generate_key().address.clone();

        assert_eq!(wallet.len(), 1);
        assert!(wallet.get_key_for_address(&address).is_some());
        assert!(wallet.create_transaction(&address, "bob", 1).is_ok());
        assert!(matches!(
            wallet.create_transaction("unknown", "bob", 1),
            Err(WalletError::UnknownAddress)
        ));
    }

    #[test]
    fn test_import_same_key_twice() {
        let mut wallet = Wallet::new();
        let hex_key = KeyPair::generate().private_key_hex();
        wallet.import_key(&hex_key).unwrap();
        wallet.import_key(&hex_key).unwrap();
        assert_eq!(wallet.len(), 1);
    }

    #[test]
    fn test_add_funded_keys() {
        let mut token = TokenLedger::new("Sever N", "SN", 300);
        let mut wallet = Wallet::new();
        for keypair in fund_initial_wallets(&mut token, 3, 100) {
            wallet.add_key(keypair);
        }

        assert_eq!(wallet.len(), 3);
        for address in wallet.get_addresses() {
            assert_eq!(token.balance_of(address), 100);
        }
    }

    #[test]
    fn test_fund_initial_wallets() {
        let mut token = TokenLedger::new("Sever N", "SN", 22_500);
        let wallets = fund_initial_wallets(&mut token, 15, 1_500);

        assert_eq!(wallets.len(), 15);
        assert_eq!(token.balance_of(CREATOR_ACCOUNT), 0);
        for w in &wallets {
            assert_eq!(token.balance_of(&w.address), 1_500);
        }
    }

    #[test]
    fn test_fund_stops_when_creator_exhausted() {
        let mut token = TokenLedger::new("Sever N", "SN", 2_500);
        let wallets = fund_initial_wallets(&mut token, 5, 1_000);

        assert_eq!(wallets.len(), 2);
        assert_eq!(token.balance_of(CREATOR_ACCOUNT), 500);
    }
}

//! Transaction structure and validation
//!
//! Account-style value transfers signed with secp256k1 ECDSA. A transaction
//! without a sender is a system-issued mining reward.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{sha256, EcdsaSignature, PrivateKey, PublicKey};

/// Transaction errors surfaced to callers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction must include from and to addresses")]
    MissingAddress,
    #[error("Cannot add invalid transaction to chain")]
    InvalidTransaction,
    #[error("You cannot sign transactions for other wallets")]
    UnauthorizedSigner,
    #[error("No signature in this transaction")]
    MissingSignature,
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// A value transfer between two addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Sender public key (hex), `None` for mining rewards
    pub from_address: Option<String>,
    /// Recipient public key (hex)
    pub to_address: String,
    pub amount: u64,
    /// Hex DER signature over the transaction hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    /// Create an unsigned transfer
    pub fn new(from_address: impl Into<String>, to_address: impl Into<String>, amount: u64) -> Self {
        Self {
            from_address: Some(from_address.into()),
            to_address: to_address.into(),
            amount,
            signature: None,
        }
    }

    /// Create a system reward transaction
    pub fn reward(to_address: impl Into<String>, amount: u64) -> Self {
        Self {
            from_address: None,
            to_address: to_address.into(),
            amount,
            signature: None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.from_address.is_none()
    }

    /// Bytes covered by the hash; a missing sender renders as `null`
    fn preimage(&self) -> Vec<u8> {
        let from = self.from_address.as_deref().unwrap_or("null");
        format!("{}{}{}", from, self.to_address, self.amount).into_bytes()
    }

    fn digest(&self) -> [u8; 32] {
        sha256(&self.preimage())
    }

    /// Hex SHA-256 over (from, to, amount)
    pub fn calculate_hash(&self) -> String {
        hex::encode(self.digest())
    }

    /// Identity used to recognise a transaction seen before
    pub fn id(&self) -> String {
        format!(
            "{}:{}",
            self.calculate_hash(),
            self.signature.as_deref().unwrap_or_default()
        )
    }

    /// Sign with the sender's key
    pub fn sign(&mut self, signing_key: &PrivateKey) -> Result<(), TransactionError> {
        let signer = signing_key.public_key().to_address();
        if self.from_address.as_deref() != Some(signer.as_str()) {
            return Err(TransactionError::UnauthorizedSigner);
        }

        let signature = signing_key
            .sign(&self.digest())
            .map_err(|e| TransactionError::SigningFailed(e.to_string()))?;
        self.signature = Some(signature.to_hex());
        Ok(())
    }

    /// Check the signature against the sender's address.
    ///
    /// System transactions are always valid. A tampered transaction or an
    /// undecodable key/signature yields `Ok(false)`.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let from = match &self.from_address {
            None => return Ok(true),
            Some(from) => from,
        };

        let signature = match self.signature.as_deref() {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        let public_key = match PublicKey::from_address(from) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };
        let signature = match EcdsaSignature::from_hex(signature) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };

        Ok(public_key.verify(&self.digest(), &signature))
    }
}

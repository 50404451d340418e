//! ECDSA key handling
//!
//! secp256k1 keys sign transaction digests. The hex-encoded uncompressed
//! SEC1 public key doubles as the account address.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Key and signature encoding errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// secp256k1 private key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// secp256k1 public key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

/// DER-encoded ECDSA signature
#[derive(Clone, PartialEq, Eq)]
pub struct EcdsaSignature(pub Vec<u8>);

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    /// Create from 32 bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        SigningKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    /// Create from a hex string
    pub fn from_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        SigningKey::from_slice(&bytes)
            .map(PrivateKey)
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.verifying_key())
    }

    /// Sign a 32-byte message digest
    pub fn sign(&self, digest: &[u8; 32]) -> Result<EcdsaSignature, KeyError> {
        let signature: Signature = self
            .0
            .sign_prehash(digest)
            .map_err(|e| KeyError::SigningFailed(e.to_string()))?;
        Ok(EcdsaSignature(signature.to_der().as_bytes().to_vec()))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl PublicKey {
    /// Parse a SEC1-encoded key (compressed or uncompressed)
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    /// Parse an account address back into a key
    pub fn from_address(address: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(address).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Hex of the uncompressed SEC1 encoding
    pub fn to_address(&self) -> String {
        hex::encode(self.0.to_encoded_point(false).as_bytes())
    }

    /// Verify a signature over a 32-byte digest
    pub fn verify(&self, digest: &[u8; 32], signature: &EcdsaSignature) -> bool {
        let sig = match Signature::from_der(&signature.0) {
            Ok(s) => s,
            Err(_) => return false,
        };
        self.0.verify_prehash(digest, &sig).is_ok()
    }
}

impl EcdsaSignature {
    pub fn from_hex(hex_sig: &str) -> Result<Self, KeyError> {
        hex::decode(hex_sig)
            .map(EcdsaSignature)
            .map_err(|_| KeyError::InvalidSignature)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_address())
    }
}

impl std::fmt::Debug for EcdsaSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

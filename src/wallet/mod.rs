//! Wallet module - Key management, signing and initial token distribution

mod wallet;

pub use wallet::*;

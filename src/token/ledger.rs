//! Off-chain token ledger
//!
//! ERC20-style balance map. The whole supply is minted to the creator
//! account once; afterwards tokens only move through `transfer`.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::constants::CREATOR_ACCOUNT;

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub total_supply: u64,
}

#[derive(Debug, Clone)]
pub struct TokenLedger {
    name: String,
    symbol: String,
    total_supply: u64,
    balances: HashMap<String, u64>,
}

impl TokenLedger {
    /// Create a ledger and credit `total_supply` to the creator account
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, total_supply: u64) -> Self {
        let mut balances = HashMap::new();
        balances.insert(CREATOR_ACCOUNT.to_string(), total_supply);
        Self {
            name: name.into(),
            symbol: symbol.into(),
            total_supply,
            balances,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn info(&self) -> TokenInfo {
        TokenInfo {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            total_supply: self.total_supply,
        }
    }

    /// Move `amount` from `from` to `to`. Returns `false` on insufficient balance.
    pub fn transfer(&mut self, from: &str, to: &str, amount: u64) -> bool {
        let available = self.balance_of(from);
        if available < amount {
            debug!(from, available, amount, "Token transfer rejected");
            return false;
        }

        self.balances.insert(from.to_string(), available - amount);
        *self.balances.entry(to.to_string()).or_insert(0) += amount;
        true
    }

    /// Balance of `address`, zero if it never received tokens
    pub fn balance_of(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Sum of all balances
    pub fn circulating(&self) -> u64 {
        self.balances.values().sum()
    }

    /// Number of accounts holding an entry
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }
}

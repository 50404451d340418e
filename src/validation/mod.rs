//! Validation module - Transactions and signature checks

mod transaction;

pub use transaction::*;

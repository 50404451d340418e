//! Token module - Off-chain reward token ledger

mod ledger;

pub use ledger::*;

//! Mining module - Cancellable proof-of-work on a worker task

mod miner;

pub use miner::*;

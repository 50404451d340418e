//! Consensus module - Block structure and chain validation

mod block;
mod validation;

pub use block::*;
pub use validation::*;

//! Storage module - In-memory chain state and pending pool

mod state;

pub use state::*;

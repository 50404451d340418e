//! Explorer module - Block and transaction listings for external readers

mod queries;

pub use queries::*;

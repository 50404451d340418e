//! Node module - Genesis creation and startup configuration

mod config;
mod genesis;

pub use config::*;
pub use genesis::*;

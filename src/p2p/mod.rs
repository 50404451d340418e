//! P2P networking module - Peer connections and gossip propagation

mod peer;
mod protocol;
mod server;

pub use peer::*;
pub use protocol::*;
pub use server::*;

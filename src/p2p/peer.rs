//! Peer management
//!
//! Tracks live gossip connections. Each peer owns an outbound frame queue
//! drained by its writer task; a closed queue means the connection is gone.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::protocol::{encode_chain, encode_transaction};
use crate::consensus::Block;
use crate::storage::Broadcaster;
use crate::validation::Transaction;

pub type PeerId = u64;

/// Which side opened the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Information about a connected peer
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub id: PeerId,
    /// Peer's network address
    pub addr: SocketAddr,
    pub direction: Direction,
    pub connected_at: Instant,
}

#[derive(Debug)]
struct PeerHandle {
    info: PeerInfo,
    outbound: UnboundedSender<String>,
}

/// Registry of connected peers
#[derive(Debug, Default)]
pub struct PeerRegistry {
    next_id: AtomicU64,
    peers: Mutex<HashMap<PeerId, PeerHandle>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<PeerId, PeerHandle>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection and its outbound queue
    pub fn register(
        &self,
        addr: SocketAddr,
        direction: Direction,
        outbound: UnboundedSender<String>,
    ) -> PeerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = PeerInfo {
            id,
            addr,
            direction,
            connected_at: Instant::now(),
        };
        self.peers().insert(id, PeerHandle { info, outbound });
        id
    }

    /// Forget a peer. Returns `false` if it was already gone.
    pub fn unregister(&self, id: PeerId) -> bool {
        self.peers().remove(&id).is_some()
    }

    /// Queue a frame for one peer, pruning it if its queue is closed
    pub fn send_to(&self, id: PeerId, frame: String) -> bool {
        let mut peers = self.peers();
        let Some(handle) = peers.get(&id) else {
            return false;
        };
        if handle.outbound.send(frame).is_err() {
            peers.remove(&id);
            return false;
        }
        true
    }

    /// Queue a frame for every peer. Returns the number of peers reached.
    pub fn broadcast(&self, frame: &str) -> usize {
        let mut peers = self.peers();
        let before = peers.len();
        peers.retain(|_, handle| handle.outbound.send(frame.to_string()).is_ok());

        let dropped = before - peers.len();
        if dropped > 0 {
            debug!(dropped, "Pruned closed peer connections");
        }
        peers.len()
    }

    /// Number of live connections
    pub fn active_peers(&self) -> usize {
        self.peers().len()
    }

    pub fn peer_info(&self) -> Vec<PeerInfo> {
        self.peers().values().map(|h| h.info.clone()).collect()
    }

    /// Drop every connection. Writer tasks exit once their queue closes.
    pub fn clear(&self) {
        self.peers().clear();
    }
}

impl Broadcaster for PeerRegistry {
    fn broadcast_chain(&self, chain: &[Block]) {
        match encode_chain(chain) {
            Ok(frame) => {
                let reached = self.broadcast(&frame);
                debug!(height = chain.len(), peers = reached, "Chain broadcast");
            }
            Err(e) => warn!(error = %e, "Failed to encode chain"),
        }
    }

    fn broadcast_transaction(&self, tx: &Transaction) {
        match encode_transaction(tx) {
            Ok(frame) => {
                let reached = self.broadcast(&frame);
                debug!(hash = %tx.calculate_hash(), peers = reached, "Transaction broadcast");
            }
            Err(e) => warn!(error = %e, "Failed to encode transaction"),
        }
    }
}

//! Gossip server
//!
//! Accepts inbound peers, dials configured ones, and relays chain snapshots
//! and transactions as newline-delimited JSON.

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::peer::{Direction, PeerId, PeerRegistry};
use super::protocol::{encode_chain, GossipMessage};
use crate::constants::MAX_MESSAGE_SIZE;
use crate::storage::{lock_chain, SharedChain};

/// Gossip errors
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Gossip server is shut down")]
    ShutDown,
}

/// State shared by the accept loop and every connection task
struct GossipContext {
    chain: SharedChain,
    registry: Arc<PeerRegistry>,
    shutdown: watch::Sender<bool>,
}

impl GossipContext {
    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Apply one inbound frame to the local chain
    fn handle_frame(&self, peer: SocketAddr, frame: &str) {
        let frame = frame.trim_end();
        if frame.is_empty() {
            return;
        }

        let message = match GossipMessage::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(%peer, error = %e, "Dropping malformed gossip message");
                return;
            }
        };
        debug!(%peer, kind = message.kind(), "Gossip message received");

        match message {
            // Never rebroadcast an adopted chain
            GossipMessage::Chain(blocks) => {
                let outcome = lock_chain(&self.chain).replace_chain(blocks);
                debug!(%peer, ?outcome, "Chain offer processed");
            }
            GossipMessage::Transaction(tx) => {
                match lock_chain(&self.chain).accept_gossiped_transaction(tx) {
                    Ok(outcome) => debug!(%peer, ?outcome, "Gossiped transaction processed"),
                    Err(e) => warn!(%peer, error = %e, "Rejected gossiped transaction"),
                }
            }
        }
    }
}

/// One node's gossip endpoint
pub struct GossipServer {
    ctx: Arc<GossipContext>,
    local_addr: SocketAddr,
}

impl GossipServer {
    /// Bind the listener and attach the peer registry as the chain's broadcaster.
    ///
    /// Each entry of `peers` is dialed on its own task; failures are logged.
    pub async fn start(
        listen_addr: &str,
        chain: SharedChain,
        peers: &[String],
    ) -> Result<Self, GossipError> {
        let listener = TcpListener::bind(listen_addr).await?;
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(PeerRegistry::new());
        lock_chain(&chain).set_broadcaster(registry.clone());

        let (shutdown, _) = watch::channel(false);
        let ctx = Arc::new(GossipContext {
            chain,
            registry,
            shutdown,
        });

        spawn_accept_loop(ctx.clone(), listener);
        info!(%local_addr, "Listening for P2P connections");

        for peer in peers {
            let ctx = ctx.clone();
            let peer = peer.clone();
            tokio::spawn(async move {
                if let Err(e) = dial(&ctx, &peer).await {
                    warn!(%peer, error = %e, "Connection to peer failed");
                }
            });
        }

        Ok(Self { ctx, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live peer connections
    pub fn active_peers(&self) -> usize {
        self.ctx.registry.active_peers()
    }

    /// Open an outbound connection and sync our chain to it
    pub async fn connect_to(&self, peer: &str) -> Result<PeerId, GossipError> {
        dial(&self.ctx, peer).await
    }

    /// Stop accepting, close every connection and detach all peers
    pub fn shutdown(&self) {
        self.ctx.shutdown.send_replace(true);
        self.ctx.registry.clear();
        info!(local_addr = %self.local_addr, "Gossip server shut down");
    }
}

impl Drop for GossipServer {
    fn drop(&mut self) {
        self.ctx.shutdown.send_replace(true);
        self.ctx.registry.clear();
    }
}

/// Strip an optional `ws://` or `tcp://` scheme and trailing slash
fn peer_target(peer: &str) -> &str {
    let peer = peer.trim();
    let peer = peer
        .strip_prefix("ws://")
        .or_else(|| peer.strip_prefix("tcp://"))
        .unwrap_or(peer);
    peer.trim_end_matches('/')
}

async fn dial(ctx: &Arc<GossipContext>, peer: &str) -> Result<PeerId, GossipError> {
    if ctx.is_shut_down() {
        return Err(GossipError::ShutDown);
    }
    let stream = TcpStream::connect(peer_target(peer)).await?;
    init_connection(ctx, stream, Direction::Outbound)
}

fn spawn_accept_loop(ctx: Arc<GossipContext>, listener: TcpListener) {
    let mut shutdown = ctx.shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        if let Err(e) = init_connection(&ctx, stream, Direction::Inbound) {
                            warn!(error = %e, "Failed to set up inbound peer");
                        }
                    }
                    Err(e) => warn!(error = %e, "Connection error"),
                },
                _ = shutdown.wait_for(|stopped| *stopped) => break,
            }
        }
        debug!("Accept loop stopped");
    });
}

/// Register a connected socket, queue our chain for it and start its tasks
fn init_connection(
    ctx: &Arc<GossipContext>,
    stream: TcpStream,
    direction: Direction,
) -> Result<PeerId, GossipError> {
    let addr = stream.peer_addr()?;
    let (reader, writer) = stream.into_split();
    let (outbound, queue) = mpsc::unbounded_channel();

    if ctx.is_shut_down() {
        return Err(GossipError::ShutDown);
    }
    let id = ctx.registry.register(addr, direction, outbound);
    // shutdown() may have cleared the registry between the check and the insert
    if ctx.is_shut_down() {
        ctx.registry.unregister(id);
        return Err(GossipError::ShutDown);
    }

    // Full-state sync on connect
    let snapshot = {
        let chain = lock_chain(&ctx.chain);
        encode_chain(chain.chain())
    };
    match snapshot {
        Ok(frame) => {
            ctx.registry.send_to(id, frame);
        }
        Err(e) => warn!(error = %e, "Failed to encode chain snapshot"),
    }

    tokio::spawn(write_loop(ctx.clone(), id, writer, queue));
    tokio::spawn(read_loop(ctx.clone(), id, addr, reader));

    info!(peer = %addr, id, ?direction, "Peer connected");
    Ok(id)
}

/// Result of reading one newline-terminated frame
#[derive(Debug, PartialEq, Eq)]
enum FrameRead {
    Frame,
    /// Line exceeded the size cap and was skipped up to its newline
    Oversized,
    Eof,
}

/// Read one frame into `buf`, never buffering more than `MAX_MESSAGE_SIZE + 1` bytes
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<FrameRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_MESSAGE_SIZE as u64 + 1;

    buf.clear();
    if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(FrameRead::Eof);
    }
    if buf.last() == Some(&b'\n') || buf.len() <= MAX_MESSAGE_SIZE {
        return Ok(FrameRead::Frame);
    }

    loop {
        buf.clear();
        if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
            return Ok(FrameRead::Eof);
        }
        if buf.last() == Some(&b'\n') {
            buf.clear();
            return Ok(FrameRead::Oversized);
        }
    }
}

async fn read_loop(ctx: Arc<GossipContext>, id: PeerId, addr: SocketAddr, reader: OwnedReadHalf) {
    let mut shutdown = ctx.shutdown.subscribe();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        tokio::select! {
            read = read_frame(&mut reader, &mut buf) => match read {
                Ok(FrameRead::Frame) => match std::str::from_utf8(&buf) {
                    Ok(frame) => ctx.handle_frame(addr, frame),
                    Err(e) => warn!(peer = %addr, error = %e, "Dropping non UTF-8 gossip message"),
                },
                Ok(FrameRead::Oversized) => {
                    warn!(peer = %addr, limit = MAX_MESSAGE_SIZE, "Dropping oversized gossip message")
                }
                Ok(FrameRead::Eof) => {
                    info!(peer = %addr, id, "Peer disconnected");
                    break;
                }
                Err(e) => {
                    warn!(peer = %addr, id, error = %e, "Peer read failed");
                    break;
                }
            },
            _ = shutdown.wait_for(|stopped| *stopped) => break,
        }
    }
    ctx.registry.unregister(id);
}

async fn write_loop(
    ctx: Arc<GossipContext>,
    id: PeerId,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<String>,
) {
    let mut shutdown = ctx.shutdown.subscribe();

    loop {
        tokio::select! {
            frame = queue.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = write_frame(&mut writer, &frame).await {
                        debug!(id, error = %e, "Peer write failed");
                        break;
                    }
                }
                None => break,
            },
            _ = async { let _ = shutdown.wait_for(|stopped| *stopped).await; } => break,
        }
    }
    ctx.registry.unregister(id);
    let _ = writer.shutdown().await;
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &str) -> std::io::Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_target() {
        assert_eq!(peer_target("127.0.0.1:6001"), "127.0.0.1:6001");
        assert_eq!(peer_target(" ws://localhost:6002/ "), "localhost:6002");
        assert_eq!(peer_target("tcp://10.0.0.1:6003"), "10.0.0.1:6003");
    }

    #[tokio::test]
    async fn test_read_frame_splits_lines() {
        let mut reader: &[u8] = b"{\"a\":1}\n\xff\xfe\npartial";
        let mut buf = Vec::new();

        assert_eq!(read_frame(&mut reader, &mut buf).await.unwrap(), FrameRead::Frame);
        assert_eq!(buf, b"{\"a\":1}\n");
        assert_eq!(read_frame(&mut reader, &mut buf).await.unwrap(), FrameRead::Frame);
        assert!(std::str::from_utf8(&buf).is_err());
        assert_eq!(read_frame(&mut reader, &mut buf).await.unwrap(), FrameRead::Frame);
        assert_eq!(buf, b"partial");
        assert_eq!(read_frame(&mut reader, &mut buf).await.unwrap(), FrameRead::Eof);
    }

    #[tokio::test]
    async fn test_read_frame_caps_line_length() {
        let mut data = vec![b' '; MAX_MESSAGE_SIZE];
        data.push(b'\n');
        data.extend(std::iter::repeat(b'x').take(MAX_MESSAGE_SIZE * 2 + 7));
        data.extend_from_slice(b"\n{}\n");
        let mut reader = data.as_slice();
        let mut buf = Vec::new();

        // Exactly at the cap is still a frame
        assert_eq!(read_frame(&mut reader, &mut buf).await.unwrap(), FrameRead::Frame);
        assert_eq!(buf.len(), MAX_MESSAGE_SIZE + 1);

        assert_eq!(read_frame(&mut reader, &mut buf).await.unwrap(), FrameRead::Oversized);
        assert!(buf.capacity() <= 2 * (MAX_MESSAGE_SIZE + 1));

        assert_eq!(read_frame(&mut reader, &mut buf).await.unwrap(), FrameRead::Frame);
        assert_eq!(buf, b"{}\n");
        assert_eq!(read_frame(&mut reader, &mut buf).await.unwrap(), FrameRead::Eof);
    }

    #[tokio::test]
    async fn test_no_registration_after_shutdown() {
        let chain = crate::storage::Blockchain::default().into_shared();
        let server = GossipServer::start("127.0.0.1:0", chain, &[]).await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();

        server.shutdown();
        let result = init_connection(&server.ctx, stream, Direction::Outbound);

        assert!(matches!(result, Err(GossipError::ShutDown)));
        assert_eq!(server.active_peers(), 0);
    }
}

//! Listener and connection plumbing for worldhost instances.
//!
//! An instance owns one [`Transport`] (its listening socket). Accepting
//! yields an [`Incoming`] peer, which becomes a [`Connection`] once its
//! handshake completes. Both traits deal in raw payloads;
//! message encoding lives in `worldhost-protocol`.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] on `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one accepted connection.
///
/// Ids come from a process-wide counter, so two instances never hand out
/// the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh id.
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A bound listener.
pub trait Transport: Send + Sync + 'static {
    type Incoming: Incoming;

    /// Next client, as soon as the TCP accept completes. The handshake is
    /// left to the caller so a slow peer can't hold up the listener.
    async fn accept(&mut self) -> Result<Self::Incoming, TransportError>;

    /// Where the listener actually ended up (resolves port `0`).
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// An accepted peer whose handshake hasn't run yet.
pub trait Incoming: Send + 'static {
    type Connection: Connection;

    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake. Callers should bound this with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, TransportError>;
}

/// One client connection. Sending and receiving may happen concurrently
/// from different tasks.
pub trait Connection: Send + Sync + 'static {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// `Ok(None)` once the peer has closed the connection.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError>;

    async fn close(&self) -> Result<(), TransportError>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}

//! Transport layer for Jigsync.
//!
//! Provides the [`Transport`], [`Incoming`] and [`Connection`] traits and a
//! WebSocket implementation. The server above only ever sees whole frames
//! as bytes.
//!
//! Accepting is split in two: [`Transport::accept`] only takes the raw
//! socket off the listener, and [`Incoming::upgrade`] runs the protocol
//! handshake. The upgrade belongs in the per-connection task, so a peer
//! that never finishes its handshake holds up nobody else.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A socket taken off the listener, not yet handshaken.
    type Incoming: Incoming;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next raw connection. Does no protocol I/O, so it
    /// returns as soon as the OS hands a socket over.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// An accepted socket whose protocol handshake hasn't run yet.
pub trait Incoming: Send + 'static {
    /// The connection produced by a successful handshake.
    type Connection: Connection;
    /// The error type for the handshake.
    type Error: std::error::Error + Send + Sync;

    /// The remote peer's address.
    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake. May wait on the peer indefinitely; callers
    /// bound it with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive whole frames.
///
/// `send` and `recv` must be usable concurrently from one task (e.g.
/// inside `tokio::select!`), so implementations keep the two directions
/// independent.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_equality() {
        assert_eq!(ConnectionId::new(42), ConnectionId::new(42));
        assert_ne!(ConnectionId::new(42), ConnectionId::new(43));
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}

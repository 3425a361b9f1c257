use std::net::SocketAddr;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listener failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Taking a connection off the listener failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer sent something other than a valid WebSocket upgrade.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    /// The peer didn't finish its handshake in time.
    #[error("handshake with {0} timed out")]
    HandshakeTimedOut(SocketAddr),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

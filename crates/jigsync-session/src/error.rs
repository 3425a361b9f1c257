//! Error types for the session layer.

use jigsync_protocol::ClientId;

/// Errors that can occur during session management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given client.
    #[error("session not found for client {0}")]
    NotFound(ClientId),

    /// The resume token doesn't match any session the server issued.
    #[error("invalid resume token")]
    InvalidToken,

    /// The grace period elapsed before the client came back.
    #[error("session expired for client {0}")]
    SessionExpired(ClientId),

    /// The identity is still bound to a live connection.
    #[error("client {0} already has an active connection")]
    AlreadyConnected(ClientId),
}

//! Unified error type for the Jigsync server.
//!
//! Room and session errors never appear here: they are client-scoped and
//! travel back to the sender as `ServerEvent::Error` frames instead of
//! ending a task.

use jigsync_protocol::ProtocolError;
use jigsync_transport::TransportError;

/// Errors that end a connection task or stop the server from starting.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum JigsyncError {
    /// A transport-level error (bind, accept, handshake, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, malformed frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Invalid server configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed(std::io::Error::other("gone"));
        let err: JigsyncError = err.into();
        assert!(matches!(err, JigsyncError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_handshake_timeout_is_transparent() {
        let peer = "127.0.0.1:4000".parse().unwrap();
        let err: JigsyncError = TransportError::HandshakeTimedOut(peer).into();
        assert_eq!(err.to_string(), "handshake with 127.0.0.1:4000 timed out");
    }

    #[test]
    fn test_from_protocol_error() {
        let err: JigsyncError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, JigsyncError::Protocol(_)));
        assert_eq!(err.to_string(), "invalid message: bad");
    }

    #[test]
    fn test_config_error_message() {
        let err = JigsyncError::Config("JIGSYNC_BIND is empty".into());
        assert_eq!(err.to_string(), "invalid configuration: JIGSYNC_BIND is empty");
    }
}

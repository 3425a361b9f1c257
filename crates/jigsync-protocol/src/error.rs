//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame could not be parsed into a known event.
    ///
    /// Common causes: invalid JSON, an unknown `event` tag, or a payload
    /// missing required fields. The connection stays open; the sender
    /// gets a `malformed_message` error back.
    #[cfg(feature = "json")]
    #[error("malformed message: {0}")]
    Malformed(serde_json::Error),

    /// The frame parsed but violates protocol rules (see
    /// [`ClientEvent::validate`](crate::ClientEvent::validate)).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

//! Codec trait and implementations for turning events into frames.
//!
//! The server never calls `serde_json` directly; it goes through a
//! [`Codec`], so a binary format could replace JSON without touching the
//! router or the connection handler.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task through the server state.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Malformed` if the bytes are not a valid
    /// encoding of `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients speak JSON natively, so this is the only codec the
/// server ships with.
///
/// ```rust
/// use jigsync_protocol::{ClientEvent, Codec, JsonCodec, RoomId};
///
/// let codec = JsonCodec;
/// let bytes = br#"{"event":"join_game","data":{"room_id":"3fa2c4e1b09d"}}"#;
///
/// let event: ClientEvent = codec.decode(bytes).unwrap();
/// assert_eq!(
///     event,
///     ClientEvent::JoinGame { room_id: RoomId::new("3fa2c4e1b09d") }
/// );
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Malformed)
    }
}

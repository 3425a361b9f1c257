//! Core protocol types for Jigsync's wire format.
//!
//! Every frame on the socket is one JSON object, adjacently tagged:
//!
//! ```text
//! { "event": "join_game", "data": { "room_id": "3fa2c4e1b09d" } }
//! { "event": "game_start" }
//! ```
//!
//! Event names are fixed; browser clients match on them directly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Longest `room_id` a client may send. Generated ids are far shorter;
/// anything longer is rejected before it reaches the room registry.
pub const MAX_ROOM_ID_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identity of one logical player.
///
/// Issued by the session layer on first contact and kept for the whole
/// browser session, so a player who reconnects with their resume token
/// keeps the same id. Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// Short token naming a room, e.g. `"3fa2c4e1b09d"`.
///
/// Players share this token out of band to invite each other, which is
/// why it is a string rather than a number. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive a server event.
///
/// The router produces `(Recipient, ServerEvent)` pairs; room-scoped
/// recipients are resolved against the live membership at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// One specific client, typically the sender.
    Client(ClientId),

    /// Every current member of the room.
    Room(RoomId),

    /// Every current member of the room except one client.
    RoomExcept(RoomId, ClientId),

    /// An explicit list of clients. Used when the room no longer exists
    /// (e.g. it was reaped) but its former members still need telling.
    Clients(Vec<ClientId>),
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a client can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Open a new room and join it as the first member.
    CreateGame,

    /// Join an existing room by its token.
    JoinGame { room_id: RoomId },

    /// Signal that this player is ready to start.
    PlayerReady { room_id: RoomId },

    /// Report completion progress (0–100 by default).
    UpdateProgress { room_id: RoomId, progress: f64 },

    /// Re-bind this connection to an identity issued on an earlier
    /// connection. Only valid while the connection is in no room.
    ResumeSession { token: String },
}

impl ClientEvent {
    /// Checks the rules serde can't express: ids and tokens must be
    /// non-empty, and room ids must fit [`MAX_ROOM_ID_LEN`].
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] describing the offending field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::CreateGame => Ok(()),
            Self::JoinGame { room_id }
            | Self::PlayerReady { room_id }
            | Self::UpdateProgress { room_id, .. } => {
                let len = room_id.as_str().len();
                if len == 0 {
                    Err(ProtocolError::InvalidMessage("room_id must not be empty".into()))
                } else if len > MAX_ROOM_ID_LEN {
                    Err(ProtocolError::InvalidMessage(format!(
                        "room_id is {len} bytes, limit is {MAX_ROOM_ID_LEN}"
                    )))
                } else {
                    Ok(())
                }
            }
            Self::ResumeSession { token } if token.is_empty() => {
                Err(ProtocolError::InvalidMessage("token must not be empty".into()))
            }
            Self::ResumeSession { .. } => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Machine-readable error kinds carried by [`ServerEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RoomNotFound,
    RoomAlreadyStarted,
    NotAMember,
    InvalidProgress,
    MalformedMessage,
    InvalidSession,
    SessionExpired,
    SessionInUse,
}

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once per connection, before anything else: the identity this
    /// connection speaks for and the token that can resume it later.
    SessionStarted { client_id: ClientId, token: String },

    /// The connection now speaks for a resumed identity.
    SessionResumed { client_id: ClientId },

    /// To the creator only: the new room's token.
    GameCreated { room_id: RoomId },

    /// To the whole room: someone joined.
    PlayerJoined { player_count: usize },

    /// To the sender only: the join was rejected.
    JoinError { message: String },

    /// To the whole room: every member is ready, the game begins.
    GameStart,

    /// A member reported progress.
    ProgressUpdate { player_id: ClientId, progress: f64 },

    /// To the remaining members: someone left.
    PlayerLeft { player_count: usize },

    /// To former members: the room was closed for inactivity.
    RoomClosed { room_id: RoomId },

    /// To the sender only: the request failed.
    Error { code: ErrorCode, message: String },
}

// =========================================================================
// Tests
// =========================================================================

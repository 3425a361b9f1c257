//! Error types for the room layer.

use jigsync_protocol::{ClientId, RoomId};

/// Errors that can occur during room operations.
///
/// All of them are scoped to the client that made the request; none of
/// them leave the registry in a partially updated state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    /// No live room has this id (never existed, or already destroyed).
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The room has started and no longer accepts members.
    #[error("room {0} has already started")]
    RoomAlreadyStarted(RoomId),

    /// The client is not a member of the named room.
    #[error("client {0} is not a member of room {1}")]
    NotAMember(ClientId, RoomId),

    /// The reported progress is non-finite or outside `0..=max`.
    #[error("progress {value} is outside 0..={max}")]
    InvalidProgress { value: f64, max: f64 },
}

//! Session types: the server's record of one client identity.

use std::time::Instant;

use jigsync_protocol::ClientId;

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a disconnected client may resume its
    /// identity. 0 disables resuming entirely.
    pub resume_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resume_grace_secs: 300,
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Bound to a live connection.
    Connected,

    /// The connection dropped at `since`; resumable until the grace
    /// period runs out.
    Disconnected { since: Instant },

    /// Grace period elapsed; waiting for cleanup.
    Expired,
}

/// One client identity.
#[derive(Debug, Clone)]
pub struct Session {
    /// The identity this session stands for.
    pub client_id: ClientId,

    pub state: SessionState,

    /// Secret handed to the client in `session_started`. A 32-character
    /// hex string (128 bits).
    pub resume_token: String,
}

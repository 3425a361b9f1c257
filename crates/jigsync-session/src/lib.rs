//! Client identity for Jigsync.
//!
//! Every connection speaks for one [`ClientId`](jigsync_protocol::ClientId).
//! The id belongs to the player, not the socket: a browser that drops its
//! connection can come back within the grace period, present its resume
//! token, and continue as the same client.
//!
//! ```text
//! open() ──→ [Connected] ──disconnect()──→ [Disconnected] ──grace elapsed──→ [Expired]
//!                 ↑                              │                               │
//!                 └───────────resume()───────────┘                    cleanup_expired()
//! ```
//!
//! There is no authentication here; holding the token is the only proof.

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};

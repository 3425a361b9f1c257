//! # Jigsync
//!
//! Room coordination server for cooperative puzzle games.
//!
//! Players connect over WebSocket, create or join a room, mark themselves
//! ready, and stream their puzzle progress to each other. The server keeps
//! nothing but membership, readiness, and the latest progress per player;
//! all of it lives in memory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jigsync::prelude::*;
//!
//! # async fn start() -> Result<(), JigsyncError> {
//! let server = JigsyncServerBuilder::from_config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod router;
mod server;

pub use config::ServerConfig;
pub use error::JigsyncError;
pub use router::{departure_notice, error_code, route, EventRouter, Outbox};
pub use server::{JigsyncServer, JigsyncServerBuilder};

/// Everything needed to configure and run a server, plus the wire types.
pub mod prelude {
    pub use crate::{EventRouter, JigsyncError, JigsyncServer, JigsyncServerBuilder, ServerConfig};
    pub use jigsync_protocol::{
        ClientEvent, ClientId, Codec, ErrorCode, JsonCodec, Recipient, RoomId, ServerEvent,
        MAX_ROOM_ID_LEN,
    };
    pub use jigsync_room::{RoomConfig, RoomError, RoomPhase, RoomRegistry};
    pub use jigsync_session::{SessionConfig, SessionError};
}

//! Wire protocol for Jigsync.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identifiers** ([`ClientId`], [`RoomId`]) that appear in payloads.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`ErrorCode`]), the
//!   tagged JSON frames exchanged over the socket.
//! - **Routing** ([`Recipient`]): who a server event is addressed to.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): events to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Router → Room registry
//! ```
//!
//! The protocol layer knows nothing about connections or room state.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientEvent, ClientId, ErrorCode, Recipient, RoomId, ServerEvent, MAX_ROOM_ID_LEN};

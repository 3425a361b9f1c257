//! Room lifecycle management for Jigsync.
//!
//! A room is one cooperative puzzle session: players join, mark
//! themselves ready, and report progress until everyone has left.
//!
//! Everything here is synchronous and in-memory. The caller (the server's
//! event router) serializes access by holding one lock around the whole
//! [`RoomRegistry`] for the duration of each operation.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates/destroys rooms, tracks which client is where
//! - [`Room`]: membership, readiness, and progress for one session
//! - [`RoomPhase`]: the `Open → Started` state machine
//! - [`RoomConfig`]: start threshold, progress bounds, idle reaping

mod config;
mod error;
mod registry;
mod room;

pub use config::{RoomConfig, RoomPhase};
pub use error::RoomError;
pub use registry::{Departure, JoinOutcome, ProgressBroadcast, ReapedRoom, RoomRegistry};
pub use room::{Member, Room, StartDecision};

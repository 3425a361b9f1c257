//! Room registry: creates, tracks, and destroys rooms.

use std::collections::HashMap;
use std::time::Instant;

use jigsync_protocol::{ClientId, RoomId};
use rand::Rng;

use crate::{Room, RoomConfig, RoomError, StartDecision};

/// Successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Members in the joined room after this call.
    pub member_count: usize,

    /// Set when the client was moved out of a different room to join
    /// this one.
    pub previous: Option<Departure>,
}

/// What happened to a room when a client left it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// Others remain; they should hear the new count.
    Left { room_id: RoomId, member_count: usize },

    /// The client was the last member and the room is gone.
    Destroyed { room_id: RoomId },
}

impl Departure {
    /// The room the client left.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::Left { room_id, .. } | Self::Destroyed { room_id } => room_id,
        }
    }
}

/// Payload for a progress broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBroadcast {
    pub client_id: ClientId,
    pub progress: f64,
}

/// A room evicted by [`RoomRegistry::reap_idle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapedRoom {
    pub room_id: RoomId,
    /// Members at the moment of eviction. They are no longer in any room.
    pub members: Vec<ClientId>,
}

/// Owns every live room and knows which client is in which.
///
/// Not thread-safe on its own. The server keeps it behind a single lock
/// so each operation runs to completion before the next one starts.
pub struct RoomRegistry {
    /// Live rooms, keyed by id.
    rooms: HashMap<RoomId, Room>,

    /// Maps each client to the room it is in. A client is in at most one
    /// room; this is kept in lock-step with the rooms' member maps.
    client_rooms: HashMap<ClientId, RoomId>,

    config: RoomConfig,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            client_rooms: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates an empty, open room and returns its id.
    pub fn create_room(&mut self) -> RoomId {
        let room_id = loop {
            let candidate = generate_room_id(self.config.id_bytes);
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
            tracing::warn!(room_id = %candidate, "room id collision, regenerating");
        };

        let room = Room::new(
            room_id.clone(),
            self.config.start_threshold(),
            self.config.max_progress,
        );
        self.rooms.insert(room_id.clone(), room);
        tracing::info!(%room_id, "room created");
        room_id
    }

    /// Adds a client to a room.
    ///
    /// Joining the room you are already in is idempotent. Joining a
    /// different room first removes you from the old one.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`] if no such room is live
    /// - [`RoomError::RoomAlreadyStarted`] if the room has started
    pub fn join_room(
        &mut self,
        room_id: &RoomId,
        client_id: ClientId,
    ) -> Result<JoinOutcome, RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        if !room.phase().is_joinable() {
            return Err(RoomError::RoomAlreadyStarted(room_id.clone()));
        }

        // Checked above, so leaving the old room can't strand the client.
        let moving = self
            .client_rooms
            .get(&client_id)
            .is_some_and(|current| current != room_id);
        let previous = if moving { self.remove_client(client_id) } else { None };

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        let member_count = room.join(client_id)?;
        self.client_rooms.insert(client_id, room_id.clone());

        tracing::info!(%room_id, %client_id, player_count = member_count, "player joined");
        Ok(JoinOutcome { member_count, previous })
    }

    /// Marks a member ready.
    ///
    /// Returns [`StartDecision::StartGame`] exactly once per room: on the
    /// call that makes every member ready with enough members present.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`] if no such room is live
    /// - [`RoomError::NotAMember`] if the client is not in the room
    pub fn mark_ready(
        &mut self,
        room_id: &RoomId,
        client_id: ClientId,
    ) -> Result<StartDecision, RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        let decision = room.mark_ready(client_id)?;
        match decision {
            StartDecision::StartGame => tracing::info!(
                %room_id,
                player_count = room.member_count(),
                "game started"
            ),
            StartDecision::NoAction => tracing::debug!(%room_id, %client_id, "player ready"),
        }
        Ok(decision)
    }

    /// Records a member's progress.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`] if no such room is live
    /// - [`RoomError::NotAMember`] if the client is not in the room
    /// - [`RoomError::InvalidProgress`] if the value is out of range
    pub fn update_progress(
        &mut self,
        room_id: &RoomId,
        client_id: ClientId,
        progress: f64,
    ) -> Result<ProgressBroadcast, RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        room.update_progress(client_id, progress)?;
        tracing::trace!(%room_id, %client_id, progress, "progress updated");
        Ok(ProgressBroadcast { client_id, progress })
    }

    /// Removes a client from whatever room it is in.
    ///
    /// Returns `None` if the client was in no room. The last member
    /// leaving destroys the room.
    pub fn remove_client(&mut self, client_id: ClientId) -> Option<Departure> {
        let room_id = self.client_rooms.remove(&client_id)?;
        let room = self.rooms.get_mut(&room_id)?;
        room.remove(&client_id);

        if room.is_empty() {
            self.rooms.remove(&room_id);
            tracing::info!(%room_id, %client_id, "last player left, room destroyed");
            return Some(Departure::Destroyed { room_id });
        }

        let member_count = room.member_count();
        tracing::info!(%room_id, %client_id, player_count = member_count, "player left");
        Some(Departure::Left { room_id, member_count })
    }

    /// Evicts rooms idle for longer than the configured TTL, as seen at
    /// `now`. A no-op when reaping is disabled.
    pub fn reap_idle(&mut self, now: Instant) -> Vec<ReapedRoom> {
        let Some(ttl) = self.config.idle_ttl else {
            return Vec::new();
        };

        let stale: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|room| now.saturating_duration_since(room.last_activity()) > ttl)
            .map(|room| room.id().clone())
            .collect();

        let mut reaped = Vec::with_capacity(stale.len());
        for room_id in stale {
            if let Some(room) = self.rooms.remove(&room_id) {
                let members = room.member_ids();
                for member in &members {
                    self.client_rooms.remove(member);
                }
                tracing::info!(%room_id, players = members.len(), "idle room reaped");
                reaped.push(ReapedRoom { room_id, members });
            }
        }
        reaped
    }

    /// Looks up a live room.
    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Current members of a room; empty if the room is gone.
    pub fn members(&self, room_id: &RoomId) -> Vec<ClientId> {
        self.rooms
            .get(room_id)
            .map(Room::member_ids)
            .unwrap_or_default()
    }

    /// The room a client is currently in, if any.
    pub fn client_room(&self, client_id: &ClientId) -> Option<&RoomId> {
        self.client_rooms.get(client_id)
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

/// Random lowercase-hex room token, two characters per byte.
fn generate_room_id(bytes: usize) -> RoomId {
    let mut rng = rand::rng();
    let token: String = (0..bytes.max(1))
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect();
    RoomId::new(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_room_id_is_hex_of_expected_length() {
        let id = generate_room_id(6);
        assert_eq!(id.as_str().len(), 12);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_create_room_ids_are_unique() {
        let mut registry = RoomRegistry::default();
        let ids: std::collections::HashSet<RoomId> =
            (0..500).map(|_| registry.create_room()).collect();
        assert_eq!(ids.len(), 500);
        assert_eq!(registry.room_count(), 500);
    }

    #[test]
    fn test_index_follows_membership() {
        let mut registry = RoomRegistry::default();
        let room = registry.create_room();
        registry.join_room(&room, ClientId(1)).unwrap();
        assert_eq!(registry.client_room(&ClientId(1)), Some(&room));

        registry.remove_client(ClientId(1));
        assert_eq!(registry.client_room(&ClientId(1)), None);
    }

    #[test]
    fn test_failed_join_leaves_previous_room_intact() {
        let mut registry = RoomRegistry::default();
        let home = registry.create_room();
        registry.join_room(&home, ClientId(1)).unwrap();

        let missing = RoomId::new("nope");
        assert!(registry.join_room(&missing, ClientId(1)).is_err());
        assert_eq!(registry.client_room(&ClientId(1)), Some(&home));
        assert_eq!(registry.room(&home).unwrap().member_count(), 1);
    }
}

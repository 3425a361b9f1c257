//! A single room: membership, readiness, and progress.
//!
//! Mutation is `pub(crate)`; only the registry changes a room, so the
//! registry's client index can never drift from the member maps.

use std::collections::HashMap;
use std::time::Instant;

use jigsync_protocol::{ClientId, RoomId};

use crate::{RoomError, RoomPhase};

/// One client's participation record in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    ready: bool,
    progress: f64,
}

impl Member {
    fn new() -> Self {
        Self { ready: false, progress: 0.0 }
    }

    /// Whether this member has signalled readiness.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The last progress value this member reported.
    pub fn progress(&self) -> f64 {
        self.progress
    }
}

/// Result of marking a member ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// This call moved the room to `Started`; tell every member.
    StartGame,
    /// Nothing to broadcast.
    NoAction,
}

/// State for one multiplayer session.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    phase: RoomPhase,
    members: HashMap<ClientId, Member>,
    start_threshold: usize,
    max_progress: f64,
    last_activity: Instant,
}

impl Room {
    pub(crate) fn new(id: RoomId, start_threshold: usize, max_progress: f64) -> Self {
        Self {
            id,
            phase: RoomPhase::Open,
            members: HashMap::new(),
            start_threshold,
            max_progress,
            last_activity: Instant::now(),
        }
    }

    /// The room's token.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Returns `true` once the game has begun.
    pub fn is_started(&self) -> bool {
        self.phase == RoomPhase::Started
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.members.contains_key(client_id)
    }

    /// Looks up one member's record.
    pub fn member(&self, client_id: &ClientId) -> Option<&Member> {
        self.members.get(client_id)
    }

    /// Ids of all current members, in ascending order.
    pub fn member_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.members.keys().copied().collect();
        ids.sort();
        ids
    }

    /// When the room last saw a successful operation.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Adds a member. Re-joining as an existing member is a no-op that
    /// still reports the current count.
    pub(crate) fn join(&mut self, client_id: ClientId) -> Result<usize, RoomError> {
        if !self.phase.is_joinable() {
            return Err(RoomError::RoomAlreadyStarted(self.id.clone()));
        }
        self.members.entry(client_id).or_insert_with(Member::new);
        self.touch();
        Ok(self.members.len())
    }

    /// Marks a member ready and fires the start transition if this was the
    /// last member the room was waiting on.
    pub(crate) fn mark_ready(&mut self, client_id: ClientId) -> Result<StartDecision, RoomError> {
        let member = self
            .members
            .get_mut(&client_id)
            .ok_or_else(|| RoomError::NotAMember(client_id, self.id.clone()))?;
        member.ready = true;
        self.touch();

        if self.phase.can_transition_to(RoomPhase::Started) && self.start_condition_met() {
            self.phase = RoomPhase::Started;
            return Ok(StartDecision::StartGame);
        }
        Ok(StartDecision::NoAction)
    }

    /// Stores a member's progress.
    pub(crate) fn update_progress(
        &mut self,
        client_id: ClientId,
        progress: f64,
    ) -> Result<(), RoomError> {
        if !progress.is_finite() || !(0.0..=self.max_progress).contains(&progress) {
            return Err(RoomError::InvalidProgress { value: progress, max: self.max_progress });
        }
        let member = self
            .members
            .get_mut(&client_id)
            .ok_or_else(|| RoomError::NotAMember(client_id, self.id.clone()))?;
        member.progress = progress;
        self.touch();
        Ok(())
    }

    /// Removes a member. Returns `false` if they were not in the room.
    pub(crate) fn remove(&mut self, client_id: &ClientId) -> bool {
        let removed = self.members.remove(client_id).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    fn start_condition_met(&self) -> bool {
        self.members.len() >= self.start_threshold && self.members.values().all(Member::is_ready)
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new(RoomId::new("r1"), 2, 100.0)
    }

    fn cid(id: u64) -> ClientId {
        ClientId(id)
    }

    #[test]
    fn test_join_new_member_starts_not_ready_at_zero() {
        let mut room = room();
        assert_eq!(room.join(cid(1)).unwrap(), 1);

        let member = room.member(&cid(1)).unwrap();
        assert!(!member.is_ready());
        assert_eq!(member.progress(), 0.0);
    }

    #[test]
    fn test_join_twice_does_not_double_count() {
        let mut room = room();
        room.join(cid(1)).unwrap();
        assert_eq!(room.join(cid(1)).unwrap(), 1);
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn test_rejoin_keeps_ready_flag() {
        let mut room = room();
        room.join(cid(1)).unwrap();
        room.mark_ready(cid(1)).unwrap();
        room.join(cid(1)).unwrap();
        assert!(room.member(&cid(1)).unwrap().is_ready());
    }

    #[test]
    fn test_mark_ready_single_member_never_starts() {
        let mut room = room();
        room.join(cid(1)).unwrap();
        assert_eq!(room.mark_ready(cid(1)).unwrap(), StartDecision::NoAction);
        assert_eq!(room.phase(), RoomPhase::Open);
    }

    #[test]
    fn test_mark_ready_last_member_starts_once() {
        let mut room = room();
        room.join(cid(1)).unwrap();
        room.join(cid(2)).unwrap();

        assert_eq!(room.mark_ready(cid(1)).unwrap(), StartDecision::NoAction);
        assert_eq!(room.mark_ready(cid(2)).unwrap(), StartDecision::StartGame);
        assert!(room.is_started());

        // Repeating ready after the start fires nothing new.
        assert_eq!(room.mark_ready(cid(2)).unwrap(), StartDecision::NoAction);
        assert_eq!(room.mark_ready(cid(1)).unwrap(), StartDecision::NoAction);
    }

    #[test]
    fn test_mark_ready_non_member_errors() {
        let mut room = room();
        let err = room.mark_ready(cid(9)).unwrap_err();
        assert_eq!(err, RoomError::NotAMember(cid(9), RoomId::new("r1")));
    }

    #[test]
    fn test_join_after_start_fails() {
        let mut room = room();
        room.join(cid(1)).unwrap();
        room.join(cid(2)).unwrap();
        room.mark_ready(cid(1)).unwrap();
        room.mark_ready(cid(2)).unwrap();

        assert_eq!(
            room.join(cid(3)).unwrap_err(),
            RoomError::RoomAlreadyStarted(RoomId::new("r1"))
        );
        // Existing members cannot "re-join" a started room either.
        assert!(room.join(cid(1)).is_err());
    }

    #[test]
    fn test_leaver_can_unblock_start_on_next_ready() {
        let mut room = room();
        room.join(cid(1)).unwrap();
        room.join(cid(2)).unwrap();
        room.join(cid(3)).unwrap();
        room.mark_ready(cid(1)).unwrap();
        room.mark_ready(cid(2)).unwrap();

        // The unready member leaves; the transition waits for the next ready.
        assert!(room.remove(&cid(3)));
        assert_eq!(room.phase(), RoomPhase::Open);
        assert_eq!(room.mark_ready(cid(1)).unwrap(), StartDecision::StartGame);
    }

    #[test]
    fn test_update_progress_stores_value() {
        let mut room = room();
        room.join(cid(1)).unwrap();
        room.update_progress(cid(1), 42.5).unwrap();
        assert_eq!(room.member(&cid(1)).unwrap().progress(), 42.5);
    }

    #[test]
    fn test_update_progress_rejects_out_of_range() {
        let mut room = room();
        room.join(cid(1)).unwrap();

        for bad in [-1.0, 100.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                room.update_progress(cid(1), bad),
                Err(RoomError::InvalidProgress { .. })
            ));
        }
        assert_eq!(room.member(&cid(1)).unwrap().progress(), 0.0);
    }

    #[test]
    fn test_update_progress_bounds_are_inclusive() {
        let mut room = room();
        room.join(cid(1)).unwrap();
        room.update_progress(cid(1), 0.0).unwrap();
        room.update_progress(cid(1), 100.0).unwrap();
    }

    #[test]
    fn test_remove_unknown_member_returns_false() {
        let mut room = room();
        assert!(!room.remove(&cid(1)));
    }

    #[test]
    fn test_member_ids_sorted() {
        let mut room = room();
        room.join(cid(3)).unwrap();
        room.join(cid(1)).unwrap();
        room.join(cid(2)).unwrap();
        assert_eq!(room.member_ids(), vec![cid(1), cid(2), cid(3)]);
    }
}

//! Room configuration and state machine.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room in a registry.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Members required before a fully-ready room starts. Values below 2
    /// are treated as 2: a cooperative game needs a partner.
    pub min_players: usize,

    /// Upper bound accepted for reported progress.
    pub max_progress: f64,

    /// Rooms with no successful operation for this long are evicted by
    /// [`RoomRegistry::reap_idle`](crate::RoomRegistry::reap_idle).
    /// `None` disables reaping.
    pub idle_ttl: Option<Duration>,

    /// Random bytes per generated room id. Each byte becomes two hex chars.
    pub id_bytes: usize,
}

impl RoomConfig {
    /// The effective start threshold.
    pub fn start_threshold(&self) -> usize {
        self.min_players.max(2)
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_progress: 100.0,
            idle_ttl: None,
            // 48 bits keeps collisions negligible at any realistic room count.
            id_bytes: 6,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// ```text
/// Open ──(all ready, count ≥ threshold)──→ Started
/// ```
///
/// - **Open**: accepting joins; members toggle ready.
/// - **Started**: terminal. No more joins; progress updates continue.
///
/// A room leaves the model entirely when its last member leaves, from
/// either phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Open,
    Started,
}

impl RoomPhase {
    /// Returns `true` if the room is accepting new members.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!((self, target), (Self::Open, Self::Started))
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Started => write!(f, "Started"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_phase_only_open_to_started() {
        assert!(RoomPhase::Open.can_transition_to(RoomPhase::Started));
        assert!(!RoomPhase::Started.can_transition_to(RoomPhase::Open));
        assert!(!RoomPhase::Started.can_transition_to(RoomPhase::Started));
        assert!(!RoomPhase::Open.can_transition_to(RoomPhase::Open));
    }

    #[test]
    fn test_room_phase_is_joinable() {
        assert!(RoomPhase::Open.is_joinable());
        assert!(!RoomPhase::Started.is_joinable());
    }

    #[test]
    fn test_room_phase_display() {
        assert_eq!(RoomPhase::Open.to_string(), "Open");
        assert_eq!(RoomPhase::Started.to_string(), "Started");
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_progress, 100.0);
        assert!(config.idle_ttl.is_none());
        assert!(config.id_bytes * 8 >= 48);
    }

    #[test]
    fn test_start_threshold_never_below_two() {
        let config = RoomConfig { min_players: 1, ..RoomConfig::default() };
        assert_eq!(config.start_threshold(), 2);

        let config = RoomConfig { min_players: 4, ..RoomConfig::default() };
        assert_eq!(config.start_threshold(), 4);
    }
}

//! Room configuration and phase machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use snakebattle_sim::SimConfig;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room in a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Rules for the game each room runs.
    pub sim: SimConfig,

    /// Longest room name kept, in characters. Longer names are cut.
    pub max_name_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            max_name_len: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// ```text
/// Waiting ──(both ready)──▶ InProgress ──(game over)──▶ Over
///    ▲                          │                         │
///    └──────── guest leaves ────┴─────────────────────────┘
/// ```
///
/// - **Waiting**: the host is in; a guest may join and both sides signal
///   ready. Single-player rooms never sit here.
/// - **InProgress**: the tick driver steps the game every tick.
/// - **Over**: the game has a result. Nothing steps any more; a new match
///   needs a new guest (which resets the room) or a new room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Waiting,
    InProgress,
    Over,
}

impl RoomPhase {
    /// Returns `true` if the room could take a guest, slot permitting.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while the game is being stepped.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Returns `true` once a match has started in this room, including a
    /// finished one.
    pub fn has_started(&self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Over => write!(f, "Over"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_phase_is_joinable() {
        assert!(RoomPhase::Waiting.is_joinable());
        assert!(!RoomPhase::InProgress.is_joinable());
        assert!(!RoomPhase::Over.is_joinable());
    }

    #[test]
    fn test_room_phase_is_active() {
        assert!(!RoomPhase::Waiting.is_active());
        assert!(RoomPhase::InProgress.is_active());
        assert!(!RoomPhase::Over.is_active());
    }

    #[test]
    fn test_room_phase_has_started() {
        assert!(!RoomPhase::Waiting.has_started());
        assert!(RoomPhase::InProgress.has_started());
        assert!(RoomPhase::Over.has_started());
    }

    #[test]
    fn test_room_phase_display() {
        assert_eq!(RoomPhase::Waiting.to_string(), "Waiting");
        assert_eq!(RoomPhase::InProgress.to_string(), "InProgress");
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.max_name_len, 32);
        assert_eq!(config.sim, SimConfig::default());
    }
}

//! Simulation tuning constants.

use serde::{Deserialize, Serialize};

use crate::{Direction, Position};

/// Rules and constants for one game of Snake Battle.
///
/// The defaults reproduce the networked game: a 25×25 board, snakes of
/// length 3, five projectile charges, and a 30-tick stun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Width and height of the square board, in cells.
    pub board_size: i32,

    /// Body length of a freshly spawned snake.
    pub initial_length: usize,

    /// Maximum (and starting) projectile charge per side.
    pub max_charge: u32,

    /// Ticks a side stays immobile after being hit.
    pub stun_ticks: u32,

    /// How many chat lines a room keeps.
    pub chat_capacity: usize,

    /// Longest chat line accepted, in characters. Longer lines are cut.
    pub max_chat_len: usize,

    /// When `true`, a head that enters the opposing body eliminates its
    /// side, and a head-on collision eliminates both.
    pub opponent_collision: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            board_size: 25,
            initial_length: 3,
            max_charge: 5,
            stun_ticks: 30,
            chat_capacity: 5,
            max_chat_len: 200,
            opponent_collision: false,
        }
    }
}

/// Where each side spawns and which way it faces.
pub(crate) const SPAWNS: [(Position, Direction); 2] = [
    (Position::new(5, 5), Direction::Right),
    (Position::new(20, 20), Direction::Left),
];

/// Initial food position.
pub(crate) const FOOD_SPAWN: Position = Position::new(10, 10);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_game_rules() {
        let config = SimConfig::default();
        assert_eq!(config.board_size, 25);
        assert_eq!(config.initial_length, 3);
        assert_eq!(config.max_charge, 5);
        assert_eq!(config.stun_ticks, 30);
        assert_eq!(config.chat_capacity, 5);
        assert!(!config.opponent_collision);
    }
}

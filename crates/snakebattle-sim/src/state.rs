//! The authoritative game state for one room.
//!
//! [`GameState`] is both the thing the simulation mutates every tick and
//! the snapshot that gets serialized to clients, so every public field is
//! part of the wire format.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{FOOD_SPAWN, SPAWNS};
use crate::{Direction, Position, Side, SimConfig};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Input a side has queued for the next tick.
///
/// Several commands may arrive between two ticks. They merge: the latest
/// direction wins and a shot request stays set until the tick consumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideInput {
    pub direction: Option<Direction>,
    pub shoot: bool,
}

impl SideInput {
    fn merge(&mut self, newer: SideInput) {
        if newer.direction.is_some() {
            self.direction = newer.direction;
        }
        self.shoot |= newer.shoot;
    }
}

// ---------------------------------------------------------------------------
// Snake
// ---------------------------------------------------------------------------

/// One side's snake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snake {
    /// Body cells, head first.
    pub body: VecDeque<Position>,
    pub direction: Direction,
    pub score: u32,
    /// Ticks left before the snake may move again.
    pub stunned: u32,
    /// Remaining projectile charge, `0..=max_charge`.
    pub charge: u32,
    pub alive: bool,
    #[serde(skip)]
    pub(crate) pending: SideInput,
}

impl Snake {
    /// Spawns a straight snake whose tail trails behind `head`.
    pub fn spawn(head: Position, direction: Direction, config: &SimConfig) -> Self {
        let behind = direction.opposite();
        let mut body = VecDeque::with_capacity(config.initial_length + 8);
        let mut cell = head;
        for _ in 0..config.initial_length {
            body.push_back(cell);
            cell = cell.step(behind);
        }
        Self {
            body,
            direction,
            score: 0,
            stunned: 0,
            charge: config.max_charge,
            alive: true,
            pending: SideInput::default(),
        }
    }

    /// The head cell. A snake always has at least one segment.
    pub fn head(&self) -> Position {
        self.body[0]
    }

    /// Returns `true` if `cell` is under any segment of this snake.
    pub fn occupies(&self, cell: Position) -> bool {
        self.body.contains(&cell)
    }

    /// Returns `true` if the head overlaps one of the trailing segments.
    pub fn bites_itself(&self) -> bool {
        let head = self.head();
        self.body.iter().skip(1).any(|segment| *segment == head)
    }

    /// Input queued for the next tick.
    pub fn pending_input(&self) -> SideInput {
        self.pending
    }
}

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

/// A shot in flight. Moves one cell per tick along `velocity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    pub position: Position,
    pub velocity: Direction,
    pub owner: Side,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a finished game ended.
///
/// On the wire this is the winner label clients display, e.g. `"Player 1"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Outcome {
    /// Two-player game with a surviving side.
    Winner(Side),
    /// Two-player game where both sides were eliminated in the same tick.
    Draw,
    /// Single-player game whose only snake was eliminated.
    GameOver,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Winner(Side::One) => "Player 1",
            Self::Winner(Side::Two) => "Player 2",
            Self::Draw => "Draw",
            Self::GameOver => "Game Over!",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.label().to_string()
    }
}

impl TryFrom<String> for Outcome {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        match label.as_str() {
            "Player 1" => Ok(Self::Winner(Side::One)),
            "Player 2" => Ok(Self::Winner(Side::Two)),
            "Draw" => Ok(Self::Draw),
            "Game Over!" => Ok(Self::GameOver),
            other => Err(format!("unknown outcome label: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Full simulation state of one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// One snake in single-player, two otherwise. Index 0 is the host.
    pub snakes: Vec<Snake>,
    pub food: Position,
    pub projectiles: Vec<Projectile>,
    pub game_over: bool,
    pub winner: Option<Outcome>,
    /// Most recent chat lines, oldest first.
    pub chat_messages: VecDeque<String>,
    /// Number of steps simulated so far.
    pub tick: u64,
}

impl GameState {
    /// Creates the starting position for a new game.
    pub fn new(config: &SimConfig, single_player: bool) -> Self {
        let sides = if single_player { 1 } else { 2 };
        let snakes = SPAWNS
            .iter()
            .take(sides)
            .map(|(head, direction)| Snake::spawn(*head, *direction, config))
            .collect();
        Self {
            snakes,
            food: FOOD_SPAWN,
            projectiles: Vec::new(),
            game_over: false,
            winner: None,
            chat_messages: VecDeque::with_capacity(config.chat_capacity),
            tick: 0,
        }
    }

    pub fn is_single_player(&self) -> bool {
        self.snakes.len() == 1
    }

    pub fn snake(&self, side: Side) -> Option<&Snake> {
        self.snakes.get(side.index())
    }

    pub fn snake_mut(&mut self, side: Side) -> Option<&mut Snake> {
        self.snakes.get_mut(side.index())
    }

    /// Queues input for `side`; it takes effect on the next step.
    ///
    /// Input for a side that doesn't exist (side two in single-player) is
    /// dropped.
    pub fn queue_input(&mut self, side: Side, input: SideInput) {
        if let Some(snake) = self.snake_mut(side) {
            snake.pending.merge(input);
        }
    }

    /// Appends a chat line attributed to `side`, evicting the oldest line
    /// once the log is at capacity.
    pub fn push_chat(&mut self, side: Side, text: &str, config: &SimConfig) {
        if config.chat_capacity == 0 {
            return;
        }
        let text: String = text.chars().take(config.max_chat_len).collect();
        while self.chat_messages.len() >= config.chat_capacity {
            self.chat_messages.pop_front();
        }
        self.chat_messages.push_back(format!("{side}: {text}"));
    }

    /// Discards all pending input, e.g. when a player leaves.
    pub fn clear_input(&mut self, side: Side) {
        if let Some(snake) = self.snake_mut(side) {
            snake.pending = SideInput::default();
        }
    }

    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.game_over = true;
        self.winner = Some(outcome);
    }
}

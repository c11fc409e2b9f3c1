//! Core protocol types for Snake Battle's wire format.
//!
//! Every type in this module travels on the wire: clients send
//! [`ClientCommand`]s, the server answers with [`ServerMessage`]s. Both are
//! JSON objects tagged by a `"command"` field, e.g.
//!
//! ```json
//! { "command": "join_room", "room_id": 4821 }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use snakebattle_sim::{Direction, GameState};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A process-unique identifier for a connected player.
///
/// Assigned from a monotonic counter when the connection is accepted and
/// sent to the client straight away in [`ServerMessage::Identity`].
/// `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A room identifier, unique among currently live rooms.
///
/// Room ids are drawn at random from a small numeric range so players can
/// read them out to each other; they are reused after a room is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Room listing
// ---------------------------------------------------------------------------

/// One entry of a [`ServerMessage::RoomList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    /// Occupied slots, 1 or 2.
    pub player_count: usize,
    pub in_game: bool,
    pub single_player: bool,
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// HTTP-style codes carried by [`ServerMessage::Error`].
pub mod error_code {
    /// The command is not valid in the sender's current state.
    pub const BAD_REQUEST: u16 = 400;
    /// The referenced room doesn't exist.
    pub const NOT_FOUND: u16 = 404;
    /// The room is full or already in progress, or the sender is already
    /// in a room.
    pub const CONFLICT: u16 = 409;
    /// The server failed to carry out a valid request (e.g. saving).
    pub const INTERNAL: u16 = 500;
    /// Too many rooms are live to allocate another id.
    pub const UNAVAILABLE: u16 = 503;
}

// ---------------------------------------------------------------------------
// ClientCommand: client → server
// ---------------------------------------------------------------------------

/// A command sent by a client.
///
/// `#[serde(tag = "command")]` makes this an internally tagged enum, so
/// the variant name sits next to the payload fields instead of wrapping
/// them. Any tag this server doesn't know decodes to
/// [`ClientCommand::Unknown`] thanks to `#[serde(other)]`; the handler
/// skips those rather than dropping the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Open a new room with the sender as host.
    CreateRoom {
        name: String,
        #[serde(default)]
        single_player: bool,
    },

    /// Take the guest slot of an existing room.
    JoinRoom { room_id: RoomId },

    /// Ask for the rooms that can currently be joined.
    ListRooms,

    /// Signal readiness; the game starts once both sides are ready.
    Ready,

    /// Steer, fire, and/or chat. Every field is optional.
    GameInput {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<Direction>,
        #[serde(default)]
        shoot: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat: Option<String>,
    },

    /// Write the room's current state to disk.
    SaveGame,

    /// Keep-alive. Answered with [`ServerMessage::Pong`].
    Ping { client_time: u64 },

    /// Any command this server doesn't recognize.
    #[serde(other)]
    Unknown,
}

impl ClientCommand {
    /// The wire name of this command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::ListRooms => "list_rooms",
            Self::Ready => "ready",
            Self::GameInput { .. } => "game_input",
            Self::SaveGame => "save_game",
            Self::Ping { .. } => "ping",
            Self::Unknown => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage: server → client
// ---------------------------------------------------------------------------

/// A message sent by the server.
///
/// Uses the same `"command"` tag as [`ClientCommand`] so a client can
/// dispatch on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection: the client's player id.
    Identity { player_id: PlayerId },

    /// Reply to `create_room`.
    RoomCreated { room_id: RoomId },

    /// Reply to `list_rooms`.
    RoomList { rooms: Vec<RoomSummary> },

    /// Reply to a successful `join_room`.
    JoinedRoom { room_id: RoomId },

    /// Sent to the host when a guest takes the second slot.
    PlayerJoined { player_id: PlayerId },

    /// The game is starting; `player_number` is 1 for the host, 2 for the
    /// guest.
    StartGame { player_number: u8 },

    /// Full snapshot after a tick.
    GameState { state: Box<GameState> },

    /// The host left; the room no longer exists.
    HostDisconnected,

    /// The guest left; the room is waiting for a new guest.
    GuestDisconnected,

    /// Reply to a successful `save_game`.
    GameSaved { path: String },

    /// Reply to `ping`. `server_time` is milliseconds since server start.
    Pong { client_time: u64, server_time: u64 },

    /// A command was rejected. See [`error_code`].
    Error { code: u16, message: String },
}

impl ServerMessage {
    /// Shorthand for building an [`Error`](Self::Error) message.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

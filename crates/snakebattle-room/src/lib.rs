//! Rooms and the room registry for Snake Battle.
//!
//! Rooms are passive: the server holds one [`RoomRegistry`] behind a
//! single lock, client handlers apply commands to it, and the tick driver
//! calls [`RoomRegistry::tick_all`] once per period.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates/destroys rooms, routes players, ticks games
//! - [`Room`]: one match: host and guest slots, readiness, game state
//! - [`RoomPhase`]: Waiting → InProgress → Over
//! - [`RoomConfig`]: game rules and room limits
//! - [`PendingSave`]: a save captured under the lock, written after it

mod config;
mod error;
mod registry;
mod room;
mod save;

pub use config::{RoomConfig, RoomPhase};
pub use error::RoomError;
pub use registry::{ROOM_ID_RANGE, RoomRegistry, TickReport};
pub use room::{PlayerSender, Room};
pub use save::{
    PendingSave, SaveError, SaveMode, SaveRecord, SaveSummary, SavedSnake, list_saves,
    load_save,
};

//! # Snake Battle
//!
//! Authoritative server for two-player (or solo) Snake Battle over TCP.
//!
//! Clients connect, get a player id, then create or join rooms. Every
//! game runs on the server: clients only send steering, shots and chat,
//! and receive a full snapshot after each tick.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snakebattle::prelude::*;
//!
//! # async fn start() -> Result<(), ServerError> {
//! let server = Server::builder()
//!     .bind("0.0.0.0:5555".parse().unwrap())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
mod tick;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{Server, ServerBuilder};

pub mod prelude {
    pub use crate::{Server, ServerBuilder, ServerConfig, ServerError};
    pub use snakebattle_protocol::{
        ClientCommand, Codec, JsonCodec, PlayerId, RoomId, RoomSummary, ServerMessage,
    };
    pub use snakebattle_room::{RoomConfig, RoomError, SaveRecord, list_saves, load_save};
    pub use snakebattle_sim::{Direction, GameState, Position, SimConfig};
    pub use snakebattle_tick::{TickConfig, TickPolicy};
}

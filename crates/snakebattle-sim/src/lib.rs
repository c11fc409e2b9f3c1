//! Authoritative game simulation for Snake Battle.
//!
//! Everything here is synchronous and deterministic given an RNG: the
//! server owns one [`GameState`] per room and calls [`GameState::step`]
//! once per tick while holding the registry lock.
//!
//! # Key types
//!
//! - [`GameState`]: the full per-room state, also the client snapshot
//! - [`SimConfig`]: board size, charge, stun and chat limits
//! - [`SideInput`]: input queued between ticks
//! - [`Outcome`]: how a finished game ended

mod config;
mod grid;
mod state;
mod step;

pub use config::SimConfig;
pub use grid::{Direction, Position, Side};
pub use state::{GameState, Outcome, Projectile, SideInput, Snake};

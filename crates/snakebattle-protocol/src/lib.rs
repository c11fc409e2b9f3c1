//! Wire protocol for Snake Battle.
//!
//! This crate defines what clients and server say to each other:
//!
//! - **Types** ([`ClientCommand`], [`ServerMessage`], [`RoomSummary`]):
//!   the tagged records that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those records are
//!   turned into frame payloads and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! Framing is the transport's job; this crate only ever sees whole
//! payloads.
//!
//! ```text
//! Transport (frames) → Protocol (ClientCommand) → Room registry
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientCommand, PlayerId, RoomId, RoomSummary, ServerMessage, error_code,
};

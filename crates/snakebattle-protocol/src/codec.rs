//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A codec turns messages into frame payloads and back. The server is
//! written against the [`Codec`] trait, so a compact binary format could
//! replace [`JsonCodec`] without touching the handler.

use serde::{Serialize, de::DeserializeOwned};

use crate::{ClientCommand, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes one client command.
    ///
    /// Unrecognized command names come back as
    /// [`ClientCommand::Unknown`]; anything else that fails to decode is an
    /// error.
    fn decode_command(&self, data: &[u8]) -> Result<ClientCommand, ProtocolError> {
        self.decode(data)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use snakebattle_protocol::{ClientCommand, Codec, JsonCodec, RoomId};
///
/// let codec = JsonCodec;
///
/// let cmd = codec
///     .decode_command(br#"{"command":"join_room","room_id":1234}"#)
///     .unwrap();
/// assert_eq!(cmd, ClientCommand::JoinRoom { room_id: RoomId(1234) });
///
/// let bytes = codec.encode(&cmd).unwrap();
/// let again: ClientCommand = codec.decode(&bytes).unwrap();
/// assert_eq!(cmd, again);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

//! Unified error type for the server.

use snakebattle_protocol::ProtocolError;
use snakebattle_room::{RoomError, SaveError};
use snakebattle_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Writing or reading a save file failed.
    #[error(transparent)]
    Save(#[from] SaveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Transport(_)));
        assert!(server_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotFound(snakebattle_protocol::RoomId(1234));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Room(_)));
        assert_eq!(server_err.to_string(), "room R-1234 not found");
    }

    #[test]
    fn test_from_save_error() {
        let err = SaveError::Io(std::io::Error::other("disk full"));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Save(_)));
    }
}

//! Error types for the room layer.

use snakebattle_protocol::{PlayerId, RoomId, error_code};

use crate::SaveError;

/// Errors that can occur during room operations.
///
/// Every variant is a logical error the offending client gets told about;
/// none of them leave partial state behind.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room already has a guest.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room is single-player or its match has already started.
    #[error("room {0} is not accepting players")]
    NotJoinable(RoomId),

    /// The player is already in a room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The player is not in any room.
    #[error("player {0} is not in a room")]
    NotInRoom(PlayerId),

    /// The room is in a phase that doesn't allow this operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// Every room id is taken.
    #[error("no room ids available")]
    Unavailable,

    /// Capturing or writing a save failed.
    #[error(transparent)]
    Save(#[from] SaveError),
}

impl RoomError {
    /// The HTTP-style code reported to the client.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => error_code::NOT_FOUND,
            Self::RoomFull(_) | Self::NotJoinable(_) | Self::AlreadyInRoom(..) => {
                error_code::CONFLICT
            }
            Self::NotInRoom(_) | Self::InvalidState(_) => error_code::BAD_REQUEST,
            Self::Unavailable => error_code::UNAVAILABLE,
            Self::Save(_) => error_code::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RoomError::NotFound(RoomId(1234)).code(), 404);
        assert_eq!(RoomError::RoomFull(RoomId(1234)).code(), 409);
        assert_eq!(RoomError::AlreadyInRoom(PlayerId(1), RoomId(1234)).code(), 409);
        assert_eq!(RoomError::NotInRoom(PlayerId(1)).code(), 400);
    }

    #[test]
    fn test_error_messages_name_the_room() {
        let msg = RoomError::NotFound(RoomId(4242)).to_string();
        assert_eq!(msg, "room R-4242 not found");
    }
}

//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding messages.
///
/// A decode failure means the peer sent bytes that aren't a valid
/// message. The server treats that as a protocol violation and closes
/// the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing `"command"` tag,
    /// or a known command with missing or mistyped fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is well-formed but not acceptable at this point.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

use std::net::SocketAddr;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// No listener could be bound, not even on an ephemeral port.
    #[error("bind to {addr} failed: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Publishing the chosen port failed.
    #[error("could not write port file: {0}")]
    PortFile(#[source] std::io::Error),

    /// The peer declared a frame longer than the configured maximum.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The peer declared a zero-length frame.
    #[error("empty frame")]
    EmptyFrame,

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns `true` if the peer broke the framing rules, as opposed to
    /// the connection simply failing.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. } | Self::EmptyFrame)
    }
}

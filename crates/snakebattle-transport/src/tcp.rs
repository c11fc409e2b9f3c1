//! TCP transport using length-prefixed frames.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::framing::{self, DEFAULT_MAX_FRAME_LEN};
use crate::{Connection, ConnectionId, Transport, TransportError};

/// Per-connection limits applied to every accepted connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    /// Largest accepted frame payload, in bytes.
    pub max_frame_len: usize,
    /// How long a single frame write may take before the peer is
    /// considered stalled.
    pub write_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
    next_id: u64,
    options: ConnectionOptions,
}

impl TcpTransport {
    /// Binds to exactly `addr`, failing if it is unavailable.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        Self::from_listener(listener)
    }

    /// Binds to `addr`, retrying up to `attempts` times with `delay` in
    /// between. If the port stays busy, falls back to an OS-assigned
    /// ephemeral port on the same host.
    ///
    /// Only fails if even the ephemeral bind fails.
    pub async fn bind_with_fallback(
        addr: SocketAddr,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, TransportError> {
        if addr.port() != 0 {
            for attempt in 1..=attempts.max(1) {
                match TcpListener::bind(addr).await {
                    Ok(listener) => return Self::from_listener(listener),
                    Err(e) => {
                        tracing::warn!(%addr, attempt, error = %e, "preferred port unavailable");
                        if attempt < attempts {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        let ephemeral = SocketAddr::new(addr.ip(), 0);
        let listener = TcpListener::bind(ephemeral)
            .await
            .map_err(|source| TransportError::BindFailed { addr, source })?;
        let transport = Self::from_listener(listener)?;
        if addr.port() != 0 {
            tracing::info!(
                preferred = addr.port(),
                port = transport.local_addr.port(),
                "fell back to ephemeral port"
            );
        }
        Ok(transport)
    }

    fn from_listener(listener: TcpListener) -> Result<Self, TransportError> {
        let local_addr = listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr = %local_addr, "TCP transport listening");
        Ok(Self {
            listener,
            local_addr,
            next_id: 1,
            options: ConnectionOptions::default(),
        })
    }

    /// Sets the limits applied to connections accepted from now on.
    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// The address actually bound, including the real port after a
    /// fallback.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Writes the bound port number to `path` so co-located clients can
    /// find the server.
    pub async fn write_port_file(&self, path: &Path) -> Result<(), TransportError> {
        tokio::fs::write(path, self.local_addr.port().to_string())
            .await
            .map_err(TransportError::PortFile)?;
        tracing::info!(path = %path.display(), port = self.local_addr.port(), "published port");
        Ok(())
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "could not disable Nagle");
        }

        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        tracing::debug!(%id, %peer, "accepted TCP connection");

        let (reader, writer) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer,
            options: self.options,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A single framed TCP connection.
///
/// The read and write halves are locked independently, so one task can
/// sit in [`recv`](Connection::recv) while another sends.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    options: ConnectionOptions,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        let write = framing::write_frame(&mut *writer, data, self.options.max_frame_len);
        match tokio::time::timeout(self.options.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "write timed out",
            ))),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        framing::read_frame(&mut *reader, self.options.max_frame_len).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

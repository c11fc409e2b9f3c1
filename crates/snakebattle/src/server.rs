//! `Server` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → rooms, plus the tick
//! driver that steps every running game.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use snakebattle_protocol::{JsonCodec, PlayerId};
use snakebattle_room::RoomRegistry;
use snakebattle_transport::{ConnectionOptions, TcpTransport, Transport};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::handler::handle_connection;
use crate::tick::run_tick_driver;
use crate::{ServerConfig, ServerError};

/// Shared server state passed to every connection task and the tick
/// driver.
///
/// The registry mutex is the one lock in the server. Holders never await
/// socket or file I/O while holding it.
pub(crate) struct ServerState {
    pub(crate) registry: Mutex<RoomRegistry>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
    next_player: AtomicU64,
    started: Instant,
}

impl ServerState {
    pub(crate) fn new(config: ServerConfig) -> Self {
        Self {
            registry: Mutex::new(RoomRegistry::new(config.room.clone())),
            codec: JsonCodec,
            config,
            next_player: AtomicU64::new(1),
            started: Instant::now(),
        }
    }

    /// Hands out the next player id. Ids are never reused.
    pub(crate) fn next_player_id(&self) -> PlayerId {
        PlayerId(self.next_player.fetch_add(1, Ordering::Relaxed))
    }

    /// Milliseconds since the server started.
    pub(crate) fn uptime_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// let server = Server::builder()
///     .bind("0.0.0.0:5555".parse()?)
///     .port_file(None)
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the preferred address to listen on.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Sets where the bound port is published, or disables it.
    pub fn port_file(mut self, path: Option<PathBuf>) -> Self {
        self.config.port_file = path;
        self
    }

    pub fn tick_period(mut self, period: Duration) -> Self {
        self.config.tick.period = period;
        self
    }

    pub fn save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.save_dir = dir.into();
        self
    }

    /// Binds the listener and prepares shared state.
    ///
    /// Falls back to an ephemeral port if the preferred one stays busy.
    /// Only fails if no port at all can be bound.
    pub async fn build(self) -> Result<Server, ServerError> {
        let config = self.config;
        let transport = TcpTransport::bind_with_fallback(
            config.bind_addr,
            config.bind_attempts,
            config.bind_retry_delay,
        )
        .await?
        .with_options(ConnectionOptions {
            max_frame_len: config.max_frame_len,
            write_timeout: config.write_timeout,
        });

        if let Some(path) = &config.port_file {
            if let Err(e) = transport.write_port_file(path).await {
                tracing::warn!(error = %e, "could not publish port");
            }
        }

        let state = Arc::new(ServerState::new(config));
        Ok(Server { transport, state })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Snake Battle server.
///
/// Call [`run()`](Self::run) to start ticking and accepting connections.
pub struct Server {
    transport: TcpTransport,
    state: Arc<ServerState>,
}

impl Server {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the address the server is bound to, including the real
    /// port after a fallback.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Runs the tick driver and the accept loop.
    ///
    /// Spawns a handler task for each connected client. Runs until the
    /// future is dropped or the process is terminated.
    pub async fn run(mut self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr(), "Snake Battle server running");

        let ticker = tokio::spawn(run_tick_driver(Arc::clone(&self.state)));
        let _ticker = AbortOnDrop(ticker);

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Stops the tick driver when the accept loop goes away.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

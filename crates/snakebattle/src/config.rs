//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use snakebattle_room::RoomConfig;
use snakebattle_tick::TickConfig;
use snakebattle_transport::framing::DEFAULT_MAX_FRAME_LEN;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Preferred listen address. If its port stays busy the server falls
    /// back to an ephemeral port on the same host.
    pub bind_addr: SocketAddr,
    /// Attempts on the preferred port before falling back.
    pub bind_attempts: u32,
    pub bind_retry_delay: Duration,

    /// Where to publish the bound port. `None` disables the file.
    pub port_file: Option<PathBuf>,

    pub tick: TickConfig,

    /// A connection that sends nothing for this long is dropped.
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_frame_len: usize,

    /// Directory `save_game` writes into.
    pub save_dir: PathBuf,

    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5555)),
            bind_attempts: 3,
            bind_retry_delay: Duration::from_millis(500),
            port_file: Some(PathBuf::from("server_port.txt")),
            tick: TickConfig::default(),
            read_timeout: Duration::from_secs(120),
            write_timeout: Duration::from_secs(5),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            save_dir: PathBuf::from("saves"),
            room: RoomConfig::default(),
        }
    }
}

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use snakebattle::{Server, ServerConfig, ServerError};
use tracing_subscriber::EnvFilter;

/// Authoritative Snake Battle server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Preferred port; an ephemeral port is used if it stays busy
    #[arg(short, long, default_value_t = 5555)]
    port: u16,

    /// Milliseconds between game ticks
    #[arg(long, default_value_t = 150)]
    tick_ms: u64,

    /// File the bound port is written to
    #[arg(long, default_value = "server_port.txt")]
    port_file: PathBuf,

    /// Don't write a port file
    #[arg(long)]
    no_port_file: bool,

    /// Directory for save_game files
    #[arg(long, default_value = "saves")]
    save_dir: PathBuf,

    /// Drop clients that send nothing for this many seconds
    #[arg(long, default_value_t = 120)]
    read_timeout_secs: u64,

    /// Snakes are eliminated by running into each other's bodies
    #[arg(long)]
    body_collisions: bool,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            port_file: (!self.no_port_file).then_some(self.port_file),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            save_dir: self.save_dir,
            ..ServerConfig::default()
        };
        config.tick.period = Duration::from_millis(self.tick_ms);
        config.room.sim.opponent_collision = self.body_collisions;
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Cli::parse().into_config();
    let server = Server::builder().config(config).build().await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

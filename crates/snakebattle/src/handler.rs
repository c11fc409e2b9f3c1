//! Per-connection handler: identity, command dispatch, and cleanup.
//!
//! Each accepted connection gets two Tokio tasks:
//!   1. This handler, which reads frames, decodes commands, and applies
//!      them to the registry under the shared lock.
//!   2. A writer task that drains the connection's outbound channel onto
//!      the socket.
//!
//! Everything sent to a client, whether a reply from this handler or a
//! snapshot from the tick driver, goes through that channel, so messages
//! reach the wire in the order they were produced.

use std::sync::Arc;

use snakebattle_protocol::{ClientCommand, Codec, JsonCodec, PlayerId, ServerMessage};
use snakebattle_room::{PlayerSender, RoomError};
use snakebattle_sim::SideInput;
use snakebattle_transport::{Connection, TcpConnection};
use tokio::sync::mpsc;

use crate::ServerError;
use crate::server::ServerState;

/// Drop guard that takes a player out of their room when the handler
/// exits.
///
/// Runs even if the handler panics. Since `Drop` is synchronous, the
/// async lock is taken in a fire-and-forget task.
struct ClientGuard {
    player_id: PlayerId,
    state: Arc<ServerState>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.registry.lock().await.remove_client(player_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), ServerError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let player_id = state.next_player_id();
    tracing::info!(%conn_id, %player_id, peer = %conn.peer_addr(), "client connected");

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), rx, state.codec));
    let _ = tx.send(ServerMessage::Identity { player_id });

    let guard = ClientGuard {
        player_id,
        state: Arc::clone(&state),
    };

    loop {
        let data = match tokio::time::timeout(state.config.read_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) if e.is_protocol_violation() => {
                tracing::warn!(%player_id, error = %e, "bad frame, closing connection");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let command = match state.codec.decode_command(&data) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "malformed command, closing connection");
                break;
            }
        };

        let name = command.name();
        tracing::debug!(%player_id, command = name, "command received");
        if let Err(e) = handle_command(&state, player_id, &tx, command).await {
            tracing::debug!(%player_id, command = name, error = %e, "command rejected");
            let _ = tx.send(ServerMessage::error(e.code(), e.to_string()));
        }
    }

    // The room drops its clone of `tx` once the guard's cleanup runs,
    // which lets the writer drain what's queued and stop.
    drop(guard);
    drop(tx);
    let _ = writer.await;
    tracing::info!(%player_id, "client disconnected");
    conn.close().await?;
    Ok(())
}

/// Applies one command. Errors go back to the client as `error` messages.
async fn handle_command(
    state: &ServerState,
    player_id: PlayerId,
    tx: &PlayerSender,
    command: ClientCommand,
) -> Result<(), RoomError> {
    match command {
        ClientCommand::CreateRoom {
            name,
            single_player,
        } => {
            let mut registry = state.registry.lock().await;
            registry.create_room(player_id, tx.clone(), &name, single_player)?;
        }

        ClientCommand::JoinRoom { room_id } => {
            let mut registry = state.registry.lock().await;
            registry.join_room(player_id, tx.clone(), room_id)?;
        }

        ClientCommand::ListRooms => {
            let rooms = state.registry.lock().await.list_joinable();
            let _ = tx.send(ServerMessage::RoomList { rooms });
        }

        ClientCommand::Ready => {
            state.registry.lock().await.ready(player_id)?;
        }

        ClientCommand::GameInput {
            direction,
            shoot,
            chat,
        } => {
            let input = SideInput { direction, shoot };
            state
                .registry
                .lock()
                .await
                .apply_input(player_id, input, chat.as_deref())?;
        }

        ClientCommand::SaveGame => {
            // Capture under the lock, write after releasing it.
            let pending = state.registry.lock().await.capture_save(player_id)?;
            let path = pending.write(&state.config.save_dir).await?;
            let _ = tx.send(ServerMessage::GameSaved {
                path: path.display().to_string(),
            });
        }

        ClientCommand::Ping { client_time } => {
            let _ = tx.send(ServerMessage::Pong {
                client_time,
                server_time: state.uptime_ms(),
            });
        }

        ClientCommand::Unknown => {
            tracing::debug!(%player_id, "ignoring unknown command");
        }
    }

    Ok(())
}

/// Encodes and sends queued messages until every sender is gone or the
/// socket fails.
async fn write_loop(
    conn: Arc<TcpConnection>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    codec: JsonCodec,
) {
    let conn_id = conn.id();
    while let Some(msg) = outbound.recv().await {
        let bytes = match codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}

//! Integration tests for the server, handler, and full connection flow.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};
use snakebattle::prelude::*;
use snakebattle_transport::framing::{DEFAULT_MAX_FRAME_LEN, read_frame, write_frame};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

// =========================================================================
// Helpers
// =========================================================================

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn test_config() -> ServerConfig {
    let mut config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        port_file: None,
        ..ServerConfig::default()
    };
    config.tick.period = Duration::from_millis(20);
    config
}

/// Starts a server on a random port and returns the address.
async fn start_server(config: ServerConfig) -> SocketAddr {
    let server = Server::builder()
        .config(config)
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

/// A unique scratch directory under the system temp dir.
fn scratch_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("snakebattle-{tag}-{}", std::process::id()))
}

struct Client {
    stream: TcpStream,
    player_id: PlayerId,
}

impl Client {
    /// Connects and consumes the identity message.
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        let mut client = Self {
            stream,
            player_id: PlayerId(0),
        };
        match client.recv().await {
            ServerMessage::Identity { player_id } => client.player_id = player_id,
            other => panic!("expected identity first, got {other:?}"),
        }
        client
    }

    async fn send(&mut self, value: Value) {
        let bytes = serde_json::to_vec(&value).unwrap();
        write_frame(&mut self.stream, &bytes, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        let frame = tokio::time::timeout(
            RECV_TIMEOUT,
            read_frame(&mut self.stream, DEFAULT_MAX_FRAME_LEN),
        )
        .await
        .expect("timed out waiting for a message")
        .expect("read failed")
        .expect("server closed the connection");
        serde_json::from_slice(&frame).unwrap()
    }

    /// Next message that isn't a `game_state` snapshot.
    async fn recv_event(&mut self) -> ServerMessage {
        loop {
            match self.recv().await {
                ServerMessage::GameState { .. } => continue,
                other => return other,
            }
        }
    }

    async fn recv_state(&mut self) -> GameState {
        loop {
            if let ServerMessage::GameState { state } = self.recv().await {
                return *state;
            }
        }
    }

    /// Waits for the server to close the connection.
    async fn expect_closed(&mut self) {
        let result = tokio::time::timeout(
            RECV_TIMEOUT,
            read_frame(&mut self.stream, DEFAULT_MAX_FRAME_LEN),
        )
        .await
        .expect("server should close the connection");
        assert!(
            !matches!(result, Ok(Some(_))),
            "expected close, got a frame"
        );
    }

    async fn create_room(&mut self, name: &str, single_player: bool) -> RoomId {
        self.send(json!({"command": "create_room", "name": name, "single_player": single_player}))
            .await;
        match self.recv().await {
            ServerMessage::RoomCreated { room_id } => room_id,
            other => panic!("expected room_created, got {other:?}"),
        }
    }
}

/// Host and guest in the same room, not yet ready.
async fn paired(addr: SocketAddr) -> (Client, Client, RoomId) {
    let mut host = Client::connect(addr).await;
    let mut guest = Client::connect(addr).await;
    let room_id = host.create_room("duel", false).await;

    guest.send(json!({"command": "join_room", "room_id": room_id})).await;
    assert_eq!(guest.recv().await, ServerMessage::JoinedRoom { room_id });
    assert_eq!(
        host.recv().await,
        ServerMessage::PlayerJoined {
            player_id: guest.player_id
        }
    );
    (host, guest, room_id)
}

// =========================================================================
// Server startup
// =========================================================================

#[tokio::test]
async fn test_server_builds_and_binds() {
    let server = Server::builder()
        .bind("127.0.0.1:0".parse().unwrap())
        .port_file(None)
        .build()
        .await
        .expect("should build");
    assert_ne!(server.local_addr().port(), 0);
}

#[tokio::test]
async fn test_port_file_holds_bound_port() {
    let path = scratch_dir("port").with_extension("txt");
    let server = Server::builder()
        .bind("127.0.0.1:0".parse().unwrap())
        .port_file(Some(path.clone()))
        .build()
        .await
        .unwrap();

    let written = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(written, server.local_addr().port().to_string());
    let _ = tokio::fs::remove_file(&path).await;
}

// =========================================================================
// Connection basics
// =========================================================================

#[tokio::test]
async fn test_each_client_gets_a_distinct_identity() {
    let addr = start_server(test_config()).await;
    let a = Client::connect(addr).await;
    let b = Client::connect(addr).await;
    assert_ne!(a.player_id, b.player_id);
}

#[tokio::test]
async fn test_ping_pong() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.send(json!({"command": "ping", "client_time": 1234})).await;
    match client.recv().await {
        ServerMessage::Pong { client_time, .. } => assert_eq!(client_time, 1234),
        other => panic!("expected pong, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_command_is_ignored() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.send(json!({"command": "dance", "style": "tango"})).await;
    client.send(json!({"command": "ping", "client_time": 7})).await;

    assert!(matches!(
        client.recv().await,
        ServerMessage::Pong { client_time: 7, .. }
    ));
}

#[tokio::test]
async fn test_malformed_json_closes_connection() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    write_frame(&mut client.stream, b"{not json", DEFAULT_MAX_FRAME_LEN)
        .await
        .unwrap();
    client.expect_closed().await;
}

#[tokio::test]
async fn test_known_command_with_bad_fields_closes_connection() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.send(json!({"command": "join_room", "room_id": "lobby"})).await;
    client.expect_closed().await;
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    let len = (DEFAULT_MAX_FRAME_LEN as u32) + 1;
    client.stream.write_all(&len.to_be_bytes()).await.unwrap();
    client.expect_closed().await;
}

#[tokio::test]
async fn test_idle_client_is_dropped_after_read_timeout() {
    let mut config = test_config();
    config.read_timeout = Duration::from_millis(100);
    let addr = start_server(config).await;
    let mut client = Client::connect(addr).await;

    client.expect_closed().await;
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_create_list_join_flow() {
    let addr = start_server(test_config()).await;
    let mut host = Client::connect(addr).await;
    let mut browser = Client::connect(addr).await;

    let room_id = host.create_room("  Friday night  ", false).await;

    browser.send(json!({"command": "list_rooms"})).await;
    let rooms = match browser.recv().await {
        ServerMessage::RoomList { rooms } => rooms,
        other => panic!("expected room_list, got {other:?}"),
    };
    assert_eq!(
        rooms,
        vec![RoomSummary {
            id: room_id,
            name: "Friday night".into(),
            player_count: 1,
            in_game: false,
            single_player: false,
        }]
    );

    browser.send(json!({"command": "join_room", "room_id": room_id})).await;
    assert_eq!(browser.recv().await, ServerMessage::JoinedRoom { room_id });
    assert_eq!(
        host.recv().await,
        ServerMessage::PlayerJoined {
            player_id: browser.player_id
        }
    );

    // Full rooms drop off the list.
    let mut late = Client::connect(addr).await;
    late.send(json!({"command": "list_rooms"})).await;
    assert_eq!(late.recv().await, ServerMessage::RoomList { rooms: vec![] });
}

#[tokio::test]
async fn test_join_missing_room_is_not_found() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.send(json!({"command": "join_room", "room_id": 1})).await;
    match client.recv().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_full_room_is_conflict() {
    let addr = start_server(test_config()).await;
    let (_host, _guest, room_id) = paired(addr).await;
    let mut third = Client::connect(addr).await;

    third.send(json!({"command": "join_room", "room_id": room_id})).await;
    match third.recv().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, 409),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ready_without_room_is_bad_request() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.send(json!({"command": "ready"})).await;
    match client.recv().await {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("not in a room"));
        }
        other => panic!("expected error, got {other:?}"),
    }
}

// =========================================================================
// Games
// =========================================================================

#[tokio::test]
async fn test_both_ready_starts_game_and_streams_state() {
    let addr = start_server(test_config()).await;
    let (mut host, mut guest, _) = paired(addr).await;

    host.send(json!({"command": "ready"})).await;
    guest.send(json!({"command": "ready"})).await;

    assert_eq!(host.recv().await, ServerMessage::StartGame { player_number: 1 });
    assert_eq!(guest.recv().await, ServerMessage::StartGame { player_number: 2 });

    let first = host.recv_state().await;
    let later = host.recv_state().await;
    assert_eq!(first.snakes.len(), 2);
    assert!(later.tick > first.tick);

    let from_guest = guest.recv_state().await;
    assert_eq!(from_guest.snakes.len(), 2);
}

#[tokio::test]
async fn test_single_player_room_starts_immediately() {
    let addr = start_server(test_config()).await;
    let mut solo = Client::connect(addr).await;

    solo.create_room("solo", true).await;
    assert_eq!(solo.recv().await, ServerMessage::StartGame { player_number: 1 });

    let state = solo.recv_state().await;
    assert_eq!(state.snakes.len(), 1);
    assert!(state.tick >= 1);

    // Not offered to anyone else.
    let mut other = Client::connect(addr).await;
    other.send(json!({"command": "list_rooms"})).await;
    assert_eq!(other.recv().await, ServerMessage::RoomList { rooms: vec![] });
}

#[tokio::test]
async fn test_steering_reaches_next_snapshot() {
    let addr = start_server(test_config()).await;
    let mut solo = Client::connect(addr).await;
    solo.create_room("solo", true).await;
    solo.recv().await; // start_game

    solo.send(json!({"command": "game_input", "direction": "down", "chat": "hello"}))
        .await;

    let state = loop {
        let state = solo.recv_state().await;
        if state.snakes[0].direction == Direction::Down {
            break state;
        }
    };
    assert_eq!(
        state.chat_messages.back().map(String::as_str),
        Some("Player 1: hello")
    );
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_guest_disconnect_notifies_host_and_reopens_room() {
    let addr = start_server(test_config()).await;
    let (mut host, guest, room_id) = paired(addr).await;

    drop(guest);
    assert_eq!(host.recv_event().await, ServerMessage::GuestDisconnected);

    let mut browser = Client::connect(addr).await;
    browser.send(json!({"command": "list_rooms"})).await;
    match browser.recv().await {
        ServerMessage::RoomList { rooms } => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].id, room_id);
            assert_eq!(rooms[0].player_count, 1);
        }
        other => panic!("expected room_list, got {other:?}"),
    }
}

#[tokio::test]
async fn test_host_disconnect_notifies_guest_and_destroys_room() {
    let addr = start_server(test_config()).await;
    let (host, mut guest, room_id) = paired(addr).await;

    drop(host);
    assert_eq!(guest.recv_event().await, ServerMessage::HostDisconnected);

    // The guest is free to start over.
    guest.send(json!({"command": "join_room", "room_id": room_id})).await;
    match guest.recv().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected error, got {other:?}"),
    }
    let new_room = guest.create_room("again", false).await;
    assert_ne!(new_room.0, 0);
}

#[tokio::test]
async fn test_disconnect_mid_game_notifies_opponent() {
    let addr = start_server(test_config()).await;
    let (mut host, mut guest, _) = paired(addr).await;
    host.send(json!({"command": "ready"})).await;
    guest.send(json!({"command": "ready"})).await;
    host.recv_state().await;

    drop(guest);
    assert_eq!(host.recv_event().await, ServerMessage::GuestDisconnected);
}

// =========================================================================
// Saves
// =========================================================================

#[tokio::test]
async fn test_save_game_writes_record() {
    let dir = scratch_dir("saves");
    let mut config = test_config();
    config.save_dir = dir.clone();
    let addr = start_server(config).await;

    let mut solo = Client::connect(addr).await;
    let room_id = solo.create_room("solo", true).await;
    solo.recv().await; // start_game

    solo.send(json!({"command": "save_game"})).await;
    let path = match solo.recv_event().await {
        ServerMessage::GameSaved { path } => PathBuf::from(path),
        other => panic!("expected game_saved, got {other:?}"),
    };
    assert!(path.starts_with(&dir));

    let record = load_save(&path).await.unwrap();
    assert_eq!(record.room_id, room_id);
    assert_eq!(record.snakes.len(), 1);

    let listed = list_saves(&dir).await.unwrap();
    assert!(listed.iter().any(|s| s.path == path));

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_save_game_without_room_is_bad_request() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.send(json!({"command": "save_game"})).await;
    match client.recv().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected error, got {other:?}"),
    }
}

//! Room registry: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snakebattle_protocol::{PlayerId, RoomId, RoomSummary, ServerMessage};
use snakebattle_sim::SideInput;

use crate::{PendingSave, PlayerSender, Room, RoomConfig, RoomError};

/// Room ids are drawn from this range.
pub const ROOM_ID_RANGE: RangeInclusive<u32> = 1000..=9999;

/// Random draws before falling back to a linear scan for a free id.
const RANDOM_ID_ATTEMPTS: usize = 32;

/// What a tick did across all rooms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Rooms whose game was stepped.
    pub stepped: usize,
    /// Rooms whose game ended on this tick.
    pub finished: usize,
}

/// All live rooms and which player is in which.
///
/// The server keeps exactly one registry behind a single mutex. Every
/// command application and every tick runs against it while holding that
/// lock, so operations here never interleave.
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,

    /// A player is in at most one room at a time.
    player_rooms: HashMap<PlayerId, RoomId>,

    config: RoomConfig,
    rng: StdRng,
}

impl RoomRegistry {
    /// Creates an empty registry seeded from the thread-local RNG.
    pub fn new(config: RoomConfig) -> Self {
        Self::with_rng(config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates an empty registry with a caller-supplied RNG, for
    /// reproducible room ids and food placement.
    pub fn with_rng(config: RoomConfig, rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room with `player` as host and returns its id.
    ///
    /// The host is sent `room_created`. A single-player room starts
    /// immediately, so the host also gets `start_game` before this returns.
    pub fn create_room(
        &mut self,
        player: PlayerId,
        sender: PlayerSender,
        name: &str,
        single_player: bool,
    ) -> Result<RoomId, RoomError> {
        self.ensure_roomless(player)?;
        let room_id = self.allocate_id()?;
        let name: String = name.trim().chars().take(self.config.max_name_len).collect();

        let mut room = Room::new(
            room_id,
            name,
            single_player,
            player,
            sender,
            &self.config.sim,
        );
        room.send_to_host(ServerMessage::RoomCreated { room_id });
        if single_player {
            room.start();
        }

        tracing::info!(%room_id, %player, name = room.name(), single_player, "room created");
        self.rooms.insert(room_id, room);
        self.player_rooms.insert(player, room_id);
        Ok(room_id)
    }

    /// Lists the rooms a new guest could join, ordered by id.
    pub fn list_joinable(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .values()
            .filter(|room| room.is_joinable())
            .map(Room::summary)
            .collect();
        rooms.sort_by_key(|summary| summary.id.0);
        rooms
    }

    /// Puts `player` into the guest slot of `room_id`.
    ///
    /// The guest is sent `joined_room`; the host is sent `player_joined`.
    pub fn join_room(
        &mut self,
        player: PlayerId,
        sender: PlayerSender,
        room_id: RoomId,
    ) -> Result<(), RoomError> {
        self.ensure_roomless(player)?;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        room.add_guest(player, sender)?;
        room.send_to_guest(ServerMessage::JoinedRoom { room_id });
        room.send_to_host(ServerMessage::PlayerJoined { player_id: player });

        self.player_rooms.insert(player, room_id);
        tracing::info!(%room_id, %player, "player joined");
        Ok(())
    }

    /// Marks `player` ready; starts the game once both sides are.
    pub fn ready(&mut self, player: PlayerId) -> Result<(), RoomError> {
        let room = self.room_of_mut(player)?;
        let started = room.mark_ready(player)?;
        tracing::debug!(room_id = %room.id(), %player, started, "player ready");
        Ok(())
    }

    /// Queues steering/shooting input and records chat for `player`.
    pub fn apply_input(
        &mut self,
        player: PlayerId,
        input: SideInput,
        chat: Option<&str>,
    ) -> Result<(), RoomError> {
        let room_id = self.player_room(player).ok_or(RoomError::NotInRoom(player))?;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        room.apply_input(player, input, chat, &self.config.sim)
    }

    /// Snapshots `player`'s room for saving. Write the result outside the
    /// lock with [`PendingSave::write`].
    pub fn capture_save(&self, player: PlayerId) -> Result<PendingSave, RoomError> {
        let room_id = self.player_room(player).ok_or(RoomError::NotInRoom(player))?;
        let room = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        Ok(PendingSave::capture(room_id, room.game())?)
    }

    /// Removes a disconnected player from whatever room they were in.
    ///
    /// A departing host tears the room down and the guest is told
    /// `host_disconnected`. A departing guest frees the slot, the room goes
    /// back to waiting, and the host is told `guest_disconnected`.
    pub fn remove_client(&mut self, player: PlayerId) {
        let Some(room_id) = self.player_rooms.remove(&player) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        if room.host() == player {
            if let Some(guest) = room.guest() {
                self.player_rooms.remove(&guest);
            }
            room.send_to_guest(ServerMessage::HostDisconnected);
            self.rooms.remove(&room_id);
            tracing::info!(%room_id, %player, "host left, room destroyed");
        } else if room.remove_guest(&self.config.sim).is_some() {
            room.send_to_host(ServerMessage::GuestDisconnected);
            tracing::info!(%room_id, %player, "guest left, room waiting");
        }
    }

    /// Steps every running game once and pushes the snapshots.
    pub fn tick_all(&mut self) -> TickReport {
        let mut report = TickReport::default();
        for room in self.rooms.values_mut() {
            if !room.phase().is_active() {
                continue;
            }
            report.stepped += 1;
            if room.tick(&self.config.sim, &mut self.rng).is_some() {
                report.finished += 1;
            }
        }
        report
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    /// Returns the room `player` is currently in, if any.
    pub fn player_room(&self, player: PlayerId) -> Option<RoomId> {
        self.player_rooms.get(&player).copied()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn room_of_mut(&mut self, player: PlayerId) -> Result<&mut Room, RoomError> {
        let room_id = self.player_room(player).ok_or(RoomError::NotInRoom(player))?;
        self.rooms.get_mut(&room_id).ok_or(RoomError::NotFound(room_id))
    }

    fn ensure_roomless(&self, player: PlayerId) -> Result<(), RoomError> {
        match self.player_room(player) {
            Some(current) => Err(RoomError::AlreadyInRoom(player, current)),
            None => Ok(()),
        }
    }

    /// Picks an unused id uniformly from [`ROOM_ID_RANGE`], retrying on
    /// collision.
    fn allocate_id(&mut self) -> Result<RoomId, RoomError> {
        for _ in 0..RANDOM_ID_ATTEMPTS {
            let id = RoomId(self.rng.random_range(ROOM_ID_RANGE));
            if !self.rooms.contains_key(&id) {
                return Ok(id);
            }
        }
        ROOM_ID_RANGE
            .map(RoomId)
            .find(|id| !self.rooms.contains_key(id))
            .ok_or(RoomError::Unavailable)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RoomRegistry {
        RoomRegistry::with_rng(RoomConfig::default(), StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_allocated_ids_are_in_range_and_unique() {
        let mut reg = registry();
        let mut seen = std::collections::HashSet::new();
        for n in 0..200 {
            let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
            let id = reg.create_room(PlayerId(n), tx, "r", false).unwrap();
            assert!(ROOM_ID_RANGE.contains(&id.0));
            assert!(seen.insert(id), "room id {id} reused while live");
        }
    }

    #[test]
    fn test_room_name_is_trimmed_and_capped() {
        let mut reg = registry();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let long = format!("  {}  ", "n".repeat(100));
        let id = reg.create_room(PlayerId(1), tx, &long, false).unwrap();
        assert_eq!(reg.room(id).unwrap().name().len(), 32);
    }
}

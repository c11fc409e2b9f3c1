//! A single match: two player slots, readiness, and the game state.
//!
//! Rooms are plain data owned by the [`RoomRegistry`](crate::RoomRegistry)
//! and only touched while its lock is held. Anything a room wants to tell a
//! player is pushed into that player's outbound channel, never written to
//! a socket directly.

use rand::Rng;
use snakebattle_protocol::{PlayerId, RoomId, RoomSummary, ServerMessage};
use snakebattle_sim::{GameState, Outcome, Side, SideInput, SimConfig};
use tokio::sync::mpsc;

use crate::{RoomError, RoomPhase};

/// Channel sender for delivering outbound messages to a player's
/// connection writer.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// One participant position within a room.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) player_id: PlayerId,
    pub(crate) side: Side,
    pub(crate) ready: bool,
    sender: PlayerSender,
}

impl Slot {
    fn new(player_id: PlayerId, side: Side, sender: PlayerSender) -> Self {
        Self {
            player_id,
            side,
            ready: false,
            sender,
        }
    }

    /// Queues a message for this slot's connection. A connection that has
    /// already gone away is ignored; its handler cleans up on its own.
    pub(crate) fn send(&self, msg: ServerMessage) {
        let _ = self.sender.send(msg);
    }
}

/// One isolated match instance.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    single_player: bool,
    phase: RoomPhase,
    host: Slot,
    guest: Option<Slot>,
    game: GameState,
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        name: String,
        single_player: bool,
        host_id: PlayerId,
        host_sender: PlayerSender,
        sim: &SimConfig,
    ) -> Self {
        Self {
            id,
            name,
            single_player,
            phase: RoomPhase::Waiting,
            host: Slot::new(host_id, Side::One, host_sender),
            guest: None,
            game: GameState::new(sim, single_player),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_single_player(&self) -> bool {
        self.single_player
    }

    pub fn host(&self) -> PlayerId {
        self.host.player_id
    }

    pub fn guest(&self) -> Option<PlayerId> {
        self.guest.as_ref().map(|slot| slot.player_id)
    }

    pub fn player_count(&self) -> usize {
        1 + usize::from(self.guest.is_some())
    }

    /// The authoritative game state.
    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Returns `true` if a guest could join right now.
    pub fn is_joinable(&self) -> bool {
        self.phase.is_joinable() && self.guest.is_none() && !self.single_player
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            name: self.name.clone(),
            player_count: self.player_count(),
            in_game: self.phase.has_started(),
            single_player: self.single_player,
        }
    }

    /// Which side `player` controls, if they are in this room.
    pub fn side_of(&self, player: PlayerId) -> Option<Side> {
        self.slots()
            .find(|slot| slot.player_id == player)
            .map(|slot| slot.side)
    }

    fn slots(&self) -> impl Iterator<Item = &Slot> {
        std::iter::once(&self.host).chain(self.guest.as_ref())
    }

    fn slot_mut(&mut self, player: PlayerId) -> Option<&mut Slot> {
        if self.host.player_id == player {
            return Some(&mut self.host);
        }
        self.guest.as_mut().filter(|slot| slot.player_id == player)
    }

    /// Sends `msg` to every occupied slot.
    pub(crate) fn broadcast(&self, msg: &ServerMessage) {
        for slot in self.slots() {
            slot.send(msg.clone());
        }
    }

    pub(crate) fn send_to_host(&self, msg: ServerMessage) {
        self.host.send(msg);
    }

    pub(crate) fn send_to_guest(&self, msg: ServerMessage) {
        if let Some(guest) = &self.guest {
            guest.send(msg);
        }
    }

    // -----------------------------------------------------------------------
    // Phase transitions
    // -----------------------------------------------------------------------

    /// Fills the guest slot.
    pub(crate) fn add_guest(
        &mut self,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        if self.single_player || !self.phase.is_joinable() {
            return Err(RoomError::NotJoinable(self.id));
        }
        if self.guest.is_some() {
            return Err(RoomError::RoomFull(self.id));
        }
        self.guest = Some(Slot::new(player, Side::Two, sender));
        Ok(())
    }

    /// Marks `player` ready. Returns `true` if this started the game.
    pub(crate) fn mark_ready(&mut self, player: PlayerId) -> Result<bool, RoomError> {
        match self.phase {
            RoomPhase::InProgress => return Ok(false),
            RoomPhase::Over => {
                return Err(RoomError::InvalidState(format!(
                    "game in room {} is already over",
                    self.id
                )));
            }
            RoomPhase::Waiting => {}
        }

        let slot = self
            .slot_mut(player)
            .ok_or(RoomError::NotInRoom(player))?;
        slot.ready = true;

        let all_ready = self.host.ready
            && (self.single_player || self.guest.as_ref().is_some_and(|g| g.ready));
        if all_ready {
            self.start();
        }
        Ok(all_ready)
    }

    /// Moves to `InProgress` and tells each slot its player number.
    /// Callers make sure this happens at most once per match.
    pub(crate) fn start(&mut self) {
        self.phase = RoomPhase::InProgress;
        for slot in self.slots() {
            slot.send(ServerMessage::StartGame {
                player_number: slot.side.number(),
            });
        }
        tracing::info!(
            room_id = %self.id,
            players = self.player_count(),
            single_player = self.single_player,
            "game started"
        );
    }

    /// Empties the guest slot and resets the room for a new match.
    ///
    /// Returns the departed guest's id, or `None` if there was no guest.
    pub(crate) fn remove_guest(&mut self, sim: &SimConfig) -> Option<PlayerId> {
        let guest = self.guest.take()?;
        self.host.ready = false;
        self.phase = RoomPhase::Waiting;
        self.game = GameState::new(sim, self.single_player);
        Some(guest.player_id)
    }

    // -----------------------------------------------------------------------
    // Gameplay
    // -----------------------------------------------------------------------

    /// Queues input and records chat for `player`'s side.
    ///
    /// Outside of a running game the input is dropped.
    pub(crate) fn apply_input(
        &mut self,
        player: PlayerId,
        input: SideInput,
        chat: Option<&str>,
        sim: &SimConfig,
    ) -> Result<(), RoomError> {
        let side = self.side_of(player).ok_or(RoomError::NotInRoom(player))?;
        if !self.phase.is_active() {
            tracing::debug!(room_id = %self.id, %player, phase = %self.phase, "input outside a running game ignored");
            return Ok(());
        }

        self.game.queue_input(side, input);
        if let Some(text) = chat.filter(|text| !text.is_empty()) {
            self.game.push_chat(side, text, sim);
        }
        Ok(())
    }

    /// Advances a running game by one tick and sends the snapshot to
    /// every participant. Returns the outcome if the game just ended.
    pub(crate) fn tick<R: Rng>(&mut self, sim: &SimConfig, rng: &mut R) -> Option<Outcome> {
        if !self.phase.is_active() {
            return None;
        }

        let outcome = self.game.step(sim, rng);
        self.broadcast(&ServerMessage::GameState {
            state: Box::new(self.game.clone()),
        });

        if let Some(outcome) = outcome {
            self.phase = RoomPhase::Over;
            tracing::info!(room_id = %self.id, %outcome, tick = self.game.tick, "game finished");
        }
        outcome
    }
}

//! Save-game records.
//!
//! A save is captured from a room while the registry lock is held
//! ([`PendingSave::capture`]) and written to disk afterwards
//! ([`PendingSave::write`]), so file I/O never happens under the lock.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snakebattle_protocol::RoomId;
use snakebattle_sim::{Direction, GameState, Outcome, Position, Projectile};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

/// Errors that can occur while writing or reading save files.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("save file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("save file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not format save timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Which kind of game a save came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    SinglePlayer,
    Multiplayer,
}

impl SaveMode {
    fn file_prefix(self) -> &'static str {
        match self {
            Self::SinglePlayer => "snake_save",
            Self::Multiplayer => "snake_mp_save",
        }
    }
}

/// One side's snake as stored in a save file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSnake {
    /// Body cells, head first.
    pub positions: Vec<Position>,
    pub direction: Direction,
    pub score: u32,
    pub stunned: u32,
    /// Remaining projectile charge.
    pub projectiles: u32,
}

/// The JSON document written for a `save_game` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub mode: SaveMode,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub room_id: RoomId,
    pub tick: u64,
    pub snakes: Vec<SavedSnake>,
    pub food_pos: Position,
    /// Projectiles in flight.
    pub projectiles: Vec<Projectile>,
    pub game_over: bool,
    pub winner: Option<Outcome>,
}

impl SaveRecord {
    fn from_game(
        room_id: RoomId,
        game: &GameState,
        at: OffsetDateTime,
    ) -> Result<Self, SaveError> {
        let mode = if game.is_single_player() {
            SaveMode::SinglePlayer
        } else {
            SaveMode::Multiplayer
        };
        let snakes = game
            .snakes
            .iter()
            .map(|snake| SavedSnake {
                positions: snake.body.iter().copied().collect(),
                direction: snake.direction,
                score: snake.score,
                stunned: snake.stunned,
                projectiles: snake.charge,
            })
            .collect();

        Ok(Self {
            mode,
            timestamp: at.format(&Rfc3339)?,
            room_id,
            tick: game.tick,
            snakes,
            food_pos: game.food,
            projectiles: game.projectiles.clone(),
            game_over: game.game_over,
            winner: game.winner,
        })
    }
}

/// A save captured from a room but not yet written.
#[derive(Debug, Clone)]
pub struct PendingSave {
    file_name: String,
    record: SaveRecord,
}

impl PendingSave {
    /// Snapshots `game` as it is right now.
    pub fn capture(room_id: RoomId, game: &GameState) -> Result<Self, SaveError> {
        Self::capture_at(room_id, game, OffsetDateTime::now_utc())
    }

    pub(crate) fn capture_at(
        room_id: RoomId,
        game: &GameState,
        at: OffsetDateTime,
    ) -> Result<Self, SaveError> {
        let record = SaveRecord::from_game(room_id, game, at)?;
        let stamp = at.format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))?;
        let file_name = format!(
            "{}_{}_{}.json",
            record.mode.file_prefix(),
            room_id.0,
            stamp
        );
        Ok(Self { file_name, record })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn record(&self) -> &SaveRecord {
        &self.record
    }

    /// Writes the record as pretty-printed JSON into `dir`, creating the
    /// directory if needed. Returns the path written.
    pub async fn write(self, dir: &Path) -> Result<PathBuf, SaveError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        let json = serde_json::to_vec_pretty(&self.record)?;
        tokio::fs::write(&path, json).await?;
        tracing::info!(room_id = %self.record.room_id, path = %path.display(), "game saved");
        Ok(path)
    }
}

/// Reads a save file back.
pub async fn load_save(path: &Path) -> Result<SaveRecord, SaveError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Directory listing entry for a save file.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSummary {
    pub path: PathBuf,
    pub mode: SaveMode,
    pub room_id: RoomId,
    pub timestamp: String,
}

/// Lists the saves in `dir`, newest first.
///
/// Files that aren't readable save records are skipped. A missing
/// directory yields an empty list.
pub async fn list_saves(dir: &Path) -> Result<Vec<SaveSummary>, SaveError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut saves = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        match load_save(&path).await {
            Ok(record) => saves.push(SaveSummary {
                path,
                mode: record.mode,
                room_id: record.room_id,
                timestamp: record.timestamp,
            }),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable save"),
        }
    }

    // RFC 3339 UTC timestamps sort chronologically as strings.
    saves.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(saves)
}

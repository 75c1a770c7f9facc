//! Room table and matchmaking.
//!
//! All room state lives behind one lock inside [`RoomTable`]; callers only get
//! snapshots back. The transition WAITING -> PLAYING and the launch of the match
//! server happen in the same critical section as the membership change that
//! triggers them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::RoomConfig;
use crate::lobby_errors::FailReason;
use crate::orchestrator::{LaunchSpec, MatchLauncher, MatchProcess};
use crate::store::GameRecord;

pub type RoomId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Running,
    Finished { exit_code: i32 },
    Failed { reason: String },
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Running => "RUNNING",
            MatchStatus::Finished { .. } => "FINISHED",
            MatchStatus::Failed { .. } => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    Playing {
        port: u16,
        status: MatchStatus,
        started_at: Instant,
        ended_at: Option<Instant>,
    },
}

/// Version and capacity of a game, frozen when a room is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub name: String,
    pub version: String,
    pub max_players: u32,
}

impl From<&GameRecord> for GameSnapshot {
    fn from(game: &GameRecord) -> Self {
        Self {
            name: game.name.clone(),
            version: game.version.clone(),
            max_players: game.max_players,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub game_name: String,
    pub version: String,
    pub max_players: u32,
    pub owner: String,
    /// In join order; the owner is first while present.
    pub players: Vec<String>,
    pub state: RoomState,
}

impl Room {
    pub fn is_waiting(&self) -> bool {
        self.state == RoomState::Waiting
    }

    pub fn port(&self) -> Option<u16> {
        match &self.state {
            RoomState::Playing { port, .. } => Some(*port),
            RoomState::Waiting => None,
        }
    }

    pub fn match_status(&self) -> Option<&MatchStatus> {
        match &self.state {
            RoomState::Playing { status, .. } => Some(status),
            RoomState::Waiting => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomErr {
    #[error("Room {0} does not exist")]
    NotFound(RoomId),

    #[error("Room {0} is no longer accepting players")]
    NotWaiting(RoomId),

    #[error("Room {0} is full")]
    Full(RoomId),

    #[error("Already waiting in room {0}")]
    AlreadyInRoom(RoomId),

    #[error("Not a member of room {0}")]
    NotMember(RoomId),

    #[error("Could not start the match: {0}")]
    Launch(String),
}

impl RoomErr {
    pub fn reason(&self) -> FailReason {
        match self {
            RoomErr::NotFound(_) => FailReason::NotFound,
            RoomErr::NotWaiting(_) => FailReason::RoomNotWaiting,
            RoomErr::Full(_) => FailReason::RoomFull,
            RoomErr::AlreadyInRoom(_) => FailReason::AlreadyInRoom,
            RoomErr::NotMember(_) => FailReason::InvalidRequest,
            RoomErr::Launch(_) => FailReason::LaunchFailed,
        }
    }
}

#[derive(Debug)]
pub enum JoinOutcome {
    Waiting(Room),
    /// The join filled the room and its match server was launched.
    Started { room: Room, process: MatchProcess },
}

#[derive(Debug)]
struct RoomTableInner {
    next_id: RoomId,
    rooms: BTreeMap<RoomId, Room>,
}

impl RoomTableInner {
    fn waiting_room_of(&self, username: &str) -> Option<RoomId> {
        self.rooms
            .values()
            .find(|room| room.is_waiting() && room.players.iter().any(|p| p == username))
            .map(|room| room.id)
    }

    /// Hand ownership on after `username` left, or drop the room if it is empty.
    fn settle_after_leave(&mut self, room_id: RoomId, username: &str) -> Option<Room> {
        let room = self.rooms.get_mut(&room_id)?;
        if let Some(first) = room.players.first() {
            if room.owner == username {
                room.owner = first.clone();
            }
            return Some(room.clone());
        }

        self.rooms.remove(&room_id);
        debug!(target: "rooms", "Room {} dropped, last player left", room_id);
        None
    }
}

#[derive(Debug)]
pub struct RoomTable {
    inner: Mutex<RoomTableInner>,
}

impl Default for RoomTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RoomTableInner {
                next_id: 1,
                rooms: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoomTableInner> {
        // Every critical section leaves the table consistent, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_room(&self, game: &GameSnapshot, owner: &str) -> Result<Room, RoomErr> {
        let mut inner = self.lock();
        if let Some(current) = inner.waiting_room_of(owner) {
            return Err(RoomErr::AlreadyInRoom(current));
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let room = Room {
            id,
            game_name: game.name.clone(),
            version: game.version.clone(),
            max_players: game.max_players,
            owner: owner.to_string(),
            players: vec![owner.to_string()],
            state: RoomState::Waiting,
        };
        inner.rooms.insert(id, room.clone());
        debug!(target: "rooms", "Room {} created for {} v{} by {}", id, game.name, game.version, owner);
        Ok(room)
    }

    /// Add `username` to a WAITING room. The join that fills the room launches
    /// its match server; if the launch fails the join is undone.
    pub fn join_room(
        &self,
        room_id: RoomId,
        username: &str,
        launcher: &dyn MatchLauncher,
    ) -> Result<JoinOutcome, RoomErr> {
        let mut inner = self.lock();
        if let Some(current) = inner.waiting_room_of(username) {
            return Err(RoomErr::AlreadyInRoom(current));
        }

        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomErr::NotFound(room_id))?;
        if !room.is_waiting() {
            return Err(RoomErr::NotWaiting(room_id));
        }
        if room.players.len() as u32 >= room.max_players {
            return Err(RoomErr::Full(room_id));
        }

        room.players.push(username.to_string());
        if (room.players.len() as u32) < room.max_players {
            debug!(target: "rooms", "{} joined room {} ({}/{})", username, room_id, room.players.len(), room.max_players);
            return Ok(JoinOutcome::Waiting(room.clone()));
        }

        let spec = LaunchSpec {
            room_id,
            game_name: room.game_name.clone(),
            version: room.version.clone(),
        };
        match launcher.launch(&spec) {
            Ok(process) => {
                room.state = RoomState::Playing {
                    port: process.port,
                    status: MatchStatus::Running,
                    started_at: Instant::now(),
                    ended_at: None,
                };
                info!(target: "rooms", "Room {} is full, match running on port {}", room_id, process.port);
                Ok(JoinOutcome::Started {
                    room: room.clone(),
                    process,
                })
            }
            Err(err) => {
                room.players.pop();
                Err(RoomErr::Launch(err.to_string()))
            }
        }
    }

    /// Leave a WAITING room. Returns the remaining room, or `None` if it was
    /// dropped because nobody is left.
    pub fn leave_room(&self, room_id: RoomId, username: &str) -> Result<Option<Room>, RoomErr> {
        let mut inner = self.lock();
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomErr::NotFound(room_id))?;
        if !room.is_waiting() {
            return Err(RoomErr::NotWaiting(room_id));
        }
        let Some(position) = room.players.iter().position(|p| p == username) else {
            return Err(RoomErr::NotMember(room_id));
        };

        room.players.remove(position);
        Ok(inner.settle_after_leave(room_id, username))
    }

    /// Take `username` out of whatever WAITING room they are in, as when their
    /// connection ends. Returns the room id they left.
    pub fn leave_waiting_room(&self, username: &str) -> Option<RoomId> {
        let mut inner = self.lock();
        let room_id = inner.waiting_room_of(username)?;
        if let Some(room) = inner.rooms.get_mut(&room_id) {
            room.players.retain(|p| p != username);
        }
        inner.settle_after_leave(room_id, username);
        debug!(target: "rooms", "{} removed from room {}", username, room_id);
        Some(room_id)
    }

    pub fn check_room(&self, room_id: RoomId) -> Option<Room> {
        self.lock().rooms.get(&room_id).cloned()
    }

    /// WAITING rooms, ordered by id.
    pub fn list_waiting(&self) -> Vec<Room> {
        self.lock()
            .rooms
            .values()
            .filter(|room| room.is_waiting())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the outcome of a room's match. Returns `false` if the room is gone
    /// or never started.
    pub fn set_match_status(&self, room_id: RoomId, new_status: MatchStatus) -> bool {
        let mut inner = self.lock();
        let Some(room) = inner.rooms.get_mut(&room_id) else {
            return false;
        };
        let RoomState::Playing {
            status, ended_at, ..
        } = &mut room.state
        else {
            return false;
        };

        if new_status != MatchStatus::Running && ended_at.is_none() {
            *ended_at = Some(Instant::now());
        }
        *status = new_status;
        true
    }

    /// Drop PLAYING rooms older than `policy.ttl` and ended ones past `policy.retire_grace`.
    pub fn retire_expired(&self, now: Instant, policy: &RoomConfig) -> Vec<RoomId> {
        let mut inner = self.lock();
        let expired: Vec<RoomId> = inner
            .rooms
            .values()
            .filter(|room| match &room.state {
                RoomState::Waiting => false,
                RoomState::Playing {
                    started_at,
                    ended_at,
                    ..
                } => {
                    now.saturating_duration_since(*started_at) >= policy.ttl
                        || ended_at.is_some_and(|ended| {
                            now.saturating_duration_since(ended) >= policy.retire_grace
                        })
                }
            })
            .map(|room| room.id)
            .collect();

        for room_id in &expired {
            inner.rooms.remove(room_id);
        }
        expired
    }
}

/// Periodically retire rooms according to `policy`.
pub fn spawn_room_sweeper(rooms: Arc<RoomTable>, policy: RoomConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(policy.sweep_interval);
        loop {
            interval.tick().await;
            let retired = rooms.retire_expired(Instant::now(), &policy);
            if !retired.is_empty() {
                info!(target: "rooms", "Retired rooms {:?}, {} left", retired, rooms.len());
            }
        }
    })
}

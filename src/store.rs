//! Persistence boundary of the lobby.
//!
//! Each trait method is one acquire-commit-release cycle against the backing
//! store. Composing two calls for one user-visible action is not atomic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::lobby_errors::LobbyErr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Developer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Developer => "developer",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "player" => Ok(Role::Player),
            "developer" => Ok(Role::Developer),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub role: Role,
}

/// Largest room a game may ask for.
pub const MAX_PLAYERS_LIMIT: u32 = 64;

/// One catalog row as the lobby sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub max_players: u32,
    pub archive_path: String,
    pub client_archive_path: String,
}

/// Catalog row plus the rating aggregate computed at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameListing {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub max_players: u32,
    pub avg_rating: Option<f64>,
    pub review_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub game_name: String,
    pub username: String,
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub game_name: String,
    pub username: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Added,
    /// The user had reviewed the game before; the old review was replaced.
    Replaced,
    /// No play history for (user, game).
    NotEligible,
    GameNotFound,
}

#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    /// `false` if the username is taken.
    async fn register(&self, username: &str, password: &str, role: Role) -> Result<bool, LobbyErr>;
    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<Account>, LobbyErr>;

    /// `false` if a game with that name exists.
    async fn add_game(&self, game: &GameRecord) -> Result<bool, LobbyErr>;
    /// `false` if no game with that name exists.
    async fn update_game(&self, game: &GameRecord) -> Result<bool, LobbyErr>;
    /// Removes the catalog row only; reviews and play history stay.
    async fn delete_game(&self, name: &str) -> Result<bool, LobbyErr>;
    async fn find_game(&self, name: &str) -> Result<Option<GameRecord>, LobbyErr>;
    async fn list_games(&self) -> Result<Vec<GameListing>, LobbyErr>;
    async fn list_games_by_author(&self, author: &str) -> Result<Vec<GameListing>, LobbyErr>;

    /// Idempotent.
    async fn record_play(&self, username: &str, game_name: &str) -> Result<(), LobbyErr>;
    async fn has_played(&self, username: &str, game_name: &str) -> Result<bool, LobbyErr>;
    async fn add_review(&self, review: &NewReview) -> Result<ReviewOutcome, LobbyErr>;
    async fn get_reviews(&self, game_name: &str) -> Result<Vec<ReviewRecord>, LobbyErr>;
}

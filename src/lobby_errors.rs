use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transfer::ArchiveErr;

/// Errors that end a client session. Everything a client can recover from is
/// answered with a `FAIL` response instead.
#[derive(Debug, Error)]
pub enum LobbyErr {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveErr),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine readable reason attached to every `FAIL` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailReason {
    InvalidRequest,
    UnknownAction,
    InvalidCredentials,
    AlreadyRegistered,
    AlreadyLoggedIn,
    NotAuthenticated,
    NotAuthorized,
    NotFound,
    NameTaken,
    RoomFull,
    RoomNotWaiting,
    AlreadyInRoom,
    NotEligible,
    InvalidArchive,
    MatchFailed,
    LaunchFailed,
    Internal,
}

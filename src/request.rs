use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::lobby_errors::{FailReason, LobbyErr};

/// Every action the lobby understands, as sent in the `action` field.
pub const KNOWN_ACTIONS: &[&str] = &[
    "REGISTER",
    "LOGIN",
    "LOGOUT",
    "UPLOAD",
    "UPDATE_GAME",
    "DELETE_GAME",
    "LIST_GAMES",
    "LIST_MY_GAMES",
    "GAME_INFO",
    "DOWNLOAD",
    "CREATE_ROOM",
    "JOIN_ROOM",
    "LEAVE_ROOM",
    "CHECK_ROOM",
    "LIST_ROOMS",
    "SUBMIT_REVIEW",
    "GET_REVIEWS",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Register(RegisterRequest),
    Login(LoginRequest),
    Logout,
    Upload(UploadRequest),
    UpdateGame(UploadRequest),
    DeleteGame(GameNameRequest),
    ListGames,
    ListMyGames,
    GameInfo(GameNameRequest),
    Download(GameRefRequest),
    CreateRoom(GameRefRequest),
    JoinRoom(RoomRequest),
    LeaveRoom(RoomRequest),
    CheckRoom(RoomRequest),
    ListRooms,
    SubmitReview(ReviewRequest),
    GetReviews(GameNameRequest),
}

#[derive(Debug)]
pub enum RequestErr {
    /// Not a JSON object at all; the peer is not speaking the protocol.
    Malformed(String),
    UnknownAction(String),
    InvalidFields(String),
}

impl Request {
    pub fn from_frame(frame: &[u8]) -> Result<Self, RequestErr> {
        let value: Value = serde_json::from_slice(frame)
            .map_err(|err| RequestErr::Malformed(format!("frame is not valid JSON: {}", err)))?;
        let Value::Object(ref object) = value else {
            return Err(RequestErr::Malformed("frame is not a JSON object".to_string()));
        };

        let action = match object.get("action") {
            Some(Value::String(action)) => action.clone(),
            Some(other) => return Err(RequestErr::UnknownAction(other.to_string())),
            None => return Err(RequestErr::UnknownAction(String::new())),
        };
        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            return Err(RequestErr::UnknownAction(action));
        }

        serde_json::from_value(value)
            .map_err(|err| RequestErr::InvalidFields(format!("{}: {}", action, err)))
    }

    #[cfg(test)]
    pub fn action(&self) -> &'static str {
        match self {
            Request::Register(_) => "REGISTER",
            Request::Login(_) => "LOGIN",
            Request::Logout => "LOGOUT",
            Request::Upload(_) => "UPLOAD",
            Request::UpdateGame(_) => "UPDATE_GAME",
            Request::DeleteGame(_) => "DELETE_GAME",
            Request::ListGames => "LIST_GAMES",
            Request::ListMyGames => "LIST_MY_GAMES",
            Request::GameInfo(_) => "GAME_INFO",
            Request::Download(_) => "DOWNLOAD",
            Request::CreateRoom(_) => "CREATE_ROOM",
            Request::JoinRoom(_) => "JOIN_ROOM",
            Request::LeaveRoom(_) => "LEAVE_ROOM",
            Request::CheckRoom(_) => "CHECK_ROOM",
            Request::ListRooms => "LIST_ROOMS",
            Request::SubmitReview(_) => "SUBMIT_REVIEW",
            Request::GetReviews(_) => "GET_REVIEWS",
        }
    }
}

#[derive(Clone, PartialEq, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't log the password
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Clone, PartialEq, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Control message of `UPLOAD` and `UPDATE_GAME`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadRequest {
    pub game_name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(deserialize_with = "de_lenient")]
    pub size: u64,
    #[serde(deserialize_with = "de_lenient", default = "default_max_players")]
    pub max_players: u32,
}

fn default_max_players() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameNameRequest {
    pub game_name: String,
}

/// Older clients address games through `game_id`, which carries the game name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameRefRequest {
    #[serde(alias = "game_id")]
    pub game_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomRequest {
    #[serde(deserialize_with = "de_lenient")]
    pub room_id: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewRequest {
    pub game_name: String,
    #[serde(deserialize_with = "de_lenient")]
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// Accepts a number either as a JSON number or as a numeric string.
fn de_lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<T> {
        Value(T),
        Text(String),
    }

    match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Value(value) => Ok(value),
        Lenient::Text(text) => text.trim().parse().map_err(de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Fail,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailReason>,
    #[serde(flatten)]
    pub payload: IndexMap<String, Value>,
}

impl Response {
    fn new(status: Status, message: Option<String>, reason: Option<FailReason>) -> Self {
        Self {
            status,
            message,
            reason,
            payload: IndexMap::new(),
        }
    }

    pub fn success() -> Self {
        Self::new(Status::Success, None, None)
    }

    pub fn success_msg(message: impl Into<String>) -> Self {
        Self::new(Status::Success, Some(message.into()), None)
    }

    pub fn fail(reason: FailReason, message: impl Into<String>) -> Self {
        Self::new(Status::Fail, Some(message.into()), Some(reason))
    }

    pub fn ready() -> Self {
        Self::new(Status::Ready, None, None)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn with_serialized<T: Serialize>(self, key: &str, value: &T) -> Result<Self, LobbyErr> {
        let value = serde_json::to_value(value)?;
        Ok(self.with(key, value))
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

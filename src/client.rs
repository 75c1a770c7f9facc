//! Client side of the lobby protocol, used by front-ends and tests.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::lobby_errors::LobbyErr;
use crate::packet::{recv_json, send_json, FrameCodec, LobbyFramed, LobbyStream};
use crate::request::{Response, Status};
use crate::rooms::RoomId;
use crate::store::{GameListing, Role};
use crate::transfer::{extract_archive, receive_to_file, run_blocking, stream_file};

/// Metadata sent along with an uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameUpload {
    pub game_name: String,
    pub version: String,
    pub description: String,
    pub max_players: u32,
}

pub struct LobbyClient<S> {
    framed: LobbyFramed<S>,
    username: Option<String>,
}

impl LobbyClient<TcpStream> {
    pub async fn connect(addr: &str) -> Result<Self, LobbyErr> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S: LobbyStream> LobbyClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec::new()),
            username: None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Send one JSON request and wait for its response.
    pub async fn request(&mut self, body: Value) -> Result<Response, LobbyErr> {
        send_json(&mut self.framed, &body).await?;
        recv_json(&mut self.framed).await
    }

    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Response, LobbyErr> {
        self.request(json!({
            "action": "REGISTER",
            "username": username,
            "password": password,
            "role": role.as_str(),
        }))
        .await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Response, LobbyErr> {
        let rsp = self
            .request(json!({"action": "LOGIN", "username": username, "password": password}))
            .await?;
        if rsp.is_success() {
            self.username = Some(username.to_string());
        }
        Ok(rsp)
    }

    pub async fn logout(&mut self) -> Result<Response, LobbyErr> {
        let rsp = self.request(json!({"action": "LOGOUT"})).await?;
        if rsp.is_success() {
            self.username = None;
        }
        Ok(rsp)
    }

    /// `UPLOAD` (or `UPDATE_GAME` with `update`) of the zip at `archive`.
    pub async fn upload_game(
        &mut self,
        game: &GameUpload,
        archive: &Path,
        update: bool,
    ) -> Result<Response, LobbyErr> {
        let size = tokio::fs::metadata(archive).await?.len();
        let filename = archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let action = if update { "UPDATE_GAME" } else { "UPLOAD" };
        let ready = self
            .request(json!({
                "action": action,
                "game_name": game.game_name,
                "version": game.version,
                "description": game.description,
                "filename": filename,
                "size": size,
                "max_players": game.max_players,
            }))
            .await?;
        if ready.status != Status::Ready {
            return Ok(ready);
        }

        stream_file(&mut self.framed, archive, size).await?;
        recv_json(&mut self.framed).await
    }

    /// Download a game's player archive and install it at
    /// `<downloads>/<username>/<game_name>/`, replacing an older install.
    ///
    /// The lobby's `FAIL` response is handed back as `Ok(Err(..))`.
    pub async fn download_game(
        &mut self,
        game_name: &str,
        downloads: &Path,
    ) -> Result<Result<PathBuf, Response>, LobbyErr> {
        let announce = self
            .request(json!({"action": "DOWNLOAD", "game_id": game_name}))
            .await?;
        if !announce.is_success() {
            return Ok(Err(announce));
        }
        let size = announce
            .get("size")
            .and_then(Value::as_u64)
            .ok_or_else(|| LobbyErr::Protocol("download announcement without size".to_string()))?;

        let user_dir = downloads.join(self.username.as_deref().unwrap_or("anonymous"));
        tokio::fs::create_dir_all(&user_dir).await?;
        let partial = user_dir.join(format!(".{}.zip.part", game_name));
        receive_to_file(&mut self.framed, size, &partial).await?;

        let install_dir = user_dir.join(game_name);
        let target = install_dir.clone();
        let archive = partial.clone();
        let installed = run_blocking(move || {
            if target.exists() {
                std::fs::remove_dir_all(&target)?;
            }
            extract_archive(&archive, &target)
        })
        .await?;
        tokio::fs::remove_file(&partial).await?;
        installed?;

        debug!(target: "transfer", "Installed {} into {}", game_name, install_dir.display());
        Ok(Ok(install_dir))
    }

    pub async fn list_games(&mut self) -> Result<Vec<GameListing>, LobbyErr> {
        let rsp = self.request(json!({"action": "LIST_GAMES"})).await?;
        let games = rsp.get("games").cloned().unwrap_or(Value::Array(Vec::new()));
        Ok(serde_json::from_value(games)?)
    }

    pub async fn create_room(&mut self, game_name: &str) -> Result<Response, LobbyErr> {
        self.request(json!({"action": "CREATE_ROOM", "game_id": game_name}))
            .await
    }

    pub async fn join_room(&mut self, room_id: RoomId) -> Result<Response, LobbyErr> {
        self.request(json!({"action": "JOIN_ROOM", "room_id": room_id}))
            .await
    }

    pub async fn leave_room(&mut self, room_id: RoomId) -> Result<Response, LobbyErr> {
        self.request(json!({"action": "LEAVE_ROOM", "room_id": room_id}))
            .await
    }

    pub async fn check_room(&mut self, room_id: RoomId) -> Result<Response, LobbyErr> {
        self.request(json!({"action": "CHECK_ROOM", "room_id": room_id}))
            .await
    }

    pub async fn list_rooms(&mut self) -> Result<Response, LobbyErr> {
        self.request(json!({"action": "LIST_ROOMS"})).await
    }

    pub async fn submit_review(
        &mut self,
        game_name: &str,
        rating: u8,
        comment: &str,
    ) -> Result<Response, LobbyErr> {
        self.request(json!({
            "action": "SUBMIT_REVIEW",
            "game_name": game_name,
            "rating": rating,
            "comment": comment,
        }))
        .await
    }

    pub async fn get_reviews(&mut self, game_name: &str) -> Result<Response, LobbyErr> {
        self.request(json!({"action": "GET_REVIEWS", "game_name": game_name}))
            .await
    }
}

/// Suggest the version after `current`: the last dot-separated component is
/// incremented if numeric, otherwise `current` is returned unchanged.
pub fn suggest_next_version(current: &str) -> String {
    let (head, last) = match current.rsplit_once('.') {
        Some((head, last)) => (Some(head), last),
        None => (None, current),
    };
    let Ok(number) = last.parse::<u64>() else {
        return current.to_string();
    };
    match head {
        Some(head) => format!("{}.{}", head, number + 1),
        None => (number + 1).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_version_increments_the_last_number() {
        assert_eq!(suggest_next_version("1.0.0"), "1.0.1");
        assert_eq!(suggest_next_version("2.9"), "2.10");
        assert_eq!(suggest_next_version("7"), "8");
    }

    #[test]
    fn next_version_leaves_non_numeric_tails_alone() {
        assert_eq!(suggest_next_version("1.0.beta"), "1.0.beta");
        assert_eq!(suggest_next_version("release"), "release");
        assert_eq!(suggest_next_version("1.0."), "1.0.");
    }
}

use std::path::PathBuf;
use tracing::info;

use crate::lobby_errors::{FailReason, LobbyErr};
use crate::packet::{send_json, LobbyFramed, LobbyStream};
use crate::request::{GameRefRequest, Response};
use crate::session::ClientSession;
use crate::transfer::stream_file;

/// Announces `{status, size}` and streams the player archive right after it.
/// Nothing else is sent on success.
pub async fn hdl_download<S: LobbyStream>(
    session: &mut ClientSession,
    framed: &mut LobbyFramed<S>,
    rq: GameRefRequest,
) -> Result<Option<Response>, LobbyErr> {
    let Some(game) = session.sstate.store.find_game(&rq.game_name).await? else {
        return Ok(Some(Response::fail(
            FailReason::NotFound,
            format!("Game '{}' does not exist", rq.game_name),
        )));
    };

    let archive = PathBuf::from(&game.client_archive_path);
    let size = match tokio::fs::metadata(&archive).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
        _ => {
            return Ok(Some(Response::fail(
                FailReason::NotFound,
                format!("No archive available for '{}'", game.name),
            )))
        }
    };

    let announce = Response::success()
        .with("size", size)
        .with("game_name", game.name.as_str())
        .with("version", game.version.as_str());
    send_json(framed, &announce).await?;
    stream_file(framed, &archive, size).await?;

    info!(target: "transfer", "{} v{} ({} bytes) sent to {}", game.name, game.version, size, session.con);
    Ok(None)
}

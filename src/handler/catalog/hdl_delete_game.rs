use tracing::{info, warn};

use crate::lobby_errors::{FailReason, LobbyErr};
use crate::request::{GameNameRequest, Response};
use crate::session::ClientSession;
use crate::transfer::{remove_game_files, run_blocking};

/// Removes the catalog row and every file of the game. Reviews and play
/// history stay behind.
pub async fn hdl_delete_game(
    session: &mut ClientSession,
    rq: GameNameRequest,
) -> Result<Response, LobbyErr> {
    let account = match session.require_developer() {
        Ok(account) => account.clone(),
        Err(rsp) => return Ok(rsp),
    };
    let sstate = session.sstate.clone();

    let _catalog = sstate.catalog_lock.lock().await;
    let Some(game) = sstate.store.find_game(&rq.game_name).await? else {
        return Ok(Response::fail(
            FailReason::NotFound,
            format!("Game '{}' does not exist", rq.game_name),
        ));
    };
    if game.author != account.username {
        return Ok(Response::fail(
            FailReason::NotAuthorized,
            format!("Only {} can delete '{}'", game.author, game.name),
        ));
    }

    if !sstate.store.delete_game(&game.name).await? {
        return Ok(Response::fail(
            FailReason::NotFound,
            format!("Game '{}' does not exist", game.name),
        ));
    }

    let layout = sstate.layout.clone();
    let name = game.name.clone();
    if let Err(err) = run_blocking(move || remove_game_files(&layout, &name)).await? {
        warn!(target: "catalog", "Files of {} could not be removed: {}", game.name, err);
    }

    info!(target: "catalog", "{} deleted by {}", game.name, account.username);
    Ok(Response::success_msg(format!("Game '{}' deleted", game.name)))
}

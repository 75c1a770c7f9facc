use crate::lobby_errors::{FailReason, LobbyErr};
use crate::request::{GameNameRequest, Response};
use crate::session::ClientSession;

pub async fn hdl_list_games(session: &mut ClientSession) -> Result<Response, LobbyErr> {
    let games = session.sstate.store.list_games().await?;
    Response::success().with_serialized("games", &games)
}

pub async fn hdl_list_my_games(session: &mut ClientSession) -> Result<Response, LobbyErr> {
    let author = match session.require_account() {
        Ok(account) => account.username.clone(),
        Err(rsp) => return Ok(rsp),
    };
    let games = session.sstate.store.list_games_by_author(&author).await?;
    Response::success().with_serialized("games", &games)
}

pub async fn hdl_game_info(
    session: &mut ClientSession,
    rq: GameNameRequest,
) -> Result<Response, LobbyErr> {
    let listing = session
        .sstate
        .store
        .list_games()
        .await?
        .into_iter()
        .find(|game| game.name == rq.game_name);

    match listing {
        Some(game) => Response::success().with_serialized("game", &game),
        None => Ok(Response::fail(
            FailReason::NotFound,
            format!("Game '{}' does not exist", rq.game_name),
        )),
    }
}

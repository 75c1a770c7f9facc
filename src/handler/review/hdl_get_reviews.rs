use crate::lobby_errors::LobbyErr;
use crate::request::{GameNameRequest, Response};
use crate::session::ClientSession;

/// Reviews are kept after a game is deleted, so this does not require the game to exist.
pub async fn hdl_get_reviews(
    session: &mut ClientSession,
    rq: GameNameRequest,
) -> Result<Response, LobbyErr> {
    let reviews = session.sstate.store.get_reviews(&rq.game_name).await?;
    Response::success()
        .with("game_name", rq.game_name.as_str())
        .with_serialized("reviews", &reviews)
}

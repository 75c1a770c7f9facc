use tracing::info;

use crate::lobby_errors::{FailReason, LobbyErr};
use crate::request::{GameRefRequest, Response};
use crate::rooms::GameSnapshot;
use crate::session::ClientSession;

pub async fn hdl_create_room(
    session: &mut ClientSession,
    rq: GameRefRequest,
) -> Result<Response, LobbyErr> {
    let owner = match session.require_account() {
        Ok(account) => account.username.clone(),
        Err(rsp) => return Ok(rsp),
    };
    let sstate = session.sstate.clone();

    let Some(game) = sstate.store.find_game(&rq.game_name).await? else {
        return Ok(Response::fail(
            FailReason::NotFound,
            format!("Game '{}' does not exist", rq.game_name),
        ));
    };

    let room = match sstate.rooms.create_room(&GameSnapshot::from(&game), &owner) {
        Ok(room) => room,
        Err(err) => return Ok(Response::fail(err.reason(), err.to_string())),
    };
    // The creator is the first participant
    sstate.store.record_play(&owner, &room.game_name).await?;

    info!(target: "rooms", "{} opened room {} for {} v{}", owner, room.id, room.game_name, room.version);
    Ok(Response::success_msg(format!("Room {} created", room.id))
        .with("room_id", room.id)
        .with("game_name", room.game_name.as_str())
        .with("version", room.version.as_str())
        .with("max_players", room.max_players))
}

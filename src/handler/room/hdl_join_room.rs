use tracing::info;

use crate::handler::room::{with_match_address, with_membership};
use crate::lobby_errors::LobbyErr;
use crate::orchestrator::supervise;
use crate::request::{Response, RoomRequest};
use crate::rooms::JoinOutcome;
use crate::session::ClientSession;

pub async fn hdl_join_room(session: &mut ClientSession, rq: RoomRequest) -> Result<Response, LobbyErr> {
    let username = match session.require_account() {
        Ok(account) => account.username.clone(),
        Err(rsp) => return Ok(rsp),
    };
    let sstate = session.sstate.clone();

    let outcome = match sstate
        .rooms
        .join_room(rq.room_id, &username, sstate.launcher.as_ref())
    {
        Ok(outcome) => outcome,
        Err(err) => return Ok(Response::fail(err.reason(), err.to_string())),
    };

    let rsp = match outcome {
        JoinOutcome::Waiting(room) => {
            sstate.store.record_play(&username, &room.game_name).await?;
            info!(target: "rooms", "{} joined room {}", username, room.id);
            with_membership(Response::success_msg(format!("Joined room {}", room.id)), &room)
        }
        JoinOutcome::Started { room, process } => {
            supervise(process, room.id, sstate.rooms.clone());
            sstate.store.record_play(&username, &room.game_name).await?;
            info!(target: "rooms", "{} joined room {}, match started", username, room.id);
            with_match_address(
                Response::success_msg(format!("Joined room {}, game starting", room.id))
                    .with("room_id", room.id),
                &room,
                &sstate,
            )
        }
    };
    Ok(rsp)
}

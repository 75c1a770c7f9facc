use tracing::info;

use crate::request::{Response, RoomRequest};
use crate::session::ClientSession;

pub fn hdl_leave_room(session: &mut ClientSession, rq: RoomRequest) -> Response {
    let username = match session.require_account() {
        Ok(account) => account.username.clone(),
        Err(rsp) => return rsp,
    };

    match session.sstate.rooms.leave_room(rq.room_id, &username) {
        Ok(Some(room)) => {
            info!(target: "rooms", "{} left room {}", username, room.id);
            Response::success_msg(format!("Left room {}", room.id))
        }
        Ok(None) => {
            info!(target: "rooms", "{} left room {}, room closed", username, rq.room_id);
            Response::success_msg(format!("Left room {}, room closed", rq.room_id))
        }
        Err(err) => Response::fail(err.reason(), err.to_string()),
    }
}

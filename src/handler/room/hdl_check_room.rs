use crate::handler::room::{with_match_address, with_membership};
use crate::lobby_errors::FailReason;
use crate::request::{Response, RoomRequest};
use crate::rooms::{MatchStatus, RoomState};
use crate::session::ClientSession;

/// Poll a room: membership while WAITING, the match address once PLAYING.
pub fn hdl_check_room(session: &mut ClientSession, rq: RoomRequest) -> Response {
    let Some(room) = session.sstate.rooms.check_room(rq.room_id) else {
        return Response::fail(
            FailReason::NotFound,
            format!("Room {} does not exist", rq.room_id),
        );
    };

    match &room.state {
        RoomState::Waiting => with_membership(Response::success(), &room),
        RoomState::Playing {
            status: MatchStatus::Failed { reason },
            ..
        } => Response::fail(
            FailReason::MatchFailed,
            format!("Match of room {} failed: {}", room.id, reason),
        )
        .with("room_id", room.id),
        RoomState::Playing { .. } => {
            with_match_address(Response::success().with("room_id", room.id), &room, &session.sstate)
        }
    }
}

mod hdl_create_room;
pub use hdl_create_room::hdl_create_room;

mod hdl_join_room;
pub use hdl_join_room::hdl_join_room;

mod hdl_leave_room;
pub use hdl_leave_room::hdl_leave_room;

mod hdl_check_room;
pub use hdl_check_room::hdl_check_room;

mod hdl_list_rooms;
pub use hdl_list_rooms::hdl_list_rooms;

use crate::request::Response;
use crate::rooms::{MatchStatus, Room};
use crate::sharedstate::SharedState;

/// `game_start: true` plus where to find the match server.
fn with_match_address(rsp: Response, room: &Room, sstate: &SharedState) -> Response {
    let port = room.port().unwrap_or_default();
    let status = room.match_status().map(MatchStatus::as_str).unwrap_or("RUNNING");
    rsp.with("game_start", true)
        .with("game_ip", sstate.config.public_host.as_str())
        .with("game_port", port)
        .with("game_name", room.game_name.as_str())
        .with("version", room.version.as_str())
        .with("match_status", status)
}

/// `game_start: false` plus the current membership.
fn with_membership(rsp: Response, room: &Room) -> Response {
    rsp.with("game_start", false)
        .with("room_id", room.id)
        .with("game_name", room.game_name.as_str())
        .with("version", room.version.as_str())
        .with("owner", room.owner.as_str())
        .with("players", room.players.clone())
        .with("max_players", room.max_players)
}

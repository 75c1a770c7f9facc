use serde_json::json;

use crate::request::Response;
use crate::session::ClientSession;

pub fn hdl_list_rooms(session: &mut ClientSession) -> Response {
    let rooms: Vec<_> = session
        .sstate
        .rooms
        .list_waiting()
        .into_iter()
        .map(|room| {
            json!({
                "room_id": room.id,
                "game_name": room.game_name,
                "version": room.version,
                "owner": room.owner,
                "players": room.players,
                "max_players": room.max_players,
            })
        })
        .collect();
    Response::success().with("rooms", rooms)
}

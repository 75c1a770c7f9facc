pub mod account;
pub mod catalog;
pub mod review;
pub mod room;

#[cfg(test)]
mod tests;

use crate::lobby_errors::LobbyErr;
use crate::packet::{LobbyFramed, LobbyStream};
use crate::request::{Request, Response};
use crate::session::ClientSession;

use account::{hdl_login, hdl_logout, hdl_register};
use catalog::{
    hdl_delete_game, hdl_download, hdl_game_info, hdl_list_games, hdl_list_my_games, hdl_upload,
    UploadKind,
};
use review::{hdl_get_reviews, hdl_submit_review};
use room::{hdl_check_room, hdl_create_room, hdl_join_room, hdl_leave_room, hdl_list_rooms};

/// Route one decoded request to its handler.
///
/// Returns the response to send, or `None` when the handler already wrote
/// everything itself (downloads). An `Err` ends the session.
pub async fn dispatch<S: LobbyStream>(
    request: Request,
    framed: &mut LobbyFramed<S>,
    session: &mut ClientSession,
) -> Result<Option<Response>, LobbyErr> {
    if !matches!(request, Request::Register(_) | Request::Login(_)) {
        if let Err(rsp) = session.require_account() {
            return Ok(Some(rsp));
        }
    }

    let rsp = match request {
        Request::Register(rq) => hdl_register(session, rq).await?,
        Request::Login(rq) => hdl_login(session, rq).await?,
        Request::Logout => hdl_logout(session),
        Request::Upload(rq) => hdl_upload(session, framed, rq, UploadKind::New).await?,
        Request::UpdateGame(rq) => hdl_upload(session, framed, rq, UploadKind::Update).await?,
        Request::DeleteGame(rq) => hdl_delete_game(session, rq).await?,
        Request::ListGames => hdl_list_games(session).await?,
        Request::ListMyGames => hdl_list_my_games(session).await?,
        Request::GameInfo(rq) => hdl_game_info(session, rq).await?,
        Request::Download(rq) => return hdl_download(session, framed, rq).await,
        Request::CreateRoom(rq) => hdl_create_room(session, rq).await?,
        Request::JoinRoom(rq) => hdl_join_room(session, rq).await?,
        Request::LeaveRoom(rq) => hdl_leave_room(session, rq),
        Request::CheckRoom(rq) => hdl_check_room(session, rq),
        Request::ListRooms => hdl_list_rooms(session),
        Request::SubmitReview(rq) => hdl_submit_review(session, rq).await?,
        Request::GetReviews(rq) => hdl_get_reviews(session, rq).await?,
    };
    Ok(Some(rsp))
}

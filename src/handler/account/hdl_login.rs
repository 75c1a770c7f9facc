use tracing::info;

use crate::lobby_errors::{FailReason, LobbyErr};
use crate::request::{LoginRequest, Response};
use crate::session::ClientSession;

pub async fn hdl_login(session: &mut ClientSession, rq: LoginRequest) -> Result<Response, LobbyErr> {
    if let Some(account) = session.account() {
        return Ok(Response::fail(
            FailReason::AlreadyLoggedIn,
            format!("Already logged in as {}", account.username),
        ));
    }

    let Some(account) = session
        .sstate
        .store
        .authenticate(&rq.username, &rq.password)
        .await?
    else {
        info!(target: "auth", "Login failed for {} via {}", rq.username, session.con);
        return Ok(Response::fail(
            FailReason::InvalidCredentials,
            "Invalid username or password",
        ));
    };

    // Checked after the credentials: a wrong password never learns who is online
    let Some(guard) = session.sstate.online.try_login(&account.username, &session.con) else {
        return Ok(Response::fail(
            FailReason::AlreadyLoggedIn,
            "User is already logged in from another connection",
        ));
    };

    info!(target: "auth", "Login successful for user: {} ({})", account.username, account.role);
    let rsp = Response::success_msg("Login successful").with_serialized("user", &account)?;
    session.sign_in(account, guard);
    Ok(rsp)
}

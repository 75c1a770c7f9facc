use tracing::info;

use crate::lobby_errors::{FailReason, LobbyErr};
use crate::request::{RegisterRequest, Response};
use crate::session::ClientSession;
use crate::store::Role;
use crate::utils::data_validation::password::password_validate;
use crate::utils::data_validation::username::username_validate;

pub async fn hdl_register(
    session: &mut ClientSession,
    rq: RegisterRequest,
) -> Result<Response, LobbyErr> {
    if let Err(err) = username_validate(&rq.username) {
        return Ok(Response::fail(FailReason::InvalidRequest, err.to_string()));
    }
    if let Err(err) = password_validate(&rq.password) {
        return Ok(Response::fail(FailReason::InvalidRequest, err.to_string()));
    }
    let role = match rq.role.as_deref().unwrap_or("player").parse::<Role>() {
        Ok(role) => role,
        Err(msg) => return Ok(Response::fail(FailReason::InvalidRequest, msg)),
    };

    if !session
        .sstate
        .store
        .register(&rq.username, &rq.password, role)
        .await?
    {
        return Ok(Response::fail(
            FailReason::AlreadyRegistered,
            "Username already exists",
        ));
    }

    info!(target: "auth", "Registered {} as {}", rq.username, role);
    Ok(Response::success_msg("Registration successful"))
}

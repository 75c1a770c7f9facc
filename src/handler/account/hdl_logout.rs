use tracing::info;

use crate::request::Response;
use crate::session::ClientSession;

pub fn hdl_logout(session: &mut ClientSession) -> Response {
    if let Some(account) = session.sign_out() {
        info!(target: "auth", "{} logged out", account.username);
    }
    Response::success_msg("Logged out")
}

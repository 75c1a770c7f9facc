use std::io;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::client_connection::ClientConnectionDescriptor;
use crate::handler::dispatch;
use crate::lobby_errors::{FailReason, LobbyErr};
use crate::packet::{send_json, FrameCodec, LobbyFramed, LobbyStream};
use crate::registry::OnlineGuard;
use crate::request::{Request, RequestErr, Response};
use crate::sharedstate::SharedState;
use crate::store::{Account, Role};

/// Per-connection state. Dropping it releases the online registry entry.
pub struct ClientSession {
    pub con: ClientConnectionDescriptor,
    pub sstate: Arc<SharedState>,
    account: Option<Account>,
    online_guard: Option<OnlineGuard>,
}

impl ClientSession {
    pub fn new(con: ClientConnectionDescriptor, sstate: Arc<SharedState>) -> Self {
        Self {
            con,
            sstate,
            account: None,
            online_guard: None,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// The logged in account, or the `FAIL` response to send instead.
    pub fn require_account(&self) -> Result<&Account, Response> {
        self.account
            .as_ref()
            .ok_or_else(|| Response::fail(FailReason::NotAuthenticated, "Please log in first"))
    }

    pub fn require_developer(&self) -> Result<&Account, Response> {
        let account = self.require_account()?;
        if account.role != Role::Developer {
            return Err(Response::fail(
                FailReason::NotAuthorized,
                "Only developers can manage games",
            ));
        }
        Ok(account)
    }

    pub fn sign_in(&mut self, account: Account, guard: OnlineGuard) {
        self.account = Some(account);
        self.online_guard = Some(guard);
    }

    /// Leave any WAITING room, then release the online entry. The room goes
    /// first so a fresh login cannot race with the cleanup.
    pub fn sign_out(&mut self) -> Option<Account> {
        let account = self.account.take()?;
        if let Some(room_id) = self.sstate.rooms.leave_waiting_room(&account.username) {
            debug!(target: "rooms", "{} left room {} on sign out", account.username, room_id);
        }
        self.online_guard = None;
        Some(account)
    }
}

/// Drive one client connection until it closes or violates the protocol.
pub async fn run_session<S: LobbyStream>(
    stream: S,
    con: ClientConnectionDescriptor,
    sstate: Arc<SharedState>,
) {
    info!(target: "lobby", "Accepted connection from {}", con);
    let mut framed = Framed::new(stream, FrameCodec::new());
    let mut session = ClientSession::new(con.clone(), sstate);

    match serve(&mut framed, &mut session).await {
        Ok(()) => {}
        Err(LobbyErr::Transport(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
            debug!(target: "lobby", "{} went away mid-exchange", con);
        }
        Err(err) => warn!(target: "lobby", "Closing {}: {}", con, err),
    }

    if let Some(account) = session.sign_out() {
        info!(target: "auth", "{} logged out by disconnect", account.username);
    }
    info!(target: "lobby", "Connection closed from {}", con);
}

async fn serve<S: LobbyStream>(
    framed: &mut LobbyFramed<S>,
    session: &mut ClientSession,
) -> Result<(), LobbyErr> {
    while let Some(frame) = framed.next().await {
        let frame = frame?;

        let request = match Request::from_frame(&frame) {
            Ok(request) => request,
            Err(RequestErr::Malformed(msg)) => return Err(LobbyErr::Protocol(msg)),
            Err(RequestErr::UnknownAction(action)) => {
                debug!(target: "lobby", "[{}->SERVER]: unknown action {:?}", session.con, action);
                let rsp = Response::fail(
                    FailReason::UnknownAction,
                    format!("Unknown action: {}", action),
                );
                send_json(framed, &rsp).await?;
                continue;
            }
            Err(RequestErr::InvalidFields(msg)) => {
                debug!(target: "lobby", "[{}->SERVER]: invalid request: {}", session.con, msg);
                send_json(framed, &Response::fail(FailReason::InvalidRequest, msg)).await?;
                continue;
            }
        };

        debug!(target: "lobby", "[{}->SERVER]: {:?}", session.con, request);
        if let Some(rsp) = dispatch(request, framed, session).await? {
            debug!(target: "lobby", "[SERVER=>{}]: {:?}", session.con, rsp);
            send_json(framed, &rsp).await?;
        }
    }
    Ok(())
}

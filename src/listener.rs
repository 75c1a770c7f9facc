use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::client_connection::ClientConnectionDescriptor;
use crate::lobby_errors::LobbyErr;
use crate::session::run_session;
use crate::sharedstate::SharedState;

pub struct Listener;

impl Listener {
    /// Bind `addr:port` and serve every accepted connection on its own task.
    /// Returns the bound port (useful with port 0) and the accept loop's handle.
    pub async fn start_tcp(
        addr: &str,
        port: u16,
        shared_state: Arc<SharedState>,
    ) -> Result<(u16, tokio::task::JoinHandle<()>), LobbyErr> {
        let listener = TcpListener::bind(format!("{}:{}", addr, port)).await?;
        let local_port = listener.local_addr()?.port();
        info!(target: "lobby", "TCP listener started on {}:{}", addr, local_port);

        let connection_ids = AtomicU64::new(1);
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, peer)) => {
                        let _ = socket.set_nodelay(true);
                        let con = ClientConnectionDescriptor::from_peer(
                            connection_ids.fetch_add(1, Ordering::Relaxed),
                            local_port,
                            peer,
                        );
                        let shared_state = shared_state.clone();
                        tokio::spawn(async move {
                            run_session(socket, con, shared_state).await;
                        });
                    }
                    Err(err) => warn!(target: "lobby", "Failed to accept connection: {}", err),
                }
            }
        });
        Ok((local_port, handle))
    }
}

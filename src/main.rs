use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gamestore_lobby::config::LobbyConfig;
use gamestore_lobby::listener::Listener;
use gamestore_lobby::rooms::spawn_room_sweeper;
use gamestore_lobby::sharedstate::SharedState;

#[tokio::main]
async fn main() {
    // Load configuration (before tracing, so LOBBY_LOG may come from .env)
    dotenv::dotenv().ok();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("LOBBY_LOG"))
        .init();

    let config = LobbyConfig::from_env();
    info!(
        target: "args",
        "Uploads in {}, match servers via {} {}",
        config.upload_dir.display(),
        config.matches.program,
        config.matches.entry.as_deref().unwrap_or("")
    );

    let host = config.host.clone();
    let port = config.port;
    let room_policy = config.rooms.clone();

    let shared_state = match SharedState::connect(config).await {
        Ok(shared_state) => Arc::new(shared_state),
        Err(err) => {
            error!(target: "lobby", "Failed to initialize the lobby: {}", err);
            std::process::exit(1);
        }
    };

    let sweeper = spawn_room_sweeper(shared_state.rooms.clone(), room_policy);

    let listener = match Listener::start_tcp(&host, port, shared_state.clone()).await {
        Ok((_, handle)) => handle,
        Err(err) => {
            error!(target: "lobby", "Failed to bind {}:{}: {}", host, port, err);
            std::process::exit(1);
        }
    };

    // Join handles...
    let _ = listener.await;
    sweeper.abort();
}

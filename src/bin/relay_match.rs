use std::env;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gamestore_lobby::relay::{run_match, RelayConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("LOBBY_LOG"))
        .init();

    let config = match RelayConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            error!(target: "args", "{}", err);
            eprintln!("usage: relay-match <port> <room_id> [<duration_secs>]");
            std::process::exit(2);
        }
    };

    // Losing the port to another process ends the match right here, with a non-zero status
    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(target: "match", "Could not bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };
    info!(target: "match", "Room {} listening on port {}", config.room_id, config.port);

    match run_match(listener, config).await {
        Ok(summary) => info!(
            target: "match",
            "Match over after {} ticks with {} participants",
            summary.ticks,
            summary.participants
        ),
        Err(err) => {
            error!(target: "match", "Match aborted: {}", err);
            std::process::exit(1);
        }
    }
}

use std::io;
use std::net::TcpListener;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MatchConfig;
use crate::rooms::{MatchStatus, RoomId, RoomTable};
use crate::transfer::StorageLayout;

/// What the lobby knows about a match when it has to start one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub room_id: RoomId,
    pub game_name: String,
    pub version: String,
}

/// A started match server. `child` is `None` for launchers that do not own an OS process.
#[derive(Debug)]
pub struct MatchProcess {
    pub port: u16,
    pub child: Option<Child>,
}

#[derive(Debug, Error)]
pub enum LaunchErr {
    #[error("no match server installed for {0}")]
    MissingServer(String),

    #[error("could not allocate a port: {0}")]
    Port(io::Error),

    #[error("could not spawn the match server: {0}")]
    Spawn(io::Error),
}

/// Starts match servers. Called with the room table locked, so it must not block for long.
pub trait MatchLauncher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> Result<MatchProcess, LaunchErr>;
}

/// Ask the OS for a currently free TCP port. The port is released again before
/// returning; the match server binds it on its own.
pub fn allocate_ephemeral_port() -> io::Result<u16> {
    let probe = TcpListener::bind(("0.0.0.0", 0))?;
    Ok(probe.local_addr()?.port())
}

/// Runs `<program> [<entry>] <port> <room_id>` inside the game's `server` directory.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    layout: StorageLayout,
    program: String,
    entry: Option<String>,
}

impl ProcessLauncher {
    pub fn new(layout: StorageLayout, matches: &MatchConfig) -> Self {
        Self {
            layout,
            program: matches.program.clone(),
            entry: matches.entry.clone(),
        }
    }
}

impl MatchLauncher for ProcessLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<MatchProcess, LaunchErr> {
        let server_dir = self.layout.server_dir(&spec.game_name);
        if !server_dir.is_dir() {
            return Err(LaunchErr::MissingServer(spec.game_name.clone()));
        }

        let port = allocate_ephemeral_port().map_err(LaunchErr::Port)?;

        let mut command = Command::new(&self.program);
        if let Some(entry) = &self.entry {
            command.arg(entry);
        }
        command
            .arg(port.to_string())
            .arg(spec.room_id.to_string())
            .current_dir(&server_dir)
            .stdin(Stdio::null())
            .kill_on_drop(false);

        let child = command.spawn().map_err(LaunchErr::Spawn)?;
        info!(
            target: "match",
            "Room {}: started {} v{} on port {} (pid {:?})",
            spec.room_id,
            spec.game_name,
            spec.version,
            port,
            child.id()
        );

        Ok(MatchProcess {
            port,
            child: Some(child),
        })
    }
}

/// Wait for the match process to exit and record the outcome on its room.
pub fn supervise(
    process: MatchProcess,
    room_id: RoomId,
    rooms: Arc<RoomTable>,
) -> Option<JoinHandle<()>> {
    let mut child = process.child?;

    Some(tokio::spawn(async move {
        let status = match child.wait().await {
            Ok(exit) if exit.success() => MatchStatus::Finished { exit_code: 0 },
            Ok(exit) => match exit.code() {
                Some(code) => MatchStatus::Failed {
                    reason: format!("match server exited with status {}", code),
                },
                None => MatchStatus::Failed {
                    reason: "match server was terminated by a signal".to_string(),
                },
            },
            Err(err) => MatchStatus::Failed {
                reason: format!("lost track of the match server: {}", err),
            },
        };

        match &status {
            MatchStatus::Failed { reason } => {
                warn!(target: "match", "Room {}: {}", room_id, reason)
            }
            _ => info!(target: "match", "Room {}: match finished", room_id),
        }

        if !rooms.set_match_status(room_id, status) {
            debug!(target: "match", "Room {} was retired before its match ended", room_id);
        }
    }))
}

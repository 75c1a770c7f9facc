use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{duplex, DuplexStream};

use crate::client::LobbyClient;
use crate::client_connection::ClientConnectionDescriptor;
use crate::config::LobbyConfig;
use crate::orchestrator::{LaunchErr, LaunchSpec, MatchLauncher, MatchProcess};
use crate::orm::OrmPersistence;
use crate::session::run_session;
use crate::sharedstate::SharedState;
use crate::store::Role;

/// Launcher that records launches and hands out fake ports instead of spawning processes.
#[derive(Debug)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<LaunchSpec>>,
    next_port: AtomicU16,
    failing: AtomicBool,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self {
            launches: Mutex::new(Vec::new()),
            next_port: AtomicU16::new(41000),
            failing: AtomicBool::new(false),
        }
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for RecordingLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchLauncher for RecordingLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<MatchProcess, LaunchErr> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LaunchErr::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no interpreter",
            )));
        }
        self.launches.lock().unwrap().push(spec.clone());
        Ok(MatchProcess {
            port: self.next_port.fetch_add(1, Ordering::SeqCst),
            child: None,
        })
    }
}

/// A lobby backed by in-memory SQLite and a temporary upload directory.
pub struct TestLobby {
    pub sstate: Arc<SharedState>,
    pub launcher: Arc<RecordingLauncher>,
    next_connection: AtomicU64,
    dir: TempDir,
}

impl TestLobby {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = LobbyConfig {
            upload_dir: dir.path().join("uploaded"),
            ..LobbyConfig::default()
        };
        let store = OrmPersistence::in_memory().await.unwrap();
        let launcher = Arc::new(RecordingLauncher::new());
        let sstate = SharedState::new(config, Arc::new(store), launcher.clone());
        sstate.layout.prepare().await.unwrap();

        Self {
            sstate: Arc::new(sstate),
            launcher,
            next_connection: AtomicU64::new(1),
            dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open a new in-memory connection served by its own session task.
    pub fn connect(&self) -> LobbyClient<DuplexStream> {
        let (client, server) = duplex(256 * 1024);
        let id = self.next_connection.fetch_add(1, Ordering::SeqCst);
        let con = ClientConnectionDescriptor::new(id, 5555, "127.0.0.1".to_string(), 50000 + id as u16);
        tokio::spawn(run_session(server, con, self.sstate.clone()));
        LobbyClient::new(client)
    }

    /// Connect, register and log in.
    pub async fn user(&self, username: &str, role: Role) -> LobbyClient<DuplexStream> {
        let mut client = self.connect();
        assert!(client.register(username, "pw", role).await.unwrap().is_success());
        assert!(client.login(username, "pw").await.unwrap().is_success());
        client
    }
}

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::LobbyConfig;
use crate::lobby_errors::LobbyErr;
use crate::orchestrator::{MatchLauncher, ProcessLauncher};
use crate::orm::OrmPersistence;
use crate::registry::OnlineRegistry;
use crate::rooms::RoomTable;
use crate::store::Persistence;
use crate::transfer::StorageLayout;

/// Everything the sessions of one lobby process share.
///
/// The online registry, the room table and the catalog lock are independent;
/// no code path holds two of them at once.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<LobbyConfig>,
    pub store: Arc<dyn Persistence>,
    pub online: Arc<OnlineRegistry>,
    pub rooms: Arc<RoomTable>,
    /// Serializes catalog writes together with the file swaps that belong to them.
    pub catalog_lock: Arc<Mutex<()>>,
    pub layout: StorageLayout,
    pub launcher: Arc<dyn MatchLauncher>,
}

impl SharedState {
    pub async fn connect(config: LobbyConfig) -> Result<Self, LobbyErr> {
        let conn_string = config.database.conn_string();
        debug!(target: "args", "Database connection string: {}", conn_string);
        let store = OrmPersistence::connect(&conn_string, config.database.init_schemas).await?;

        let layout = StorageLayout::new(&config.upload_dir);
        layout.prepare().await?;
        let launcher = ProcessLauncher::new(layout.clone(), &config.matches);

        Ok(Self::new(config, Arc::new(store), Arc::new(launcher)))
    }

    pub fn new(
        config: LobbyConfig,
        store: Arc<dyn Persistence>,
        launcher: Arc<dyn MatchLauncher>,
    ) -> Self {
        let layout = StorageLayout::new(&config.upload_dir);
        Self {
            config: Arc::new(config),
            store,
            online: Arc::new(OnlineRegistry::new()),
            rooms: Arc::new(RoomTable::new()),
            catalog_lock: Arc::new(Mutex::new(())),
            layout,
            launcher,
        }
    }
}

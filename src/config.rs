use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::orm::build_database_conn_string;

/// Upper bound for a single uploaded game archive.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub proto: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub params: String,
    pub init_schemas: bool,
}

impl DatabaseConfig {
    pub fn conn_string(&self) -> String {
        build_database_conn_string(
            &self.proto,
            &self.name,
            &self.user,
            &self.password,
            &self.host,
            &self.port,
            &self.params,
        )
    }
}

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Interpreter or executable that runs a game's match server.
    pub program: String,
    /// Script handed to `program`, resolved inside the game's `server` directory.
    /// `None` runs `program` with the port and room id only.
    pub entry: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// How long a room may stay PLAYING before it is retired.
    pub ttl: Duration,
    /// How long a room is kept after its match process has ended.
    pub retire_grace: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct LobbyConfig {
    pub host: String,
    pub port: u16,
    /// Address handed to clients for connecting to spawned match servers.
    pub public_host: String,
    pub database: DatabaseConfig,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub matches: MatchConfig,
    pub rooms: RoomConfig,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5555,
            public_host: "127.0.0.1".to_string(),
            database: DatabaseConfig {
                proto: "sqlite".to_string(),
                name: "lobby.sqlite".to_string(),
                user: String::new(),
                password: String::new(),
                host: String::new(),
                port: String::new(),
                params: "mode=rwc".to_string(),
                init_schemas: true,
            },
            upload_dir: PathBuf::from("uploaded"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            matches: MatchConfig {
                program: "python3".to_string(),
                entry: Some("game_server.py".to_string()),
            },
            rooms: RoomConfig {
                ttl: Duration::from_secs(2 * 60 * 60),
                retire_grace: Duration::from_secs(60),
                sweep_interval: Duration::from_secs(30),
            },
        }
    }
}

impl LobbyConfig {
    /// Build the configuration from the process environment (after `.env` was loaded).
    pub fn from_env() -> Self {
        let defaults = LobbyConfig::default();

        let entry = env_or("MATCH_ENTRY", defaults.matches.entry.as_deref().unwrap_or(""));

        Self {
            host: env_or("LOBBY_HOST", &defaults.host),
            port: env_parse("LOBBY_PORT", defaults.port),
            public_host: env_or("LOBBY_PUBLIC_HOST", &defaults.public_host),
            database: DatabaseConfig {
                proto: env_or("DB_PROTO", &defaults.database.proto),
                name: env_or("DB_NAME", &defaults.database.name),
                user: env_or("DB_USER", &defaults.database.user),
                password: env_or("DB_PASSWORD", &defaults.database.password),
                host: env_or("DB_HOST", &defaults.database.host),
                port: env_or("DB_PORT", &defaults.database.port),
                params: env_or("DB_PARAMS", &defaults.database.params),
                init_schemas: env_or("INIT_SCHEMAS", "1") == "1",
            },
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploaded")),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            matches: MatchConfig {
                program: env_or("MATCH_PROGRAM", &defaults.matches.program),
                entry: if entry.is_empty() { None } else { Some(entry) },
            },
            rooms: RoomConfig {
                ttl: Duration::from_secs(env_parse("ROOM_TTL_SECS", defaults.rooms.ttl.as_secs())),
                retire_grace: Duration::from_secs(env_parse(
                    "ROOM_RETIRE_GRACE_SECS",
                    defaults.rooms.retire_grace.as_secs(),
                )),
                sweep_interval: Duration::from_secs(
                    env_parse(
                        "ROOM_SWEEP_INTERVAL_SECS",
                        defaults.rooms.sweep_interval.as_secs(),
                    )
                    .max(1),
                ),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or(default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "args", "Ignoring {}={:?} ({}), using {}", key, raw, err, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_database_is_a_local_sqlite_file() {
        let config = LobbyConfig::default();
        assert_eq!(config.database.conn_string(), "sqlite://lobby.sqlite?mode=rwc");
    }

    #[test]
    fn unparsable_numbers_fall_back_to_default() {
        env::set_var("LOBBY_TEST_PORT_GARBAGE", "not-a-port");
        assert_eq!(env_parse("LOBBY_TEST_PORT_GARBAGE", 4242u16), 4242);
        env::set_var("LOBBY_TEST_PORT_OK", " 6000 ");
        assert_eq!(env_parse("LOBBY_TEST_PORT_OK", 4242u16), 6000);
    }
}

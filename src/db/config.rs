use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{env_parse, env_string};

const DEFAULT_DB_FILE: &str = "student_analyzer.db";
const PERSISTENT_VOLUME: &str = "/data";

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Client/server connection string. When absent or unreachable the
    /// embedded backend is used.
    pub server_url: Option<String>,
    pub server_max_connections: u32,
    pub acquire_timeout: Duration,
    pub sqlite: SqliteConfig,
}

impl DbConfig {
    pub fn from_env() -> Self {
        let server_url = env_string("DATABASE_URL");
        let (server_max_connections, sqlite_max_connections) =
            pool_sizes(env_parse("DB_MAX_CONNECTIONS"));
        let sqlite = SqliteConfig::from_env(server_url.is_none(), sqlite_max_connections);

        Self {
            server_url,
            server_max_connections,
            acquire_timeout: Duration::from_millis(
                env_parse("DB_ACQUIRE_TIMEOUT_MS").unwrap_or(5000),
            ),
            sqlite,
        }
    }

    /// Embedded-only configuration rooted at `path`.
    pub fn embedded(path: impl Into<PathBuf>) -> Self {
        Self {
            server_url: None,
            server_max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            sqlite: SqliteConfig::at(path),
        }
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub journal_mode: SqliteJournalMode,
    pub busy_timeout: Duration,
    pub foreign_keys: bool,
}

impl SqliteConfig {
    fn from_env(allow_persistent_volume: bool, max_connections: u32) -> Self {
        let path = env_string("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_db_path(allow_persistent_volume));

        let journal_mode = std::env::var("SQLITE_JOURNAL_MODE")
            .ok()
            .as_deref()
            .and_then(SqliteJournalMode::parse)
            .unwrap_or(SqliteJournalMode::Wal);

        Self {
            path,
            max_connections,
            journal_mode,
            busy_timeout: Duration::from_millis(env_parse("SQLITE_BUSY_TIMEOUT_MS").unwrap_or(5000)),
            foreign_keys: env_bool("SQLITE_FOREIGN_KEYS", false),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
            journal_mode: SqliteJournalMode::Wal,
            busy_timeout: Duration::from_secs(5),
            foreign_keys: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteJournalMode {
    Wal,
    Delete,
    Truncate,
    Persist,
    Memory,
    Off,
}

impl SqliteJournalMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "WAL" => Some(Self::Wal),
            "DELETE" => Some(Self::Delete),
            "TRUNCATE" => Some(Self::Truncate),
            "PERSIST" => Some(Self::Persist),
            "MEMORY" => Some(Self::Memory),
            "OFF" => Some(Self::Off),
            _ => None,
        }
    }

    pub(crate) fn to_sqlx(self) -> sqlx::sqlite::SqliteJournalMode {
        use sqlx::sqlite::SqliteJournalMode as Mode;
        match self {
            SqliteJournalMode::Wal => Mode::Wal,
            SqliteJournalMode::Delete => Mode::Delete,
            SqliteJournalMode::Truncate => Mode::Truncate,
            SqliteJournalMode::Persist => Mode::Persist,
            SqliteJournalMode::Memory => Mode::Memory,
            SqliteJournalMode::Off => Mode::Off,
        }
    }
}

// A writable persistent volume at /data wins over the working directory
// when no server database is configured.
fn default_db_path(allow_persistent_volume: bool) -> PathBuf {
    let volume = Path::new(PERSISTENT_VOLUME);
    if allow_persistent_volume && is_writable_dir(volume) {
        return volume.join(DEFAULT_DB_FILE);
    }
    PathBuf::from(DEFAULT_DB_FILE)
}

fn is_writable_dir(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let probe = dir.join(".write_probe");
    match std::fs::write(&probe, b"ok") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(err) => {
            tracing::warn!(path = %dir.display(), error = %err, "persistent volume is not writable");
            false
        }
    }
}

/// `DB_MAX_CONNECTIONS` sizes whichever pool ends up active; the defaults
/// differ per backend.
fn pool_sizes(configured: Option<u32>) -> (u32, u32) {
    match configured.filter(|n| *n > 0) {
        Some(n) => (n, n),
        None => (10, 5),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

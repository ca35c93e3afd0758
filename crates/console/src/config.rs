use sensicity_auth::AuthConfig;
use sensicity_database::DatabaseConfig;
use std::path::PathBuf;

pub const DEFAULT_SESSION_FILE: &str = ".sensicity/session.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub session_file: PathBuf,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Read everything from the environment. Call `dotenvy::dotenv()` first
    /// to pick up a local `.env`.
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig::from_env(),
            auth: AuthConfig::from_env(),
            session_file: std::env::var("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE)),
            log_format: LogFormat::from_env(),
        }
    }

    /// The binary runs one process per command, so a `memory://` store is
    /// gone before the next command could restore the session.
    pub fn require_persistent_store(&self) -> anyhow::Result<()> {
        if self.database.is_memory() {
            anyhow::bail!(
                "DATABASE_URL={} only lives for one command; point it at PostgreSQL",
                self.database.url
            );
        }
        Ok(())
    }

    /// In-memory store, default auth settings, session file under `dir`.
    pub fn in_memory(dir: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig::memory(),
            auth: AuthConfig::default(),
            session_file: dir.into().join("session.json"),
            log_format: LogFormat::Pretty,
        }
    }
}

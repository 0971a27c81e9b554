//! Runtime settings loaded from environment variables.

use std::path::PathBuf;

use anyhow::Result;

use crate::db::Database;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// SQLite file (from A4BA_DATABASE). Falls back to the platform data dir.
    pub database: Option<PathBuf>,
    /// HTTP port (from A4BA_PORT)
    pub port: u16,
    /// Allowed CORS origins (from A4BA_CORS_ORIGINS, comma-separated)
    pub cors_origins: Option<Vec<String>>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database = lookup("A4BA_DATABASE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let port = match lookup("A4BA_PORT") {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid A4BA_PORT {:?}", raw);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let cors_origins = lookup("A4BA_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty());

        Self {
            database,
            port,
            cors_origins,
        }
    }

    /// Open and migrate the configured database.
    pub fn open_database(&self) -> Result<Database> {
        let db = match &self.database {
            Some(path) => Database::open(path.clone())?,
            None => Database::open_default()?,
        };
        db.migrate()?;
        Ok(db)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            port: DEFAULT_PORT,
            cors_origins: None,
        }
    }
}

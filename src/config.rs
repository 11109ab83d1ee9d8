//! Service configuration, read once at startup.
//!
//! Handlers receive what they need through application state and never
//! consult the environment themselves.

use anyhow::{Context, Result};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_DB_USER: &str = "root";
const DEFAULT_DB_PASSWORD: &str = "mysecretpassword";
const DEFAULT_DB_DATABASE: &str = "machina_labs";
const DEFAULT_ARCHIVE_PATH: &str = "./files.zip";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Connection parameters for the catalog database.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    /// Zip archive holding the catalog files under `files/`.
    pub archive_path: PathBuf,
    pub bind_addr: SocketAddr,
}

impl ServiceConfig {
    /// Build the config from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = match lookup("DB_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid DB_PORT: {:?}", raw))?,
            None => DEFAULT_DB_PORT,
        };

        let bind_raw = var("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .with_context(|| format!("Invalid BIND_ADDR: {:?}", bind_raw))?;

        Ok(Self {
            database: DatabaseConfig {
                host: var("DB_HOST", DEFAULT_DB_HOST),
                port,
                user: var("DB_USER", DEFAULT_DB_USER),
                password: var("DB_PASSWORD", DEFAULT_DB_PASSWORD),
                database: var("DB_DATABASE", DEFAULT_DB_DATABASE),
            },
            archive_path: PathBuf::from(var("ARCHIVE_PATH", DEFAULT_ARCHIVE_PATH)),
            bind_addr,
        })
    }
}

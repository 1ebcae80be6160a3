//! CLI command handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use kvsession_config::{KvSessionConfig, LoadedConfig};
use kvsession_core::SessionStore;
use kvsession_sqlite::SqliteBackend;

pub mod config;
pub mod session;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Database path from the command line.
    pub db_path: Option<PathBuf>,
    /// User config directory override.
    pub config_dir: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Discover and merge config layers, reporting malformed ones.
    pub fn load_config(&self) -> LoadedConfig {
        let loaded = kvsession_config::load_config(self.config_dir.as_deref());
        for warning in loaded.warnings() {
            tracing::warn!("{}", warning);
        }
        loaded
    }

    /// Database path: `--db` first, then config, then the data directory.
    pub fn db_path(&self, config: &KvSessionConfig) -> Result<PathBuf> {
        self.db_path
            .clone()
            .or_else(|| config.sqlite_path())
            .ok_or_else(|| anyhow::anyhow!("Could not determine database path; pass --db"))
    }

    /// Open the session store over the configured SQLite database.
    pub fn open_store(&self) -> Result<SessionStore<SqliteBackend>> {
        let loaded = self.load_config();
        let store_config = loaded.config.store_config()?;
        let path = self.db_path(&loaded.config)?;

        let backend = open_backend(&path, &store_config)?;
        Ok(SessionStore::new(store_config, backend)?)
    }
}

fn open_backend(path: &Path, config: &kvsession_core::StoreConfig) -> Result<SqliteBackend> {
    SqliteBackend::open(path, config)
        .with_context(|| format!("Failed to open session database {}", path.display()))
}

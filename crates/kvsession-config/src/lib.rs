//! Configuration system for kvsession.
//!
//! Provides TOML-based configuration with:
//! - A `[table]` section for table identity and key schema
//! - A `[session]` section for TTL, touch and expired-record policy
//! - A `[sqlite]` section for the local SQLite backend
//! - A user layer and a project-local layer, merged per section

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_TEMPLATE, ConfigLayers, LayerStatus, LoadedConfig, PROJECT_CONFIG_FILE,
    USER_CONFIG_FILE, init_config_file, load_config, user_config_dir,
};
pub use error::{ConfigError, Result};
pub use types::*;

//! Locating and layering config files.
//!
//! Two layers are read, the later one replacing whole sections of the
//! earlier one:
//! 1. the user file `config.toml` in the user config directory
//! 2. the project file `kvsession.toml` in the working directory
//!
//! A layer that is missing is skipped. A layer that can't be read or parsed
//! is skipped too and reported through [`LoadedConfig::warnings`], so a bad
//! project file never stops the CLI from running on the user's settings.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{ConfigError, KvSessionConfig, Result};

/// Project-local config filename, resolved against the working directory.
pub const PROJECT_CONFIG_FILE: &str = "kvsession.toml";

/// Config filename inside the user config directory.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Overrides the user config directory.
pub const CONFIG_DIR_ENV: &str = "KVSESSION_CONFIG_DIR";

/// Commented starting point written by [`init_config_file`].
///
/// Every value matches the built-in default.
pub const CONFIG_TEMPLATE: &str = r#"# kvsession Configuration

# Table identity and key schema
[table]
name = "sessions"
hash_key = "pk"
sort_key = "sk"
# use_sort_key = false
hash_prefix = "sess:"

# Session lifetime (milliseconds)
[session]
# ttl_ms = 3600000
default_ttl_ms = 86400000
touch_interval_ms = 30000
keep_expired = false
optimistic_touch = false

# Local SQLite backend (defaults to the platform data directory)
# [sqlite]
# path = "/var/lib/kvsession/sessions.db"
"#;

/// What happened to one layer during loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerStatus {
    /// Read and merged.
    Loaded,
    /// No file at the path.
    Missing,
    /// Present but unusable; the reason is kept for reporting.
    Invalid(String),
}

/// Merged configuration plus a record of every layer considered.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: KvSessionConfig,
    /// Layers in load order.
    pub layers: Vec<(PathBuf, LayerStatus)>,
}

impl LoadedConfig {
    /// Paths of the layers that were merged.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.layers
            .iter()
            .filter(|(_, status)| *status == LayerStatus::Loaded)
            .map(|(path, _)| path.as_path())
            .collect()
    }

    /// One message per layer that was present but skipped.
    pub fn warnings(&self) -> Vec<String> {
        self.layers
            .iter()
            .filter_map(|(path, status)| match status {
                LayerStatus::Invalid(reason) => {
                    Some(format!("Skipped {}: {}", path.display(), reason))
                }
                _ => None,
            })
            .collect()
    }
}

/// File locations for the two config layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayers {
    /// User file, `None` when no config directory can be determined.
    pub user: Option<PathBuf>,
    /// Project file.
    pub project: PathBuf,
}

impl ConfigLayers {
    /// Layer locations for this process.
    ///
    /// `config_dir` takes precedence over `KVSESSION_CONFIG_DIR` and the
    /// platform config directory.
    pub fn discover(config_dir: Option<&Path>) -> Self {
        let user_dir = config_dir.map(Path::to_path_buf).or_else(user_config_dir);
        Self {
            user: user_dir.map(|dir| dir.join(USER_CONFIG_FILE)),
            project: PathBuf::from(PROJECT_CONFIG_FILE),
        }
    }

    /// Read every layer in order and merge the usable ones.
    pub fn load(&self) -> LoadedConfig {
        let mut config = KvSessionConfig::new();
        let mut layers = Vec::new();

        for path in self.user.iter().chain(std::iter::once(&self.project)) {
            let status = match read_layer(path) {
                Ok(Some(layer)) => {
                    debug!(path = %path.display(), "Merged config layer");
                    config.merge(layer);
                    LayerStatus::Loaded
                }
                Ok(None) => LayerStatus::Missing,
                Err(e) => LayerStatus::Invalid(e.to_string()),
            };
            layers.push((path.clone(), status));
        }

        LoadedConfig { config, layers }
    }
}

/// Discover and load both layers.
pub fn load_config(config_dir: Option<&Path>) -> LoadedConfig {
    ConfigLayers::discover(config_dir).load()
}

/// The user config directory from `KVSESSION_CONFIG_DIR`, else
/// `<platform config dir>/kvsession`.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join("kvsession")),
    }
}

/// Write [`CONFIG_TEMPLATE`] to `path` unless a file is already there.
///
/// Returns `false` if the file existed and was left alone.
pub fn init_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    let write_err = |path: &Path, source| ConfigError::WriteFile {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
    }
    std::fs::write(path, CONFIG_TEMPLATE).map_err(|e| write_err(path, e))?;

    debug!(path = %path.display(), "Wrote config template");
    Ok(true)
}

/// `Ok(None)` when there is no file at `path`.
fn read_layer(path: &Path) -> Result<Option<KvSessionConfig>> {
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    KvSessionConfig::from_toml(&contents).map(Some)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use kvsession_core::StoreConfig;
    use std::fs;
    use tempfile::TempDir;

    fn layers_in(dir: &TempDir) -> ConfigLayers {
        ConfigLayers {
            user: Some(dir.path().join("user").join(USER_CONFIG_FILE)),
            project: dir.path().join(PROJECT_CONFIG_FILE),
        }
    }

    #[test]
    fn test_discover_prefers_explicit_dir() {
        let layers = ConfigLayers::discover(Some(Path::new("/etc/kvs")));
        assert_eq!(layers.user, Some(PathBuf::from("/etc/kvs/config.toml")));
        assert_eq!(layers.project, PathBuf::from("kvsession.toml"));
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = layers_in(&dir).load();

        assert_eq!(loaded.config, KvSessionConfig::default());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings().is_empty());
        assert!(
            loaded
                .layers
                .iter()
                .all(|(_, status)| *status == LayerStatus::Missing)
        );
    }

    #[test]
    fn test_project_section_replaces_user_section() {
        let dir = TempDir::new().unwrap();
        let layers = layers_in(&dir);
        let user = layers.user.clone().unwrap();
        fs::create_dir_all(user.parent().unwrap()).unwrap();
        fs::write(
            &user,
            "[table]\nname = \"user_table\"\n\n[session]\ntouch_interval_ms = 10000\n",
        )
        .unwrap();
        fs::write(&layers.project, "[session]\nkeep_expired = true\n").unwrap();

        let loaded = layers.load();
        let table = loaded.config.table.as_ref().unwrap();
        let session = loaded.config.session.as_ref().unwrap();

        assert_eq!(table.name.as_deref(), Some("user_table"));
        assert_eq!(session.keep_expired, Some(true));
        assert_eq!(session.touch_interval_ms, None);
        assert_eq!(loaded.loaded_from(), vec![user.as_path(), layers.project.as_path()]);
    }

    #[test]
    fn test_invalid_layer_is_skipped_with_warning() {
        let dir = TempDir::new().unwrap();
        let layers = layers_in(&dir);
        fs::write(&layers.project, "[table\nname = ").unwrap();

        let loaded = layers.load();

        assert_eq!(loaded.config, KvSessionConfig::default());
        assert!(matches!(loaded.layers[1].1, LayerStatus::Invalid(_)));
        let warnings = loaded.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("kvsession.toml"));
    }

    #[test]
    fn test_init_writes_template_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(USER_CONFIG_FILE);

        assert!(init_config_file(&path).unwrap());
        fs::write(&path, "[table]\nname = \"edited\"\n").unwrap();
        assert!(!init_config_file(&path).unwrap());

        let kept = fs::read_to_string(&path).unwrap();
        assert!(kept.contains("edited"));
    }

    #[test]
    fn test_template_matches_defaults() {
        let config = KvSessionConfig::from_toml(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.store_config().unwrap(), StoreConfig::default());
    }
}

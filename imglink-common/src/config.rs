//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents
///
/// Lives at `~/.config/imglink/config.toml` (platform equivalent elsewhere).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the image store and database
    pub root_folder: Option<String>,
    /// HTTP listen port override
    pub port: Option<u16>,
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `IMGLINK_ROOT` environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("IMGLINK_ROOT") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_toml_config() {
        if let Some(root_folder) = config.root_folder {
            return PathBuf::from(root_folder);
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Load the TOML config file from the platform config directory
pub fn load_toml_config() -> Result<TomlConfig> {
    let path = config_file_path()?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write the TOML config file (best-effort, creates parent directories)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get configuration file path for the platform
fn config_file_path() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .map(|d| d.join("imglink").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("imglink"))
        .unwrap_or_else(|| PathBuf::from("./imglink_data"))
}

/// Root folder initialization helper
///
/// Ensures the resolved root folder exists and exposes well-known paths
/// inside it before the database pool is opened.
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Path to the service database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root.join("imglink.db")
    }

    /// Path to the image store inside the root folder
    pub fn images_path(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cli_arg_takes_priority() {
        std::env::set_var("IMGLINK_ROOT", "/from/env");
        let resolved = resolve_root_folder(Some("/from/cli"));
        assert_eq!(resolved, PathBuf::from("/from/cli"));
        std::env::remove_var("IMGLINK_ROOT");
    }

    #[test]
    #[serial]
    fn test_env_var_used_when_no_cli_arg() {
        std::env::set_var("IMGLINK_ROOT", "/from/env");
        let resolved = resolve_root_folder(None);
        assert_eq!(resolved, PathBuf::from("/from/env"));
        std::env::remove_var("IMGLINK_ROOT");
    }

    #[test]
    fn test_initializer_paths() {
        let init = RootFolderInitializer::new(PathBuf::from("/data/imglink"));
        assert_eq!(init.database_path(), PathBuf::from("/data/imglink/imglink.db"));
        assert_eq!(init.images_path(), PathBuf::from("/data/imglink/images"));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = TomlConfig {
            root_folder: Some("/srv/imglink".to_string()),
            port: Some(5741),
        };

        write_toml_config(&config, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: TomlConfig = toml::from_str(&content).unwrap();
        assert_eq!(loaded.root_folder.as_deref(), Some("/srv/imglink"));
        assert_eq!(loaded.port, Some(5741));
    }
}

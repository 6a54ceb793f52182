//! Editor configuration loader for Flowpad.
//!
//! Reads `config.toml` from the data directory (`~/.flowpad/` by default)
//! and deserializes it into [`EditorConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use flowpad_types::config::EditorConfig;
use flowpad_types::error::ConfigError;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FLOWPAD_HOME";

/// Resolve the data directory.
///
/// Priority:
/// 1. `FLOWPAD_HOME` environment variable
/// 2. `~/.flowpad`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".flowpad");
    }

    // Last resort: current directory
    PathBuf::from(".flowpad")
}

/// Read and parse a config file, reporting every failure.
pub async fn read_editor_config(path: &Path) -> Result<EditorConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`EditorConfig::default()`].
/// - If it cannot be read or parsed, logs a warning and returns the default.
pub async fn load_editor_config(data_dir: &Path) -> EditorConfig {
    let config_path = data_dir.join("config.toml");

    match read_editor_config(&config_path).await {
        Ok(config) => config,
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            EditorConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            EditorConfig::default()
        }
    }
}

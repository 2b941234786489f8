//! Layered configuration
//!
//! Resolution order, later wins: built-in defaults, the user config file in
//! the platform config directory, then `<data dir>/.bodyshop/config.yaml`.

use chrono::Duration;
use directories::ProjectDirs;
use rust_embed::Embed;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory inside a data dir holding shop-local settings
pub const SHOP_DIR: &str = ".bodyshop";

/// Config file name, both user-wide and shop-local
pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Last-minute parts order window, in hours before the ECD
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LastMinuteWindow {
    pub min_hours: f64,
    pub max_hours: f64,
}

impl Default for LastMinuteWindow {
    fn default() -> Self {
        Self {
            min_hours: 24.0,
            max_hours: 72.0,
        }
    }
}

impl LastMinuteWindow {
    pub fn contains(&self, hours: f64) -> bool {
        hours >= self.min_hours && hours <= self.max_hours
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    pub total_loss_message: String,
    pub carry_over_on_workfile: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            total_loss_message: "Vehicle declared a total loss. Contact the customer and insurer before any further work.".to_string(),
            carry_over_on_workfile: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub upload_window_hours: i64,
    pub last_minute_parts: LastMinuteWindow,
    pub tasks: TaskConfig,
    pub default_owner: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_window_hours: 24,
            last_minute_parts: LastMinuteWindow::default(),
            tasks: TaskConfig::default(),
            default_owner: "shop".to_string(),
        }
    }
}

impl Config {
    /// Load user and shop config on top of the defaults
    pub fn load(data_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        if let Some(path) = Self::user_config_path() {
            layers.push(path);
        }
        if let Some(dir) = data_dir {
            layers.push(Self::shop_config_path(dir));
        }
        Self::load_layers(&layers)
    }

    /// Merge the given files in order; missing files are skipped
    pub fn load_layers(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut merged = serde_yml::to_value(Config::default()).map_err(|e| {
            ConfigError::Invalid(e.to_string())
        })?;

        for path in paths {
            if !path.exists() {
                continue;
            }
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let layer: serde_yml::Value =
                serde_yml::from_str(&contents).map_err(|e| ConfigError::Parse {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            merge_values(&mut merged, layer);
        }

        let config: Config = serde_yml::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_window_hours < 0 {
            return Err(ConfigError::Invalid(format!(
                "upload_window_hours must not be negative (got {})",
                self.upload_window_hours
            )));
        }
        if self.last_minute_parts.min_hours > self.last_minute_parts.max_hours {
            return Err(ConfigError::Invalid(format!(
                "last_minute_parts.min_hours ({}) exceeds max_hours ({})",
                self.last_minute_parts.min_hours, self.last_minute_parts.max_hours
            )));
        }
        Ok(())
    }

    pub fn upload_window(&self) -> Duration {
        Duration::hours(self.upload_window_hours)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "bodyshop").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn shop_config_path(data_dir: &Path) -> PathBuf {
        data_dir.join(SHOP_DIR).join(CONFIG_FILE)
    }

    /// Commented default config shipped with the binary
    pub fn default_yaml() -> String {
        Assets::get(CONFIG_FILE)
            .and_then(|file| std::str::from_utf8(&file.data).ok().map(str::to_string))
            .unwrap_or_else(|| serde_yml::to_string(&Config::default()).unwrap_or_default())
    }
}

/// Recursively overlay `layer` onto `base`; mappings merge, everything else replaces
fn merge_values(base: &mut serde_yml::Value, layer: serde_yml::Value) {
    match (base, layer) {
        (serde_yml::Value::Mapping(base_map), serde_yml::Value::Mapping(layer_map)) => {
            for (key, value) in layer_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.upload_window(), Duration::hours(24));
        assert_eq!(config.last_minute_parts.min_hours, 24.0);
        assert_eq!(config.last_minute_parts.max_hours, 72.0);
        assert!(!config.tasks.carry_over_on_workfile);
    }

    #[test]
    fn test_embedded_default_parses_to_defaults() {
        let parsed: Config = serde_yml::from_str(&Config::default_yaml()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_layers_override_in_order() {
        let tmp = tempdir().unwrap();
        let user = tmp.path().join("user.yaml");
        let shop = tmp.path().join("shop.yaml");
        std::fs::write(&user, "upload_window_hours: 12\ndefault_owner: front-desk\n").unwrap();
        std::fs::write(&shop, "upload_window_hours: 48\nlast_minute_parts:\n  max_hours: 96\n").unwrap();

        let config = Config::load_layers(&[user, shop, tmp.path().join("missing.yaml")]).unwrap();
        assert_eq!(config.upload_window_hours, 48);
        assert_eq!(config.default_owner, "front-desk");
        assert_eq!(config.last_minute_parts.min_hours, 24.0);
        assert_eq!(config.last_minute_parts.max_hours, 96.0);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("bad.yaml");
        std::fs::write(&path, "last_minute_parts:\n  min_hours: 80\n").unwrap();

        let err = Config::load_layers(&[path]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let window = LastMinuteWindow::default();
        assert!(window.contains(24.0));
        assert!(window.contains(72.0));
        assert!(!window.contains(23.9));
        assert!(!window.contains(72.1));
    }
}

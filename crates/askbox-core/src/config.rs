use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};
use tracing::warn;

use crate::controller::{AvatarStyle, ControllerConfig};

/// Endpoint used when the config file doesn't name one.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/ask";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub endpoint: Option<String>,
    /// "icon" or "graphic"
    pub avatar: Option<String>,
    pub active_layout_on_first_message: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            avatar: Some("icon".to_string()),
            active_layout_on_first_message: Some(true),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Load the config, writing the defaults out first if there is no file yet.
    pub fn load_or_init() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        if !config_path.exists() {
            let config = Self::new();
            config.save_to(&config_path)?;
            return Ok(config);
        }
        Self::load_from(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let avatar = match self.avatar.as_deref() {
            None => AvatarStyle::Icon,
            Some(name) => AvatarStyle::from_name(name).unwrap_or_else(|| {
                warn!(avatar = name, "unknown avatar style, using icon");
                AvatarStyle::Icon
            }),
        };

        ControllerConfig {
            avatar,
            transition_to_active_layout_on_first_message: self
                .active_layout_on_first_message
                .unwrap_or(true),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("askbox").join("config.json"))
    }

    pub fn get_log_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("askbox").join("askbox.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            endpoint: Some("https://answers.example.com/".to_string()),
            avatar: Some("graphic".to_string()),
            active_layout_on_first_message: Some(false),
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.endpoint(), "https://answers.example.com/");
        let controller = loaded.controller_config();
        assert_eq!(controller.avatar, AvatarStyle::graphic());
        assert!(!controller.transition_to_active_layout_on_first_message);
    }

    #[test]
    fn test_partial_file_fills_in() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"endpoint": "  "}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.controller_config(), ControllerConfig::default());
    }

    #[test]
    fn test_unknown_avatar_uses_icon() {
        let config = Config {
            avatar: Some("hologram".to_string()),
            ..Config::new()
        };
        assert_eq!(config.controller_config().avatar, AvatarStyle::Icon);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ endpoint").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}

//! `AppConfig` struct and TOML read/write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use skyq_api::constants::{DEFAULT_HOST, REMOTE_PORT, REST_PORT};

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Box connection settings.
    #[serde(default, rename = "box")]
    pub skybox: BoxConfig,
    /// EPG feed settings.
    #[serde(default)]
    pub epg: EpgConfig,
}

/// Box connection configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BoxConfig {
    /// Host name or IP address of the box.
    pub host: String,
    /// Remote-control TCP port.
    pub remote_port: u16,
    /// REST and status websocket port.
    pub rest_port: u16,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_HOST),
            remote_port: REMOTE_PORT,
            rest_port: REST_PORT,
        }
    }
}

/// EPG feed configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EpgConfig {
    /// XMLTV feed merged into the box channel list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xmltv_url: Option<String>,
    /// Directory the feed is cached in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Refresh schedule, e.g. `@daily` or `6h`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_config() {
        // Arrange & Act
        let config = AppConfig::default();

        // Assert
        assert_eq!(config.skybox.host, "skyq");
        assert_eq!(config.skybox.remote_port, 49160);
        assert_eq!(config.skybox.rest_port, 9006);
        assert!(config.epg.xmltv_url.is_none());
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = AppConfig {
            skybox: BoxConfig {
                host: String::from("192.168.1.20"),
                ..BoxConfig::default()
            },
            epg: EpgConfig {
                xmltv_url: Some(String::from("http://example.com/listing.xml")),
                cache_dir: None,
                refresh: Some(String::from("@daily")),
            },
        };

        // Act
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_config() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[box]\nhost = \"livingroom\"\n").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config.skybox.host, "livingroom");
        assert_eq!(config.skybox.remote_port, 49160);
        assert_eq!(config.epg, EpgConfig::default());
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[box\nhost = ").unwrap();

        // Act
        let result = AppConfig::load(&path);

        // Assert
        assert!(result.unwrap_err().to_string().contains("failed to parse"));
    }
}

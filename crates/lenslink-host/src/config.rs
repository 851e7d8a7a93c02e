//! Configuration loading and validation

use anyhow::{Context, Result};
use lenslink_discovery::DiscoveryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub peer: PeerConfig,
}

/// Remote command channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Bind address for the command channel listener
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:7070".to_string()
}

/// Load configuration from a toml file, falling back to defaults when
/// the file does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    } else {
        info!(path = %path.display(), "No config file found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.peer.bind, "0.0.0.0:7070");
        assert_eq!(config.discovery.timeout_secs, 5);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config: Config = toml::from_str(
            r#"
            [discovery]
            timeout_secs = 12

            [peer]
            bind = "127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.discovery.timeout_secs, 12);
        assert_eq!(config.discovery.mx, 1);
        assert_eq!(config.peer.bind, "127.0.0.1:9000");
    }
}

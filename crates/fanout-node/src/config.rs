//! Node configuration types.

use fanout_sse::SseConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid YAML for [`Config`].
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration for the fanout node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen address.
    pub listen: SocketAddr,
    /// Log level.
    pub log_level: String,
    /// Log format (`pretty` or `json`).
    pub log_format: String,
    /// Hub settings.
    pub sse: SseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            sse: SseConfig::default(),
        }
    }
}

impl Config {
    /// Load a YAML config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse a YAML document. Omitted fields take their defaults.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_yaml_partial() {
        let config = Config::from_yaml(
            r#"
listen: "0.0.0.0:9000"
sse:
  client_idle_ms: 30000
  metrics:
    enabled: true
    version: "1.4.0"
"#,
        )
        .unwrap();

        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.sse.client_idle_ms, 30_000);
        assert_eq!(config.sse.keep_alive_ms, 15_000);
        assert!(config.sse.metrics.enabled);
        assert_eq!(config.sse.metrics.namespace(), "sse");
        assert_eq!(config.sse.metrics.version(), "1.4.0");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let result = Config::from_yaml("listen: [not, an, address]");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_format: json").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.log_format, "json");
    }
}

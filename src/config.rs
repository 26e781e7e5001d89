//! Provider configuration loading and types.

use crate::backends::MemoryArrayConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Root provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub array: ArrayConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// Remote array connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    /// Management endpoint, informational for the memory backend
    pub endpoint: String,
    /// Backend name
    pub backend: String,
    /// Catalog used by the memory backend
    pub memory: MemoryArrayConfig,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:8443".to_string(),
            backend: "memory".to_string(),
            memory: MemoryArrayConfig::default(),
        }
    }
}

/// Provider protocol server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8090".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| {
                Error::Configuration(format!("Invalid API address {}: {}", self.bind_addr, e))
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ProviderConfig {
    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.api.socket_addr()?;
        if self.api.request_timeout_secs == 0 {
            return Err(Error::Configuration("api.request_timeout_secs must be positive".into()));
        }
        if self.array.memory.serial.trim().is_empty() {
            return Err(Error::Configuration("array.memory.serial cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.array.backend, "memory");
        assert_eq!(config.array.memory.srps, vec!["SRP_1".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            concat!(
                "array:\n  memory:\n    serial: \"000197600999\"\n    srps: [SRP_1, SRP_2]\n",
                "api:\n  bind_addr: \"0.0.0.0:9000\"\n",
                "logging:\n  json: true",
            )
        )
        .unwrap();

        let config = ProviderConfig::load(file.path()).unwrap();
        assert_eq!(config.array.memory.serial, "000197600999");
        assert_eq!(config.array.memory.srps.len(), 2);
        assert_eq!(config.array.memory.snapshot_policies.len(), 2);
        assert_eq!(config.api.socket_addr().unwrap().port(), 9000);
        assert_eq!(config.api.request_timeout(), Duration::from_secs(120));
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_matches!(
            ProviderConfig::from_yaml("api:\n  bind_addr: nowhere"),
            Err(Error::Configuration(_))
        );
        assert_matches!(ProviderConfig::from_yaml("api: [1, 2"), Err(Error::YamlParse(_)));
        assert_matches!(
            ProviderConfig::load("/definitely/not/here.yaml"),
            Err(Error::Configuration(_))
        );
    }
}

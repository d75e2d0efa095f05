use std::path::Path;

use crate::error::ConfigError;
use crate::resolver::ResolverConfig;

/// Top-level tool configuration, loadable from TOML.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub resolver: ResolverConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = &self.resolver.endpoint;
        if endpoint.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "resolver.endpoint.base_url must not be empty".into(),
            ));
        }
        if !(endpoint.base_url.starts_with("http://") || endpoint.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(
                "resolver.endpoint.base_url must be an http(s) URL".into(),
            ));
        }
        if endpoint.tag.trim().is_empty() || endpoint.tag.contains('/') {
            return Err(ConfigError::Validation(
                "resolver.endpoint.tag must be a single non-empty path segment".into(),
            ));
        }

        let fetch = &self.resolver.fetch;
        if fetch.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "resolver.fetch.chunk_size must be > 0".into(),
            ));
        }
        if fetch.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "resolver.fetch.timeout_secs must be > 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&AppConfig::default())
    }
}

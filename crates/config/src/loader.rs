//! Reading configuration files.

use std::path::Path;
use tracing::debug;

use crate::{ConfigError, NodeConfig, RawNodeConfig, Result};

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (default)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Picks the format from the file extension; anything but `.json` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Loads and validates the configuration file at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<NodeConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        target: "poolnode::config",
        path = %path.display(),
        "loaded configuration file"
    );

    load_from_str(&contents, ConfigFormat::from_path(path))
}

/// Parses and validates a configuration document.
pub fn load_from_str(contents: &str, format: ConfigFormat) -> Result<NodeConfig> {
    let raw: RawNodeConfig = match format {
        ConfigFormat::Toml => toml::from_str(contents)?,
        ConfigFormat::Json => serde_json::from_str(contents)?,
    };
    raw.validate()
}

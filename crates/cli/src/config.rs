//! `revstore.toml` configuration.
//!
//! # Example
//!
//! ```toml
//! [engine.retry]
//! max_attempts = 5
//! initial_backoff_ms = 10
//! max_backoff_ms = 200
//!
//! [store]
//! max_operations_per_snapshot = 64
//!
//! [server]
//! port = 8080
//! ```
//!
//! Every section is optional. A missing file path means all defaults.

use std::path::Path;

use revstore_engine::EngineConfig;
use revstore_storage::StoreConfig;
use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_PORT: u16 = 8080;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RevstoreConfig {
    pub(crate) engine: EngineConfig,
    pub(crate) store: StoreConfig,
    pub(crate) server: ServerSettings,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ServerSettings {
    pub(crate) port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

/// Read and parse a config file, or return defaults when no path is given.
pub(crate) fn read_config(path: Option<&Path>) -> Result<RevstoreConfig, String> {
    let Some(path) = path else {
        return Ok(RevstoreConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read config '{}': {}", path.display(), e))?;
    parse_config(&content).map_err(|e| format!("invalid config '{}': {}", path.display(), e))
}

pub(crate) fn parse_config(content: &str) -> Result<RevstoreConfig, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, RevstoreConfig::default());
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.engine.retry.max_attempts, 5);
        assert_eq!(config.store.max_operations_per_snapshot, None);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
[engine.retry]
max_attempts = 2

[store]
max_operations_per_snapshot = 3

[server]
port = 9000
"#,
        )
        .unwrap();
        assert_eq!(config.engine.retry.max_attempts, 2);
        assert_eq!(config.engine.retry.initial_backoff_ms, 10);
        assert_eq!(config.store.max_operations_per_snapshot, Some(3));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(parse_config("[database]\nurl = \"x\"\n").is_err());
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = read_config(Some(Path::new("/nonexistent/revstore.toml"))).unwrap_err();
        assert!(err.contains("/nonexistent/revstore.toml"));
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(read_config(None).unwrap(), RevstoreConfig::default());
    }
}

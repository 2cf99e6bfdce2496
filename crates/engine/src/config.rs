use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Engine settings, usually read from the `[engine]` TOML section.
///
/// ```toml
/// [engine.retry]
/// max_attempts = 5
/// initial_backoff_ms = 10
/// max_backoff_ms = 200
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
}

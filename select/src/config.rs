//! Selector configuration.

use serde::Deserialize;

/// Wake mechanism selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifyConfig {
    /// Non-blocking self-pipe; wake is a one-byte write.
    #[default]
    Pipe,
    /// Loopback TCP listener used purely as a pollable placeholder; wake is
    /// closing it. For stacks where a pipe is unavailable.
    Loopback,
    /// No wake descriptor at all; every wait is bounded by
    /// `polling_fallback_ms`. Mostly useful for testing the degraded mode.
    Polling,
}

/// Selector configuration loaded from TOML or built in code.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Maximum number of pending requests. A hard limit: submission beyond
    /// it fails with a retriable error, it never blocks.
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Capacity of the per-descriptor timeout cache.
    #[serde(default = "default_timeout_cache_size")]
    pub timeout_cache_size: usize,

    /// Wake mechanism.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Upper bound on a single wait when no wake descriptor is available,
    /// so new requests are still noticed within this bound.
    #[serde(default = "default_polling_fallback_ms")]
    pub polling_fallback_ms: i32,
}

fn default_max_requests() -> usize {
    16
}

fn default_timeout_cache_size() -> usize {
    16
}

fn default_polling_fallback_ms() -> i32 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            timeout_cache_size: default_timeout_cache_size(),
            notify: NotifyConfig::default(),
            polling_fallback_ms: default_polling_fallback_ms(),
        }
    }
}

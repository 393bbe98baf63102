//! Pump configuration.

use serde::Deserialize;

/// Event pump configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Queue capacity; a push against a full queue drops the event.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_queue_size() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
        }
    }
}

//! Dispatcher configuration.

use serde::Deserialize;

/// FS dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Event pool capacity. The mailbox is sized to match, so a reserved
    /// event can always be posted.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Yield the dispatch task after each event to bound how long it can
    /// monopolize a core.
    #[serde(default = "default_yield_after_event")]
    pub yield_after_event: bool,
}

fn default_pool_size() -> usize {
    10
}

fn default_yield_after_event() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            yield_after_event: default_yield_after_event(),
        }
    }
}

//! Driver configuration.

use std::time::Duration;

/// Tunables for one connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long cached table descriptors stay fresh; `None` caches until
    /// explicit invalidation.
    pub schema_cache_ttl: Option<Duration>,
    /// Cap on items evaluated per store request page.
    pub max_page_size: Option<i32>,
    /// Row limit applied to statements that carry no `LIMIT`.
    pub default_limit: Option<i32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_cache_ttl: Some(Duration::from_secs(300)),
            max_page_size: None,
            default_limit: None,
        }
    }
}

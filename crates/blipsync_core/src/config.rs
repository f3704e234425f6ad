//! Registry and synchronization configuration.

use crate::error::RegistryResult;
use serde::Deserialize;
use std::time::Duration;

/// Configuration recognized by the registry and the sync server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Interval between periodic full resyncs in milliseconds.
    ///
    /// A value of zero or less disables the periodic sweep.
    pub sync_interval_ms: i64,

    /// Maximum number of markers a single category may hold.
    pub max_markers_per_category: usize,

    /// Maximum number of categories.
    pub max_categories: usize,

    /// Emit per-client diff logs at debug level.
    pub debug_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_interval_ms: 30_000,
            max_markers_per_category: 500,
            max_categories: 50,
            debug_logging: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> RegistryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the periodic sync interval in milliseconds.
    #[must_use]
    pub const fn with_sync_interval_ms(mut self, ms: i64) -> Self {
        self.sync_interval_ms = ms;
        self
    }

    /// Sets the per-category marker limit.
    #[must_use]
    pub const fn with_max_markers_per_category(mut self, max: usize) -> Self {
        self.max_markers_per_category = max;
        self
    }

    /// Sets the category limit.
    #[must_use]
    pub const fn with_max_categories(mut self, max: usize) -> Self {
        self.max_categories = max;
        self
    }

    /// Enables or disables debug diff logging.
    #[must_use]
    pub const fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Returns the sweep interval, or `None` if the periodic sweep is disabled.
    pub fn sync_interval(&self) -> Option<Duration> {
        if self.sync_interval_ms <= 0 {
            None
        } else {
            Some(Duration::from_millis(self.sync_interval_ms as u64))
        }
    }
}

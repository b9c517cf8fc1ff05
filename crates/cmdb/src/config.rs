//! Store configuration.

use std::time::Duration;

/// Level names seeded into a store that starts without a snapshot.
pub const DEFAULT_LEVELS: [&str; 4] = [
    "Business Layer",
    "Application Layer",
    "Logical Layer",
    "Physical Layer",
];

/// Default period between autosave checks.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest autosave period. Shorter intervals are raised to this.
pub const MIN_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(1);

/// Options applied when a [`Cmdb`](crate::Cmdb) is constructed.
///
/// # Examples
///
/// ```
/// use cmdb::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .autosave_interval(Duration::from_secs(5))
///     .default_levels(["Service", "Host"]);
/// assert_eq!(config.default_levels.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Whether a background thread saves dirty state periodically
    pub autosave_enabled: bool,
    /// Period between autosave checks, never below [`MIN_AUTOSAVE_INTERVAL`]
    /// when the store starts
    pub autosave_interval: Duration,
    /// Levels seeded when the backend has no snapshot
    pub default_levels: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            autosave_enabled: true,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            default_levels: DEFAULT_LEVELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl StoreConfig {
    /// Configuration with autosave turned off, useful for tests and tools.
    pub fn without_autosave() -> Self {
        Self {
            autosave_enabled: false,
            ..Self::default()
        }
    }

    /// Builder pattern: set the autosave period, raised to
    /// [`MIN_AUTOSAVE_INTERVAL`] if shorter.
    pub fn autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval.max(MIN_AUTOSAVE_INTERVAL);
        self
    }

    /// Builder pattern: enable or disable autosave.
    pub fn autosave(mut self, enabled: bool) -> Self {
        self.autosave_enabled = enabled;
        self
    }

    /// Builder pattern: replace the seeded level names.
    pub fn default_levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_levels = levels.into_iter().map(Into::into).collect();
        self
    }
}

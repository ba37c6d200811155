//! Store configuration.
//!
//! Serializable configuration with minimal surface: the pruning policy for
//! vacated calendar structures and the coordinate-domain check.

use serde::{Deserialize, Serialize};

/// When vacated calendar leaves and their emptied ancestors are deleted.
///
/// The spatial side needs no counterpart: the R-tree rebalances its bounding
/// boxes on every removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PruningPolicy {
    /// Prune inside the removing transaction (default).
    #[default]
    Eager,
    /// Leave vacated nodes in place until
    /// [`ContinuumStore::prune_vacated`](crate::ContinuumStore::prune_vacated)
    /// runs.
    Deferred,
}

/// Store configuration.
///
/// Designed to be loadable from JSON (or TOML with the `toml` feature) while
/// keeping complexity minimal.
///
/// # Example
///
/// ```rust
/// use continuum::{Config, PruningPolicy};
///
/// let config = Config::default();
/// assert_eq!(config.pruning, PruningPolicy::Eager);
///
/// let json = r#"{ "pruning": "deferred", "strict_coordinates": false }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.pruning, PruningPolicy::Deferred);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pruning policy for vacated calendar structures.
    #[serde(default)]
    pub pruning: PruningPolicy,

    /// Enforce the geographic coordinate domain (lat in [-90, 90], lon in
    /// [-180, 180]). When disabled, any finite coordinates are accepted,
    /// which suits planar or projected data.
    #[serde(default = "Config::default_strict_coordinates")]
    pub strict_coordinates: bool,
}

impl Config {
    const fn default_strict_coordinates() -> bool {
        true
    }

    pub fn with_pruning(mut self, policy: PruningPolicy) -> Self {
        self.pruning = policy;
        self
    }

    pub fn with_strict_coordinates(mut self, strict: bool) -> Self {
        self.strict_coordinates = strict;
        self
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Save configuration as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from a TOML string (requires the `toml` feature).
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Save configuration as a TOML string (requires the `toml` feature).
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pruning: PruningPolicy::default(),
            strict_coordinates: Self::default_strict_coordinates(),
        }
    }
}

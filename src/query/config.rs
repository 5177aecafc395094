//! Configuration for matcher construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HalberdError, Result};
use crate::query::scorer::coord_table;

/// Default cap on the number of clauses in one combinator.
pub const DEFAULT_MAX_CLAUSE_COUNT: usize = 1024;

/// Limits and scoring switches applied when building matcher trees.
///
/// # Example
///
/// ```
/// use halberd::query::config::MatcherConfig;
///
/// let config = MatcherConfig::builder()
///     .max_clause_count(64)
///     .coord_enabled(false)
///     .build();
/// assert_eq!(config.max_clause_count, 64);
///
/// let config = MatcherConfig::from_json(r#"{"default_slop": 2}"#).unwrap();
/// assert_eq!(config.default_slop, 2);
/// assert_eq!(config.max_clause_count, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum number of children a combinator may have.
    pub max_clause_count: usize,
    /// Scale disjunction scores by the fraction of matching clauses.
    pub coord_enabled: bool,
    /// Slop used for phrases that do not set one.
    pub default_slop: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            max_clause_count: DEFAULT_MAX_CLAUSE_COUNT,
            coord_enabled: true,
            default_slop: 0,
        }
    }
}

impl MatcherConfig {
    /// Create a new builder for MatcherConfig.
    pub fn builder() -> MatcherConfigBuilder {
        MatcherConfigBuilder::new()
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MatcherConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize this configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_clause_count == 0 {
            return Err(HalberdError::invalid_config(
                "max_clause_count must be at least 1",
            ));
        }
        Ok(())
    }

    /// Reject fan-outs above `max_clause_count`.
    pub fn check_clause_count(&self, count: usize) -> Result<()> {
        if count > self.max_clause_count {
            log::warn!(
                "rejecting combinator with {} clauses (max {})",
                count,
                self.max_clause_count
            );
            return Err(HalberdError::too_many_clauses(count, self.max_clause_count));
        }
        Ok(())
    }

    /// Coordination table for `clauses` optional clauses under this config.
    pub fn coord_table(&self, clauses: usize) -> Vec<f32> {
        coord_table(clauses, self.coord_enabled)
    }
}

/// Builder for MatcherConfig.
#[derive(Debug, Default)]
pub struct MatcherConfigBuilder {
    max_clause_count: Option<usize>,
    coord_enabled: Option<bool>,
    default_slop: Option<u32>,
}

impl MatcherConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of clauses per combinator.
    pub fn max_clause_count(mut self, count: usize) -> Self {
        self.max_clause_count = Some(count);
        self
    }

    /// Enable or disable coordination factors.
    pub fn coord_enabled(mut self, enabled: bool) -> Self {
        self.coord_enabled = Some(enabled);
        self
    }

    /// Set the default phrase slop.
    pub fn default_slop(mut self, slop: u32) -> Self {
        self.default_slop = Some(slop);
        self
    }

    /// Build the MatcherConfig.
    pub fn build(self) -> MatcherConfig {
        let defaults = MatcherConfig::default();
        MatcherConfig {
            max_clause_count: self.max_clause_count.unwrap_or(defaults.max_clause_count),
            coord_enabled: self.coord_enabled.unwrap_or(defaults.coord_enabled),
            default_slop: self.default_slop.unwrap_or(defaults.default_slop),
        }
    }
}

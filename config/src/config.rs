//! # Configuration Structures
//!
//! All structures use `serde` for (de)serialization and `validator` for
//! input validation. Missing fields fall back to their defaults.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ConfigError;

/// Upper bound on worker threads the harness will spawn.
pub const MAX_TEST_THREADS: usize = 1024;

/// Top-level harness configuration.
///
/// ## Usage
/// ```rust
/// use config::HarnessConfig;
///
/// let config = HarnessConfig::default();
/// assert!(config.test_threads >= 1);
/// assert_eq!(config.log.filter, "warn");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct HarnessConfig {
    /// Number of worker threads running trials concurrently
    #[serde(default = "default_test_threads")]
    #[validate(range(min = 1, max = MAX_TEST_THREADS))]
    pub test_threads: usize,

    /// Only run trials whose name contains (or equals, with `exact`) this
    #[serde(default)]
    pub filter: Option<String>,

    /// Match `filter` against the full trial name
    #[serde(default)]
    pub exact: bool,

    /// List trials instead of running them
    #[serde(default)]
    pub list: bool,

    /// Run ignored trials alongside the others
    #[serde(default)]
    pub include_ignored: bool,

    /// Run only ignored trials
    #[serde(default)]
    pub ignored_only: bool,

    /// Logging configuration
    #[serde(default)]
    #[validate(nested)]
    pub log: LogConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            test_threads: default_test_threads(),
            filter: None,
            exact: false,
            list: false,
            include_ignored: false,
            ignored_only: false,
            log: LogConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Runs `validator` checks and maps failures into [`ConfigError`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate().map_err(|e| ConfigError::Validation {
            reason: e.to_string(),
        })?;
        Ok(self)
    }

    /// Whether a trial with this name and ignore flag should run.
    pub fn selects(&self, name: &str, ignored: bool) -> bool {
        if self.ignored_only && !ignored {
            return false;
        }
        if ignored && !(self.include_ignored || self.ignored_only) {
            return false;
        }
        self.matches_filter(name)
    }

    /// Whether `name` passes the name filter, ignoring the ignore flags.
    pub fn matches_filter(&self, name: &str) -> bool {
        match &self.filter {
            None => true,
            Some(filter) if self.exact => name == filter,
            Some(filter) => name.contains(filter.as_str()),
        }
    }
}

/// Logging configuration consumed by `observability::init_tracing`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct LogConfig {
    /// `EnvFilter` directive string, e.g. `warn,suite=debug`
    #[serde(default = "default_log_filter")]
    #[validate(length(min = 1))]
    pub filter: String,

    /// Colorize output
    #[serde(default)]
    pub ansi: bool,

    /// Route output through the libtest capture-aware writer
    #[serde(default = "default_test_writer")]
    pub test_writer: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            ansi: false,
            test_writer: default_test_writer(),
        }
    }
}

fn default_test_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(MAX_TEST_THREADS)
}

fn default_log_filter() -> String {
    "warn".to_string()
}

fn default_test_writer() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_filter(filter: Option<&str>, exact: bool) -> HarnessConfig {
        HarnessConfig {
            filter: filter.map(str::to_string),
            exact,
            ..HarnessConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.test_threads >= 1);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = HarnessConfig {
            test_threads: 0,
            ..HarnessConfig::default()
        };
        let err = config.validated().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_threads_above_maximum_rejected() {
        let config = HarnessConfig {
            test_threads: MAX_TEST_THREADS + 1,
            ..HarnessConfig::default()
        };
        assert!(config.validated().is_err());

        let config = HarnessConfig {
            test_threads: MAX_TEST_THREADS,
            ..HarnessConfig::default()
        };
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_empty_log_filter_rejected() {
        let mut config = HarnessConfig::default();
        config.log.filter = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_selects_substring_filter() {
        let config = config_with_filter(Some("user"), false);
        assert!(config.selects("user_suite_alpha", false));
        assert!(!config.selects("product_suite_alpha", false));
    }

    #[test]
    fn test_selects_exact_filter() {
        let config = config_with_filter(Some("user_suite"), true);
        assert!(config.selects("user_suite", false));
        assert!(!config.selects("user_suite_alpha", false));
    }

    #[test]
    fn test_matches_filter_ignores_ignore_flags() {
        let config = config_with_filter(Some("slow"), false);
        assert!(config.matches_filter("slow_check"));
        assert!(!config.selects("slow_check", true));
        assert!(!config.matches_filter("fast_check"));
    }

    #[test]
    fn test_selects_ignored_trials() {
        let mut config = config_with_filter(None, false);
        assert!(!config.selects("slow", true));

        config.include_ignored = true;
        assert!(config.selects("slow", true));
        assert!(config.selects("fast", false));

        config.include_ignored = false;
        config.ignored_only = true;
        assert!(config.selects("slow", true));
        assert!(!config.selects("fast", false));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: HarnessConfig = serde_json::from_str(r#"{"test_threads": 2}"#).unwrap();
        assert_eq!(config.test_threads, 2);
        assert_eq!(config.log, LogConfig::default());
        assert!(config.filter.is_none());
    }
}

//! # Environment Variable Loader
//!
//! ## Environment Variables
//! - `TESTX_TEST_THREADS`: worker threads (falls back to `RUST_TEST_THREADS`)
//! - `TESTX_FILTER`: trial name filter
//! - `TESTX_EXACT`: match the filter exactly (true/false)
//! - `TESTX_INCLUDE_IGNORED`: also run ignored trials (true/false)
//! - `TESTX_LOG`: `EnvFilter` directives (falls back to `RUST_LOG`)
//! - `TESTX_LOG_ANSI`: colorized log output (true/false)

use std::env;
use std::str::FromStr;

use crate::ConfigError;
use crate::config::HarnessConfig;

/// Load the harness configuration from process environment variables.
///
/// ```rust,no_run
/// let config = config::load_from_env()?;
/// println!("running with {} threads", config.test_threads);
/// # Ok::<(), config::ConfigError>(())
/// ```
pub fn load_from_env() -> Result<HarnessConfig, ConfigError> {
    load_from_lookup(|key| env::var(key).ok())
}

/// Load the harness configuration from an arbitrary variable source.
pub fn load_from_lookup<F>(lookup: F) -> Result<HarnessConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = HarnessConfig::default();

    if let Some(threads) = first_parsed(&lookup, &["TESTX_TEST_THREADS", "RUST_TEST_THREADS"])? {
        config.test_threads = threads;
    }
    if let Some(filter) = lookup("TESTX_FILTER").filter(|f| !f.is_empty()) {
        config.filter = Some(filter);
    }
    if let Some(exact) = parse_var(&lookup, "TESTX_EXACT")? {
        config.exact = exact;
    }
    if let Some(include_ignored) = parse_var(&lookup, "TESTX_INCLUDE_IGNORED")? {
        config.include_ignored = include_ignored;
    }
    if let Some(filter) = lookup("TESTX_LOG")
        .or_else(|| lookup("RUST_LOG"))
        .filter(|f| !f.is_empty())
    {
        config.log.filter = filter;
    }
    if let Some(ansi) = parse_var(&lookup, "TESTX_LOG_ANSI")? {
        config.log.ansi = ansi;
    }

    config.validated()
}

fn first_parsed<F, T>(lookup: &F, keys: &[&str]) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    for key in keys {
        if let Some(value) = parse_var(lookup, key)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

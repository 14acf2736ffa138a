//! # Harness Configuration
//!
//! Configuration for the fixture-aware test harness.
//!
//! This crate provides:
//! - [`HarnessConfig`] and [`LogConfig`] structures
//! - Environment variable loading ([`load_from_env`])
//! - Command-line overrides on top of the environment ([`merge_overrides`])
//! - Validation through the `validator` crate
//!
//! Precedence is CLI > environment > defaults.

pub mod config;
pub mod loader;
pub mod precedence;

pub use config::{HarnessConfig, LogConfig};
pub use errors::ConfigError;
pub use loader::{load_from_env, load_from_lookup};
pub use precedence::{HarnessOverrides, merge_overrides};

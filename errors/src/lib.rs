//! # Fixture Errors
//!
//! Error types shared by the fixture registry, the harness and the
//! configuration loader.
//!
//! - Uses `thiserror` for structured error definitions
//! - Setup failures are cached behind [`SharedError`] so every requester
//!   observes the same error value
//! - Teardown failures are collected into [`TeardownErrors`] instead of
//!   stopping at the first one

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by the fixture registry and its managers.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture {fixture} has already been registered")]
    AlreadyRegistered { fixture: String },

    #[error("fixture {fixture} has not been registered")]
    NotRegistered { fixture: String },

    #[error("setup failed for fixture {fixture}: {source}")]
    SetupFailed {
        fixture: String,
        #[source]
        source: SharedError,
    },

    #[error("teardown failed for fixture {fixture}: {source:#}")]
    TeardownFailed {
        fixture: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FixtureError {
    /// Name of the fixture type the error refers to.
    pub fn fixture(&self) -> &str {
        match self {
            Self::AlreadyRegistered { fixture }
            | Self::NotRegistered { fixture }
            | Self::SetupFailed { fixture, .. }
            | Self::TeardownFailed { fixture, .. } => fixture,
        }
    }
}

/// A cached setup error.
///
/// Cloning is cheap and every clone points at the same underlying error, so
/// a failed fixture hands out the identical error to every test that asks
/// for it.
#[derive(Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// Returns `true` when both handles refer to the same cached error.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.chain().nth(1)
    }
}

/// Every teardown failure from a single end-of-run drain, in the order the
/// teardowns ran.
#[derive(Debug, Default)]
pub struct TeardownErrors {
    errors: Vec<FixtureError>,
}

impl TeardownErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FixtureError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[FixtureError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing failed, otherwise the aggregate itself.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for TeardownErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        write!(
            f,
            "{count} fixture teardown{} failed",
            if count == 1 { "" } else { "s" }
        )?;
        for error in &self.errors {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownErrors {}

impl IntoIterator for TeardownErrors {
    type Item = FixtureError;
    type IntoIter = std::vec::IntoIter<FixtureError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a TeardownErrors {
    type Item = &'a FixtureError;
    type IntoIter = std::slice::Iter<'a, FixtureError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl FromIterator<FixtureError> for TeardownErrors {
    fn from_iter<I: IntoIterator<Item = FixtureError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("configuration validation failed: {reason}")]
    Validation { reason: String },
}

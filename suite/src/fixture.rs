use std::sync::Arc;

use errors::FixtureError;

use crate::context::TestContext;
use crate::registry::Registry;

/// Shared state for many tests, set up on first use and torn down once at
/// the end of the run.
///
/// Both methods default to no-ops, so a fixture that only carries data can
/// implement the trait with an empty `impl` block.
///
/// ```rust
/// use std::sync::Mutex;
/// use suite::{Fixture, SetupContext};
///
/// #[derive(Default)]
/// struct Users {
///     ids: Mutex<Vec<u32>>,
/// }
///
/// impl Fixture for Users {
///     fn setup(&mut self, _cx: &SetupContext<'_>) -> anyhow::Result<()> {
///         self.ids.get_mut().unwrap().push(1);
///         Ok(())
///     }
///
///     fn teardown(&self) -> anyhow::Result<()> {
///         self.ids.lock().unwrap().clear();
///         Ok(())
///     }
/// }
/// ```
pub trait Fixture: Send + Sync + 'static {
    /// Create the dependencies this fixture provides.
    ///
    /// `cx` gives access to other registered fixtures. It should not be used
    /// for control flow: report problems by returning an error.
    fn setup(&mut self, cx: &SetupContext<'_>) -> anyhow::Result<()> {
        let _ = cx;
        Ok(())
    }

    /// Release whatever `setup` created.
    ///
    /// Runs even when `setup` failed, so it must cope with a partially
    /// initialized fixture. Tests and dependent fixtures may still hold
    /// handles to `self`, hence the shared borrow.
    fn teardown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Handed to [`Fixture::setup`] so one fixture can depend on another.
pub struct SetupContext<'a> {
    registry: &'a Registry,
    test: &'a dyn TestContext,
}

impl<'a> SetupContext<'a> {
    pub(crate) fn new(registry: &'a Registry, test: &'a dyn TestContext) -> Self {
        Self { registry, test }
    }

    /// Resolve another fixture, setting it up if needed. Failures are fatal
    /// for the test that triggered this setup.
    pub fn get<F: Fixture>(&self) -> Arc<F> {
        self.registry.get::<F>(self.test)
    }

    /// Resolve another fixture without aborting, so the error can be
    /// propagated with `?`.
    pub fn try_get<F: Fixture>(&self) -> Result<Arc<F>, FixtureError> {
        self.registry.try_get::<F>(self.test)
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The test whose `get` call triggered this setup.
    pub fn test(&self) -> &'a dyn TestContext {
        self.test
    }
}

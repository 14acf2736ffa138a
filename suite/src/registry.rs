//! Type-keyed table of fixture managers.

use std::collections::HashMap;
use std::sync::Arc;

use errors::{FixtureError, TeardownErrors};
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::context::TestContext;
use crate::fixture::{Fixture, SetupContext};
use crate::key::TypeKey;
use crate::manager::{FixtureManager, ManagedFixture};

#[derive(Default)]
struct Entries {
    managers: HashMap<TypeKey, Arc<dyn ManagedFixture>>,
    // Registration order; teardown walks it backwards.
    order: Vec<TypeKey>,
}

/// Process-wide table of fixtures, one per concrete type.
///
/// Construct it once per test binary, register every fixture before tests
/// start, resolve fixtures from test bodies with [`get`](Self::get), and
/// drain it with [`teardown_all`](Self::teardown_all) (normally via
/// [`crate::run`]) after the last test.
///
/// ```rust
/// use std::sync::LazyLock;
/// use suite::{Fixture, Registry, TestCase};
///
/// #[derive(Default)]
/// struct Config {
///     url: String,
/// }
///
/// impl Fixture for Config {}
///
/// static FIXTURES: LazyLock<Registry> = LazyLock::new(Registry::new);
///
/// FIXTURES.register(Config { url: "postgres://localhost".into() });
/// let config = FIXTURES.get::<Config>(&TestCase::new("doc"));
/// assert_eq!(config.url, "postgres://localhost");
/// assert!(FIXTURES.teardown_all().is_ok());
/// ```
#[derive(Default)]
pub struct Registry {
    entries: RwLock<Entries>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fixture` so it can later be resolved by type.
    ///
    /// Fixtures are torn down in the reverse order they were registered:
    /// register the one that must outlive the others first.
    ///
    /// # Panics
    ///
    /// Registering a second fixture of the same type is a programming error
    /// and panics; the registry keeps the first one.
    pub fn register<F: Fixture>(&self, fixture: F) {
        if let Err(e) = self.try_register(fixture) {
            panic!("{e}");
        }
    }

    /// Like [`register`](Self::register), but reports a duplicate as an
    /// error instead of panicking.
    pub fn try_register<F: Fixture>(&self, fixture: F) -> Result<(), FixtureError> {
        let key = TypeKey::of::<F>();
        let mut entries = self.entries.write();
        if entries.managers.contains_key(&key) {
            return Err(FixtureError::AlreadyRegistered {
                fixture: key.name().to_string(),
            });
        }

        entries
            .managers
            .insert(key, Arc::new(FixtureManager::new(fixture)));
        entries.order.push(key);
        debug!(fixture = %key, position = entries.order.len(), "fixture registered");
        Ok(())
    }

    /// Manager for fixture type `F`, if registered.
    pub fn lookup<F: Fixture>(&self) -> Option<Arc<FixtureManager<F>>> {
        let manager = self
            .entries
            .read()
            .managers
            .get(&TypeKey::of::<F>())
            .cloned()?;
        manager.into_any().downcast::<FixtureManager<F>>().ok()
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.entries.read().managers.contains_key(key)
    }

    /// Registered fixture types, in registration order.
    pub fn registered(&self) -> Vec<TypeKey> {
        self.entries.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().order.is_empty()
    }

    /// Resolve fixture `F`, running its setup on first use.
    ///
    /// An unregistered type or a failed setup is reported through
    /// [`TestContext::fatal`], which stops the calling test. Every later
    /// call for a failed fixture reports the same cached error.
    pub fn get<F: Fixture>(&self, cx: &dyn TestContext) -> Arc<F> {
        match self.try_get::<F>(cx) {
            Ok(fixture) => fixture,
            Err(e) => cx.fatal(&e.to_string()),
        }
    }

    /// Resolve fixture `F` without aborting the test on failure.
    pub fn try_get<F: Fixture>(&self, cx: &dyn TestContext) -> Result<Arc<F>, FixtureError> {
        let key = TypeKey::of::<F>();
        let manager = self
            .lookup::<F>()
            .ok_or_else(|| FixtureError::NotRegistered {
                fixture: key.name().to_string(),
            })?;

        manager
            .setup(&SetupContext::new(self, cx))
            .map_err(|source| FixtureError::SetupFailed {
                fixture: key.name().to_string(),
                source,
            })
    }

    /// Tear down every fixture whose setup ran, last registered first.
    ///
    /// Every teardown is attempted; failures are collected rather than
    /// stopping the drain. Fixtures that were registered but never resolved
    /// are skipped.
    pub fn teardown_all(&self) -> Result<(), TeardownErrors> {
        // Snapshot so no registry lock is held while fixture code runs.
        let managers: Vec<Arc<dyn ManagedFixture>> = {
            let entries = self.entries.read();
            entries
                .order
                .iter()
                .rev()
                .filter_map(|key| entries.managers.get(key).cloned())
                .collect()
        };

        let mut failures = TeardownErrors::new();
        for manager in managers {
            if !manager.setup_ran() {
                debug!(fixture = %manager.key(), "teardown skipped: never set up");
                continue;
            }
            if let Err(source) = manager.teardown() {
                error!(fixture = %manager.key(), error = %format!("{source:#}"), "fixture teardown failed");
                failures.push(FixtureError::TeardownFailed {
                    fixture: manager.key().name().to_string(),
                    source,
                });
            }
        }
        failures.into_result()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("fixtures", &self.registered())
            .finish()
    }
}

//! Exactly-once setup and at-most-once teardown for a single fixture.

use std::any::Any;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::anyhow;
use errors::SharedError;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::fixture::{Fixture, SetupContext};
use crate::key::TypeKey;

/// Observable lifecycle state of a managed fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// Registered, setup not attempted yet.
    Pending,
    /// One caller is running setup; others wait for it.
    SettingUp,
    /// Setup succeeded.
    Ready,
    /// Setup failed; the error is cached and never retried.
    Failed,
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::SettingUp => "setting up",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

enum SetupState<F> {
    Pending(F),
    SettingUp,
    Ready(Arc<F>),
    Failed { fixture: Arc<F>, error: SharedError },
}

impl<F> SetupState<F> {
    fn label(&self) -> FixtureState {
        match self {
            Self::Pending(_) => FixtureState::Pending,
            Self::SettingUp => FixtureState::SettingUp,
            Self::Ready(_) => FixtureState::Ready,
            Self::Failed { .. } => FixtureState::Failed,
        }
    }

    fn fixture(&self) -> Option<&Arc<F>> {
        match self {
            Self::Ready(fixture) | Self::Failed { fixture, .. } => Some(fixture),
            Self::Pending(_) | Self::SettingUp => None,
        }
    }
}

/// Owns one fixture and runs its setup at most once, however many threads
/// ask for it.
///
/// The first caller of [`setup`](Self::setup) moves the state from
/// `Pending` to `SettingUp` under the lock, then runs the fixture's setup
/// with the lock released. Callers arriving meanwhile block on a condition
/// variable until the outcome is stored. Because the lock is never held
/// across the fixture's own code, a setup may resolve other fixtures.
pub struct FixtureManager<F> {
    key: TypeKey,
    state: Mutex<SetupState<F>>,
    settled: Condvar,
    torn_down: AtomicBool,
}

impl<F: Fixture> FixtureManager<F> {
    pub fn new(fixture: F) -> Self {
        Self {
            key: TypeKey::of::<F>(),
            state: Mutex::new(SetupState::Pending(fixture)),
            settled: Condvar::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn state(&self) -> FixtureState {
        self.state.lock().label()
    }

    /// `true` once the single setup attempt has completed, successfully or
    /// not.
    pub fn setup_ran(&self) -> bool {
        matches!(self.state(), FixtureState::Ready | FixtureState::Failed)
    }

    /// Run the fixture's setup if nobody has yet, otherwise wait for and
    /// return the cached outcome.
    ///
    /// A failure hands back the same [`SharedError`] on every call. If the
    /// fixture's setup panics, the panic is cached as a failure, waiting
    /// callers are released, and the panic continues in the calling thread.
    pub fn setup(&self, cx: &SetupContext<'_>) -> Result<Arc<F>, SharedError> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                SetupState::Ready(fixture) => return Ok(Arc::clone(fixture)),
                SetupState::Failed { error, .. } => return Err(error.clone()),
                SetupState::SettingUp => self.settled.wait(&mut state),
                SetupState::Pending(_) => break,
            }
        }

        let SetupState::Pending(fixture) = mem::replace(&mut *state, SetupState::SettingUp) else {
            unreachable!("state was observed as pending under the same lock");
        };
        drop(state);

        self.run_setup(fixture, cx)
    }

    fn run_setup(&self, mut fixture: F, cx: &SetupContext<'_>) -> Result<Arc<F>, SharedError> {
        info!(fixture = %self.key, test = cx.test().name(), "fixture setup started");
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| fixture.setup(cx)));
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let fixture = Arc::new(fixture);

        let (settled, result, payload) = match outcome {
            Ok(Ok(())) => {
                info!(fixture = %self.key, elapsed_ms, "fixture setup finished");
                (
                    SetupState::Ready(Arc::clone(&fixture)),
                    Ok(fixture),
                    None,
                )
            }
            Ok(Err(e)) => {
                let error = SharedError::new(e);
                warn!(fixture = %self.key, elapsed_ms, error = %error, "fixture setup failed");
                (
                    SetupState::Failed {
                        fixture,
                        error: error.clone(),
                    },
                    Err(error),
                    None,
                )
            }
            Err(payload) => {
                let error = SharedError::new(anyhow!("setup panicked: {}", panic_text(&*payload)));
                warn!(fixture = %self.key, elapsed_ms, error = %error, "fixture setup panicked");
                (
                    SetupState::Failed {
                        fixture,
                        error: error.clone(),
                    },
                    Err(error),
                    Some(payload),
                )
            }
        };

        *self.state.lock() = settled;
        self.settled.notify_all();

        if let Some(payload) = payload {
            panic::resume_unwind(payload);
        }
        result
    }

    /// Run the fixture's teardown if its setup ran and teardown has not run
    /// yet. Otherwise a no-op.
    pub fn teardown(&self) -> anyhow::Result<()> {
        let fixture = self.state.lock().fixture().cloned();
        let Some(fixture) = fixture else {
            debug!(fixture = %self.key, "teardown skipped: setup never ran");
            return Ok(());
        };
        if self.torn_down.swap(true, Ordering::AcqRel) {
            debug!(fixture = %self.key, "teardown skipped: already torn down");
            return Ok(());
        }

        info!(fixture = %self.key, "fixture teardown started");
        fixture.teardown()
    }
}

impl<F> fmt::Debug for FixtureManager<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureManager")
            .field("key", &self.key)
            .field("state", &self.state.lock().label())
            .field("torn_down", &self.torn_down.load(Ordering::Acquire))
            .finish()
    }
}

pub(crate) fn panic_text(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Type-erased view of a manager, as stored in the registry.
pub(crate) trait ManagedFixture: Send + Sync {
    fn key(&self) -> TypeKey;

    fn setup_ran(&self) -> bool;

    fn teardown(&self) -> anyhow::Result<()>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<F: Fixture> ManagedFixture for FixtureManager<F> {
    fn key(&self) -> TypeKey {
        self.key
    }

    fn setup_ran(&self) -> bool {
        FixtureManager::setup_ran(self)
    }

    fn teardown(&self) -> anyhow::Result<()> {
        FixtureManager::teardown(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestCase;
    use crate::context::testing::panic_message;
    use crate::registry::Registry;
    use anyhow::bail;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Counting {
        setups: Arc<AtomicUsize>,
        teardowns: Arc<AtomicUsize>,
        fail_with: Option<&'static str>,
        delay: Option<Duration>,
    }

    impl Fixture for Counting {
        fn setup(&mut self, _cx: &SetupContext<'_>) -> anyhow::Result<()> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            if let Some(reason) = self.fail_with {
                bail!(reason);
            }
            Ok(())
        }

        fn teardown(&self) -> anyhow::Result<()> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn with_cx<R>(f: impl FnOnce(&SetupContext<'_>) -> R) -> R {
        let registry = Registry::new();
        let test = TestCase::new("manager_test");
        f(&SetupContext::new(&registry, &test))
    }

    #[test]
    fn test_new_manager_is_pending() {
        let manager = FixtureManager::new(Counting::default());
        assert_eq!(manager.state(), FixtureState::Pending);
        assert!(!manager.setup_ran());
        assert_eq!(manager.key(), TypeKey::of::<Counting>());
    }

    #[test]
    fn test_concurrent_setup_runs_once() {
        let setups = Arc::new(AtomicUsize::new(0));
        let manager = FixtureManager::new(Counting {
            setups: setups.clone(),
            delay: Some(Duration::from_millis(50)),
            ..Counting::default()
        });
        let registry = Registry::new();
        let barrier = Barrier::new(16);

        let fixtures: Vec<Arc<Counting>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let (manager, registry, barrier) = (&manager, &registry, &barrier);
                    scope.spawn(move || {
                        let test = TestCase::new(format!("caller_{i}"));
                        barrier.wait();
                        manager.setup(&SetupContext::new(registry, &test)).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), FixtureState::Ready);
        assert!(fixtures.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_concurrent_failure_shares_one_error() {
        let setups = Arc::new(AtomicUsize::new(0));
        let manager = FixtureManager::new(Counting {
            setups: setups.clone(),
            fail_with: Some("database unreachable"),
            delay: Some(Duration::from_millis(20)),
            ..Counting::default()
        });
        let registry = Registry::new();

        let errors: Vec<SharedError> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let (manager, registry) = (&manager, &registry);
                    scope.spawn(move || {
                        let test = TestCase::current();
                        manager
                            .setup(&SetupContext::new(registry, &test))
                            .unwrap_err()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert!(errors.windows(2).all(|w| w[0].ptr_eq(&w[1])));
        assert_eq!(errors[0].to_string(), "database unreachable");
        assert_eq!(manager.state(), FixtureState::Failed);
    }

    #[test]
    fn test_failed_setup_is_not_retried() {
        let setups = Arc::new(AtomicUsize::new(0));
        let manager = FixtureManager::new(Counting {
            setups: setups.clone(),
            fail_with: Some("nope"),
            ..Counting::default()
        });

        with_cx(|cx| {
            let first = manager.setup(cx).unwrap_err();
            let second = manager.setup(cx).unwrap_err();
            assert!(first.ptr_eq(&second));
        });
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert!(manager.setup_ran());
    }

    #[test]
    fn test_teardown_without_setup_is_noop() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let manager = FixtureManager::new(Counting {
            teardowns: teardowns.clone(),
            ..Counting::default()
        });

        assert!(manager.teardown().is_ok());
        assert_eq!(teardowns.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_teardown_runs_once_after_success() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let manager = FixtureManager::new(Counting {
            teardowns: teardowns.clone(),
            ..Counting::default()
        });
        with_cx(|cx| manager.setup(cx).map(|_| ())).unwrap();

        manager.teardown().unwrap();
        manager.teardown().unwrap();
        manager.teardown().unwrap();
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_teardown_runs_after_failed_setup() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let manager = FixtureManager::new(Counting {
            teardowns: teardowns.clone(),
            fail_with: Some("half built"),
            ..Counting::default()
        });
        assert!(with_cx(|cx| manager.setup(cx)).is_err());

        manager.teardown().unwrap();
        manager.teardown().unwrap();
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct Exploding {
        torn_down: Arc<AtomicBool>,
    }

    impl Fixture for Exploding {
        fn setup(&mut self, _cx: &SetupContext<'_>) -> anyhow::Result<()> {
            panic!("kaboom");
        }

        fn teardown(&self) -> anyhow::Result<()> {
            self.torn_down.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_panicking_setup_is_cached_as_failure() {
        let torn_down = Arc::new(AtomicBool::new(false));
        let manager = FixtureManager::new(Exploding {
            torn_down: torn_down.clone(),
        });

        let message = panic_message(|| {
            let _ = with_cx(|cx| manager.setup(cx));
        });
        assert_eq!(message.as_deref(), Some("kaboom"));
        assert_eq!(manager.state(), FixtureState::Failed);

        let error = with_cx(|cx| manager.setup(cx)).unwrap_err();
        assert_eq!(error.to_string(), "setup panicked: kaboom");

        manager.teardown().unwrap();
        assert!(torn_down.load(Ordering::SeqCst));
    }

    #[test]
    fn test_waiters_released_when_setup_panics() {
        struct SlowPanic {
            started: std::sync::mpsc::Sender<()>,
        }

        impl Fixture for SlowPanic {
            fn setup(&mut self, _cx: &SetupContext<'_>) -> anyhow::Result<()> {
                let _ = self.started.send(());
                thread::sleep(Duration::from_millis(50));
                panic!("slow kaboom");
            }
        }

        let (started, setup_entered) = std::sync::mpsc::channel();
        let manager = FixtureManager::new(SlowPanic { started });
        let registry = Registry::new();

        thread::scope(|scope| {
            let winner = scope.spawn(|| {
                let test = TestCase::new("winner");
                let _ = manager.setup(&SetupContext::new(&registry, &test));
            });
            setup_entered.recv().unwrap();
            assert_eq!(manager.state(), FixtureState::SettingUp);

            let waiter = scope.spawn(|| {
                let test = TestCase::new("waiter");
                manager
                    .setup(&SetupContext::new(&registry, &test))
                    .map(|_| ())
            });

            assert!(winner.join().is_err());
            let error = waiter.join().unwrap().unwrap_err();
            assert_eq!(error.to_string(), "setup panicked: slow kaboom");
        });
    }
}

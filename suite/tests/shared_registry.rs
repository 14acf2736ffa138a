//! Fixtures shared across ordinary `#[test]` functions through a static
//! registry. The default libtest harness runs these in parallel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread;

use suite::{Fixture, FixtureState, Registry, SetupContext, TestCase, prefix};

static DB_SETUPS: AtomicUsize = AtomicUsize::new(0);
static ACCOUNT_SETUPS: AtomicUsize = AtomicUsize::new(0);

struct Database {
    tables: Vec<&'static str>,
}

impl Fixture for Database {
    fn setup(&mut self, _cx: &SetupContext<'_>) -> anyhow::Result<()> {
        DB_SETUPS.fetch_add(1, Ordering::SeqCst);
        self.tables = vec!["users", "products"];
        Ok(())
    }
}

#[derive(Default)]
struct Account {
    id: u64,
    db: Option<Arc<Database>>,
}

impl Fixture for Account {
    fn setup(&mut self, cx: &SetupContext<'_>) -> anyhow::Result<()> {
        ACCOUNT_SETUPS.fetch_add(1, Ordering::SeqCst);
        let db = cx.try_get::<Database>()?;
        anyhow::ensure!(db.tables.contains(&"users"), "users table missing");
        self.id = 42;
        self.db = Some(db);
        Ok(())
    }
}

struct NeverUsed;

impl Fixture for NeverUsed {
    fn setup(&mut self, _cx: &SetupContext<'_>) -> anyhow::Result<()> {
        anyhow::bail!("nothing in this binary should resolve this fixture")
    }
}

#[derive(Debug)]
struct NotRegistered;

impl Fixture for NotRegistered {}

static FIXTURES: LazyLock<Registry> = LazyLock::new(|| {
    let registry = Registry::new();
    registry.register(Database { tables: Vec::new() });
    registry.register(Account::default());
    registry.register(NeverUsed);
    registry
});

#[test]
fn database_is_set_up_once_across_tests() {
    let db = FIXTURES.get::<Database>(&TestCase::current());
    assert_eq!(db.tables, ["users", "products"]);
    assert_eq!(DB_SETUPS.load(Ordering::SeqCst), 1);
}

#[test]
fn account_resolves_its_database() {
    let account = FIXTURES.get::<Account>(&TestCase::current());
    assert_eq!(account.id, 42);

    let db = FIXTURES.get::<Database>(&TestCase::current());
    let held = account.db.as_ref().expect("account keeps its database");
    assert!(Arc::ptr_eq(held, &db));
    assert_eq!(ACCOUNT_SETUPS.load(Ordering::SeqCst), 1);
    assert_eq!(DB_SETUPS.load(Ordering::SeqCst), 1);
}

#[test]
fn many_threads_share_one_account() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let t = prefix(TestCase::new(format!("worker-{i}")), "shared");
                FIXTURES.get::<Account>(&t)
            })
        })
        .collect();

    let accounts: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("worker panicked"))
        .collect();
    for account in &accounts[1..] {
        assert!(Arc::ptr_eq(&accounts[0], account));
    }
    assert_eq!(ACCOUNT_SETUPS.load(Ordering::SeqCst), 1);
}

#[test]
fn unused_fixture_stays_pending() {
    let manager = FIXTURES
        .lookup::<NeverUsed>()
        .expect("fixture is registered");
    assert_eq!(manager.state(), FixtureState::Pending);
}

#[test]
#[should_panic(expected = "has not been registered")]
fn unregistered_fixture_is_fatal() {
    FIXTURES.get::<NotRegistered>(&TestCase::current());
}

#[test]
fn try_get_reports_unregistered_fixture() {
    let err = FIXTURES
        .try_get::<NotRegistered>(&TestCase::current())
        .unwrap_err();
    assert_eq!(err.fixture(), std::any::type_name::<NotRegistered>());
}

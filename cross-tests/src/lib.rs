//! Fixtures shared by the end-to-end suites: an in-memory store and two
//! fixtures seeded from it, each recording its lifecycle in a [`Journal`].

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, bail, ensure};
use parking_lot::Mutex;
use suite::{Fixture, SetupContext};

/// Ordered record of lifecycle events, e.g. `"setup Store"`.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Names of fixtures with the given event, in the order recorded.
    pub fn fixtures_with(&self, event: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix(event))
            .filter_map(|rest| rest.strip_prefix(' '))
            .map(str::to_string)
            .collect()
    }
}

/// Check the journal against the registration order: no fixture set up or
/// torn down twice, and teardown running in reverse registration order over
/// exactly the fixtures that were set up.
pub fn verify_lifecycle(journal: &Journal, registered: &[&str]) -> anyhow::Result<()> {
    let setups = journal.fixtures_with("setup");
    let teardowns = journal.fixtures_with("teardown");

    for name in registered {
        let count = setups.iter().filter(|s| s == name).count();
        ensure!(count <= 1, "{name} was set up {count} times");
    }

    let expected: Vec<String> = registered
        .iter()
        .rev()
        .filter(|name| setups.iter().any(|s| s == *name))
        .map(|name| (*name).to_string())
        .collect();
    ensure!(
        teardowns == expected,
        "teardown order was {teardowns:?}, expected {expected:?}"
    );
    Ok(())
}

/// Key-value tables standing in for a database.
pub struct Store {
    journal: Journal,
    tables: Mutex<HashMap<String, HashMap<u64, String>>>,
    open: Mutex<bool>,
}

impl Store {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            tables: Mutex::new(HashMap::new()),
            open: Mutex::new(false),
        }
    }

    pub fn insert(&self, table: &str, id: u64, value: impl Into<String>) -> anyhow::Result<()> {
        if !*self.open.lock() {
            bail!("store is closed");
        }
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .insert(id, value.into());
        Ok(())
    }

    pub fn find(&self, table: &str, id: u64) -> Option<String> {
        self.tables.lock().get(table)?.get(&id).cloned()
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }
}

impl Fixture for Store {
    fn setup(&mut self, _cx: &SetupContext<'_>) -> anyhow::Result<()> {
        self.journal.record("setup Store");
        *self.open.get_mut() = true;
        Ok(())
    }

    fn teardown(&self) -> anyhow::Result<()> {
        self.journal.record("teardown Store");
        self.tables.lock().clear();
        *self.open.lock() = false;
        Ok(())
    }
}

/// A seeded user row.
pub struct Users {
    journal: Journal,
    pub user_id: u64,
    store: Option<Arc<Store>>,
}

impl Users {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            user_id: 0,
            store: None,
        }
    }
}

impl Fixture for Users {
    fn setup(&mut self, cx: &SetupContext<'_>) -> anyhow::Result<()> {
        self.journal.record("setup Users");
        let store = cx.try_get::<Store>()?;
        store
            .insert("users", 1, "gopher")
            .context("seeding users")?;
        self.user_id = 1;
        self.store = Some(store);
        Ok(())
    }

    fn teardown(&self) -> anyhow::Result<()> {
        self.journal.record("teardown Users");
        let store = self.store.as_ref().context("users fixture has no store")?;
        ensure!(store.is_open(), "store closed before users were removed");
        Ok(())
    }
}

/// A seeded product row owned by the seeded user.
pub struct Products {
    journal: Journal,
    pub product_id: u64,
    pub owner_id: u64,
}

impl Products {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            product_id: 0,
            owner_id: 0,
        }
    }
}

impl Fixture for Products {
    fn setup(&mut self, cx: &SetupContext<'_>) -> anyhow::Result<()> {
        self.journal.record("setup Products");
        let users = cx.try_get::<Users>()?;
        let store = cx.try_get::<Store>()?;
        store
            .insert("products", 7, format!("widget owned by {}", users.user_id))
            .context("seeding products")?;
        self.product_id = 7;
        self.owner_id = users.user_id;
        Ok(())
    }

    fn teardown(&self) -> anyhow::Result<()> {
        self.journal.record("teardown Products");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_lifecycle_accepts_reverse_teardown() {
        let journal = Journal::default();
        for event in [
            "setup Users",
            "setup Store",
            "teardown Users",
            "teardown Store",
        ] {
            journal.record(event);
        }
        assert!(verify_lifecycle(&journal, &["Store", "Users", "Products"]).is_ok());
    }

    #[test]
    fn test_verify_lifecycle_rejects_double_setup() {
        let journal = Journal::default();
        journal.record("setup Store");
        journal.record("setup Store");
        let err = verify_lifecycle(&journal, &["Store"]).unwrap_err();
        assert!(err.to_string().contains("set up 2 times"));
    }

    #[test]
    fn test_verify_lifecycle_rejects_forward_teardown() {
        let journal = Journal::default();
        for event in [
            "setup Store",
            "setup Users",
            "teardown Store",
            "teardown Users",
        ] {
            journal.record(event);
        }
        assert!(verify_lifecycle(&journal, &["Store", "Users"]).is_err());
    }

    #[test]
    fn test_store_rejects_writes_when_closed() {
        let store = Store::new(&Journal::default());
        assert!(store.insert("users", 1, "x").is_err());
        assert_eq!(store.find("users", 1), None);
    }
}

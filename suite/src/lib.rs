//! # Shared Test Fixtures
//!
//! Expensive test dependencies (databases, containers, seeded accounts)
//! shared by many tests without changing how tests are written or run.
//! Tests keep their own entrypoints, so filtering and parallel execution
//! work as usual; a fixture is only set up when some test asks for it.
//!
//! The flow:
//!
//! 1. Register fixtures on a [`Registry`] before any test runs.
//! 2. Resolve a fixture inside a test body with [`Registry::get`]. The first
//!    call for a type runs its setup; concurrent callers wait for it. A
//!    failed setup is fatal for every test that asks for that fixture, and
//!    is never retried.
//! 3. After the last test, [`run`] (or [`Harness::run`]) tears down every
//!    fixture whose setup ran, last registered first. Register the fixture
//!    that must outlive the others first.
//!
//! ```rust,no_run
//! use std::process::ExitCode;
//! use std::sync::{LazyLock, Mutex};
//!
//! use suite::{Fixture, Harness, Registry, SetupContext, Trial};
//!
//! #[derive(Default)]
//! struct Database {
//!     rows: Mutex<Vec<String>>,
//! }
//!
//! impl Fixture for Database {
//!     fn teardown(&self) -> anyhow::Result<()> {
//!         self.rows.lock().unwrap().clear();
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Users {
//!     user_id: u32,
//! }
//!
//! impl Fixture for Users {
//!     fn setup(&mut self, cx: &SetupContext<'_>) -> anyhow::Result<()> {
//!         let db = cx.try_get::<Database>()?;
//!         db.rows.lock().unwrap().push("user 1".into());
//!         self.user_id = 1;
//!         Ok(())
//!     }
//! }
//!
//! static FIXTURES: LazyLock<Registry> = LazyLock::new(Registry::new);
//!
//! fn main() -> ExitCode {
//!     FIXTURES.register(Database::default());
//!     FIXTURES.register(Users::default());
//!
//!     Harness::from_args()
//!         .expect("invalid harness configuration")
//!         .trial(Trial::test("user_exists", |t| {
//!             let users = FIXTURES.get::<Users>(t);
//!             suite::assert::equal(t, users.user_id, 1);
//!         }))
//!         .run(&FIXTURES)
//! }
//! ```

pub mod assert;
pub mod context;
pub mod fixture;
pub mod harness;
pub mod key;
pub mod lifecycle;
pub mod manager;
pub mod registry;

pub use context::{Methods, Prefixed, TestCase, TestContext, WithBacktrace, prefix};
pub use errors::{FixtureError, SharedError, TeardownErrors};
pub use fixture::{Fixture, SetupContext};
pub use harness::{Harness, HarnessArgs, Outcome, Report, Trial};
pub use key::TypeKey;
pub use lifecycle::{PANIC_EXIT_CODE, TEARDOWN_FAILURE_CODE, run};
pub use manager::{FixtureManager, FixtureState};
pub use registry::Registry;

//! End-of-run teardown around a test entrypoint.

use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};

use errors::{FixtureError, TeardownErrors};
use tracing::{error, info};

use crate::registry::Registry;

/// Exit code returned when fixture teardown fails.
pub const TEARDOWN_FAILURE_CODE: i32 = 1;

/// Exit code returned when the test entrypoint itself panics.
pub const PANIC_EXIT_CODE: i32 = 101;

/// Run `tests`, then tear down every fixture that was set up.
///
/// Teardown always runs, even when tests failed or the entrypoint
/// panicked. When any teardown fails, each failure is written to stderr
/// and the returned code is [`TEARDOWN_FAILURE_CODE`] regardless of the
/// tests' own result; otherwise the tests' code is returned unchanged.
///
/// ```rust,no_run
/// use std::sync::LazyLock;
/// use suite::Registry;
///
/// static FIXTURES: LazyLock<Registry> = LazyLock::new(Registry::new);
///
/// fn run_all_tests() -> i32 {
///     0
/// }
///
/// fn main() {
///     std::process::exit(suite::run(&FIXTURES, run_all_tests));
/// }
/// ```
pub fn run<T>(registry: &Registry, tests: T) -> i32
where
    T: FnOnce() -> i32,
{
    let code = panic::catch_unwind(AssertUnwindSafe(tests)).unwrap_or_else(|_| {
        error!("test entrypoint panicked");
        PANIC_EXIT_CODE
    });

    info!(code, fixtures = registry.len(), "tests finished, tearing down fixtures");
    match registry.teardown_all() {
        Ok(()) => code,
        Err(errors) => {
            report_teardown_errors(&errors, &mut io::stderr().lock());
            TEARDOWN_FAILURE_CODE
        }
    }
}

/// Write one line per teardown failure.
pub fn report_teardown_errors(errors: &TeardownErrors, out: &mut dyn Write) {
    for err in errors {
        // A closed stderr leaves nowhere else to report to.
        let _ = match err {
            FixtureError::TeardownFailed { fixture, source } => writeln!(
                out,
                "--- ERROR: Teardown failed for fixture {fixture}: {source:#}"
            ),
            other => writeln!(out, "--- ERROR: {other}"),
        };
    }
}

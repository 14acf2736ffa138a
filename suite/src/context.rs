//! Test contexts: the collaborator fixtures and assertions report through.
//!
//! [`TestCase`] is the default and aborts the current test by panicking,
//! which both libtest and the bundled harness treat as a failure of that
//! test alone. [`Prefixed`] and [`WithBacktrace`] decorate any context and
//! compose freely.

use std::backtrace::Backtrace;
use std::thread;

/// Reporting surface of a running test.
pub trait TestContext {
    fn name(&self) -> &str;

    fn log(&self, message: &str);

    /// Report a failure and stop the current test. Never returns.
    fn fatal(&self, message: &str) -> !;
}

impl<C: TestContext + ?Sized> TestContext for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn log(&self, message: &str) {
        (**self).log(message);
    }

    fn fatal(&self, message: &str) -> ! {
        (**self).fatal(message)
    }
}

impl<C: TestContext + ?Sized> TestContext for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn log(&self, message: &str) {
        (**self).log(message);
    }

    fn fatal(&self, message: &str) -> ! {
        (**self).fatal(message)
    }
}

/// Default context for a single test.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Context named after the current thread. libtest and the bundled
    /// harness both name the thread running a test after the test.
    pub fn current() -> Self {
        let name = thread::current()
            .name()
            .unwrap_or("<unnamed>")
            .to_string();
        Self { name }
    }
}

impl TestContext for TestCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(&self, message: &str) {
        tracing::info!(test = %self.name, "{message}");
        println!("{message}");
    }

    fn fatal(&self, message: &str) -> ! {
        tracing::debug!(test = %self.name, "fatal: {message}");
        panic!("{message}")
    }
}

/// Selects which reporting methods a decorator applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Methods {
    pub log: bool,
    pub fatal: bool,
}

impl Methods {
    pub const ALL: Self = Self {
        log: true,
        fatal: true,
    };
    pub const FATAL_ONLY: Self = Self {
        log: false,
        fatal: true,
    };
    pub const LOG_ONLY: Self = Self {
        log: true,
        fatal: false,
    };
}

impl Default for Methods {
    fn default() -> Self {
        Self::ALL
    }
}

/// Prefixes every message with the output of a closure, evaluated at
/// report time.
pub struct Prefixed<C> {
    inner: C,
    prefix: Box<dyn Fn() -> String + Send + Sync>,
    methods: Methods,
}

impl<C: TestContext> Prefixed<C> {
    pub fn with<P>(inner: C, prefix: P) -> Self
    where
        P: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            inner,
            prefix: Box::new(prefix),
            methods: Methods::ALL,
        }
    }

    pub fn methods(mut self, methods: Methods) -> Self {
        self.methods = methods;
        self
    }

    fn decorate(&self, message: &str) -> String {
        format!("{} {message}", (self.prefix)())
    }
}

/// Prefix every message reported through `inner` with a fixed string.
pub fn prefix<C: TestContext>(inner: C, prefix: impl Into<String>) -> Prefixed<C> {
    let prefix = prefix.into();
    Prefixed::with(inner, move || prefix.clone())
}

impl<C: TestContext> TestContext for Prefixed<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn log(&self, message: &str) {
        if self.methods.log {
            self.inner.log(&self.decorate(message));
        } else {
            self.inner.log(message);
        }
    }

    fn fatal(&self, message: &str) -> ! {
        if self.methods.fatal {
            self.inner.fatal(&self.decorate(message))
        } else {
            self.inner.fatal(message)
        }
    }
}

/// Appends the stack of the reporting thread to every message.
pub struct WithBacktrace<C> {
    inner: C,
    skip_lines: usize,
    methods: Methods,
}

impl<C: TestContext> WithBacktrace<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            skip_lines: 0,
            methods: Methods::FATAL_ONLY,
        }
    }

    /// Drop the first `lines` lines of the rendered backtrace, typically
    /// the frames inside the reporting machinery.
    pub fn skip_lines(mut self, lines: usize) -> Self {
        self.skip_lines = lines;
        self
    }

    pub fn methods(mut self, methods: Methods) -> Self {
        self.methods = methods;
        self
    }

    fn decorate(&self, message: &str) -> String {
        let rendered = Backtrace::force_capture().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        let skip = self.skip_lines.min(lines.len().saturating_sub(1));
        format!("{message}\nstack: {}", lines[skip..].join("\n"))
    }
}

impl<C: TestContext> TestContext for WithBacktrace<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn log(&self, message: &str) {
        if self.methods.log {
            self.inner.log(&self.decorate(message));
        } else {
            self.inner.log(message);
        }
    }

    fn fatal(&self, message: &str) -> ! {
        if self.methods.fatal {
            self.inner.fatal(&self.decorate(message))
        } else {
            self.inner.fatal(message)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::TestContext;
    use parking_lot::Mutex;

    /// Records everything reported; `fatal` panics with the message.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) logs: Mutex<Vec<String>>,
        pub(crate) fatals: Mutex<Vec<String>>,
    }

    impl TestContext for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn log(&self, message: &str) {
            self.logs.lock().push(message.to_string());
        }

        fn fatal(&self, message: &str) -> ! {
            self.fatals.lock().push(message.to_string());
            panic!("{message}")
        }
    }

    /// Runs `f`, which is expected to abort, and returns its panic message.
    pub(crate) fn panic_message(f: impl FnOnce()) -> Option<String> {
        let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).err()?;
        payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_string()))
    }
}

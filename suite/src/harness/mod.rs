//! A small test runner for `harness = false` targets.
//!
//! libtest has no hook that runs after the last test, so binaries that
//! share fixtures drive their tests through [`Harness`], which hands the
//! run to [`crate::run`] for teardown. Each trial runs on its own thread
//! named after the trial, so [`TestCase::current`] works inside it and a
//! panicking trial fails alone.

mod args;

use std::collections::VecDeque;
use std::fmt;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use config::{ConfigError, HarnessConfig};
use parking_lot::Mutex;
use tracing::{debug, warn};

pub use args::HarnessArgs;

use crate::context::TestCase;
use crate::lifecycle;
use crate::manager::panic_text;
use crate::registry::Registry;

type TrialBody = Box<dyn FnOnce(&TestCase) + Send + 'static>;

/// A named test body.
pub struct Trial {
    name: String,
    ignored: bool,
    body: TrialBody,
}

impl Trial {
    pub fn test<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&TestCase) + Send + 'static,
    {
        Self {
            name: name.into(),
            ignored: false,
            body: Box::new(body),
        }
    }

    /// Skip this trial unless ignored trials were requested.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }
}

impl fmt::Debug for Trial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trial")
            .field("name", &self.name)
            .field("ignored", &self.ignored)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed { message: String },
    Ignored,
}

/// Results of executing the selected trials.
#[derive(Debug, Default)]
pub struct Report {
    pub passed: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub ignored: Vec<String>,
    pub filtered_out: usize,
    pub elapsed: Duration,
}

impl Report {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success())
    }

    fn record(&mut self, name: String, outcome: Outcome) {
        match outcome {
            Outcome::Passed => self.passed.push(name),
            Outcome::Failed { message } => self.failed.push((name, message)),
            Outcome::Ignored => self.ignored.push(name),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.failed.is_empty() {
            writeln!(f, "\nfailures:")?;
            for (name, message) in &self.failed {
                writeln!(f, "\n---- {name} ----\n{message}")?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "test result: {}. {} passed; {} failed; {} ignored; {} filtered out; finished in {:.2}s",
            if self.success() { "ok" } else { "FAILED" },
            self.passed.len(),
            self.failed.len(),
            self.ignored.len(),
            self.filtered_out,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Runs trials in parallel and tears fixtures down afterwards.
///
/// ```rust,no_run
/// use std::process::ExitCode;
/// use std::sync::LazyLock;
/// use suite::{Fixture, Harness, Registry, Trial};
///
/// #[derive(Default)]
/// struct Db;
/// impl Fixture for Db {}
///
/// static FIXTURES: LazyLock<Registry> = LazyLock::new(Registry::new);
///
/// fn main() -> ExitCode {
///     FIXTURES.register(Db);
///
///     Harness::from_args()
///         .expect("invalid harness configuration")
///         .trial(Trial::test("db_is_shared", |t| {
///             let _db = FIXTURES.get::<Db>(t);
///         }))
///         .run(&FIXTURES)
/// }
/// ```
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    trials: Vec<Trial>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            trials: Vec::new(),
        }
    }

    /// Configuration from the environment overridden by command-line
    /// arguments. Invalid arguments print usage and exit, as with any CLI.
    pub fn from_args() -> Result<Self, ConfigError> {
        use clap::Parser;

        Self::from_parts(config::load_from_env()?, HarnessArgs::parse())
    }

    pub fn from_parts(base: HarnessConfig, args: HarnessArgs) -> Result<Self, ConfigError> {
        let config = config::merge_overrides(base, args.overrides(), "cli")?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn trial(mut self, trial: Trial) -> Self {
        self.trials.push(trial);
        self
    }

    pub fn with_trials(mut self, trials: impl IntoIterator<Item = Trial>) -> Self {
        self.trials.extend(trials);
        self
    }

    /// Names of the trials the current configuration selects.
    pub fn selected(&self) -> Vec<&str> {
        self.trials
            .iter()
            .filter(|t| self.config.selects(&t.name, t.ignored))
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Install tracing, run (or list) the trials, then tear down the
    /// registry's fixtures.
    pub fn run(self, registry: &Registry) -> ExitCode {
        if let Err(e) = observability::init_tracing(&self.config.log) {
            eprintln!("warning: {e}");
        }

        if self.config.list {
            let selected = self.selected();
            for name in &selected {
                println!("{name}: test");
            }
            println!("\n{} tests, 0 benchmarks", selected.len());
            return ExitCode::SUCCESS;
        }

        let code = lifecycle::run(registry, move || {
            let report = self.execute();
            println!("\n{report}\n");
            report.exit_code()
        });
        ExitCode::from(u8::try_from(code).unwrap_or(1))
    }

    /// Run the selected trials without touching any registry.
    pub fn execute(self) -> Report {
        let started = Instant::now();
        let mut report = Report::default();

        let mut queue = VecDeque::new();
        for trial in self.trials {
            if self.config.selects(&trial.name, trial.ignored) {
                queue.push_back(trial);
            } else if trial.ignored
                && !self.config.ignored_only
                && self.config.matches_filter(&trial.name)
            {
                println!("test {} ... ignored", trial.name);
                report.record(trial.name, Outcome::Ignored);
            } else {
                report.filtered_out += 1;
            }
        }

        let workers = self.config.test_threads.clamp(1, queue.len().max(1));
        println!("\nrunning {} tests", queue.len());
        debug!(trials = queue.len(), workers, "executing trials");

        let queue = Mutex::new(queue);
        let report = Mutex::new(report);
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        // Release the queue before running the trial.
                        let next = queue.lock().pop_front();
                        let Some(trial) = next else { break };
                        let name = trial.name.clone();
                        let outcome = run_trial(trial);
                        match &outcome {
                            Outcome::Passed => println!("test {name} ... ok"),
                            Outcome::Failed { .. } => println!("test {name} ... FAILED"),
                            Outcome::Ignored => println!("test {name} ... ignored"),
                        }
                        report.lock().record(name, outcome);
                    }
                });
            }
        });

        let mut report = report.into_inner();
        report.elapsed = started.elapsed();
        report
    }
}

fn run_trial(trial: Trial) -> Outcome {
    let Trial { name, body, .. } = trial;
    let case = TestCase::new(name.clone());

    let spawned = thread::Builder::new()
        .name(name.clone())
        .spawn(move || body(&case));
    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            warn!(trial = %name, error = %e, "failed to spawn trial thread");
            return Outcome::Failed {
                message: format!("failed to spawn test thread: {e}"),
            };
        }
    };

    match handle.join() {
        Ok(()) => Outcome::Passed,
        Err(payload) => Outcome::Failed {
            message: panic_text(&*payload).to_string(),
        },
    }
}

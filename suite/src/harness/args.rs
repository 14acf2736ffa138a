use clap::Parser;
use config::HarnessOverrides;

/// Command-line arguments accepted by `harness = false` test binaries.
///
/// Mirrors the subset of libtest flags that make sense here, so
/// `cargo test --test <name> -- <filter> --exact` behaves as usual.
#[derive(Debug, Clone, Default, Parser)]
#[command(about = "Run tests that share lazily set up fixtures")]
pub struct HarnessArgs {
    /// Run only tests whose name contains this string
    pub filter: Option<String>,

    /// Match the filter against the full test name
    #[arg(long)]
    pub exact: bool,

    /// List tests instead of running them
    #[arg(long)]
    pub list: bool,

    /// Run ignored tests too
    #[arg(long)]
    pub include_ignored: bool,

    /// Run only ignored tests
    #[arg(long)]
    pub ignored: bool,

    /// Number of tests to run concurrently
    #[arg(long, value_name = "N")]
    pub test_threads: Option<usize>,

    /// Accepted for libtest compatibility; output is never captured
    #[arg(long, hide = true)]
    pub nocapture: bool,

    /// Accepted for libtest compatibility
    #[arg(long, hide = true)]
    pub show_output: bool,

    /// Accepted for libtest compatibility
    #[arg(short, long, hide = true)]
    pub quiet: bool,
}

impl HarnessArgs {
    pub fn overrides(&self) -> HarnessOverrides {
        HarnessOverrides {
            test_threads: self.test_threads,
            filter: self.filter.clone(),
            exact: self.exact,
            list: self.list,
            include_ignored: self.include_ignored,
            ignored_only: self.ignored,
        }
    }
}

//! # Configuration Precedence
//!
//! Applies command-line overrides on top of a configuration loaded from the
//! environment (or defaults).
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)

use tracing::debug;

use crate::ConfigError;
use crate::config::HarnessConfig;

/// Values supplied explicitly on the command line. `None`/`false` means
/// "not given" and leaves the base value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessOverrides {
    pub test_threads: Option<usize>,
    pub filter: Option<String>,
    pub exact: bool,
    pub list: bool,
    pub include_ignored: bool,
    pub ignored_only: bool,
}

/// Merge `overrides` into `base`, logging every field that changed.
pub fn merge_overrides(
    mut base: HarnessConfig,
    overrides: HarnessOverrides,
    source_name: &str,
) -> Result<HarnessConfig, ConfigError> {
    let mut changes = Vec::new();

    if let Some(threads) = overrides.test_threads {
        if threads != base.test_threads {
            changes.push(format!("test_threads: {} -> {threads}", base.test_threads));
            base.test_threads = threads;
        }
    }
    if let Some(filter) = overrides.filter {
        if base.filter.as_deref() != Some(filter.as_str()) {
            changes.push(format!("filter: {:?} -> {filter:?}", base.filter));
            base.filter = Some(filter);
        }
    }
    merge_flag(&mut base.exact, overrides.exact, "exact", &mut changes);
    merge_flag(&mut base.list, overrides.list, "list", &mut changes);
    merge_flag(
        &mut base.include_ignored,
        overrides.include_ignored,
        "include_ignored",
        &mut changes,
    );
    merge_flag(
        &mut base.ignored_only,
        overrides.ignored_only,
        "ignored_only",
        &mut changes,
    );

    for change in &changes {
        debug!(source = source_name, "{change}");
    }

    base.validated()
}

fn merge_flag(target: &mut bool, value: bool, name: &str, changes: &mut Vec<String>) {
    if value && !*target {
        changes.push(format!("{name}: false -> true"));
        *target = true;
    }
}

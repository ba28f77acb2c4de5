//! Validate command - parse a rule file and print its listing.

use std::path::Path;

use anyhow::Context;
use tlsm_policy::RuleStore;

use crate::theme::Theme;

/// Parse `path` and print one listing line per rule.
pub(crate) fn run_validate(path: &Path) -> anyhow::Result<()> {
    let lines = listing(path)?;
    for line in &lines {
        println!("{line}");
    }
    println!(
        "{}",
        Theme::success(&format!("{}: {} rules", path.display(), lines.len()))
    );
    Ok(())
}

fn listing(path: &Path) -> anyhow::Result<Vec<String>> {
    let policies = tlsm_policy::load_policy_file(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let store = RuleStore::with_capacity(policies.len().max(1));
    store.apply(policies)?;
    Ok(store.list())
}

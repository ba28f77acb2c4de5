//! Test fixtures for common types.

use std::path::PathBuf;

use tlsm_core::{AccessRequest, Operation};
use tlsm_policy::{Policy, RuleStore};

/// A small policy file covering every rule shape.
pub const SAMPLE_POLICIES: &str = "\
# sample policies
@/bin/cat
=deny open secret
=ask open /etc/shadow

@/bin/nc
=deny connect any

@/usr/bin/python3
=deny bind 127.0.0.1:2000
=allow signal

@/opt/app/server
=analyze
";

/// Number of rules in [`SAMPLE_POLICIES`].
pub const SAMPLE_POLICY_COUNT: usize = 6;

/// Create a request as the interception boundary supplies it.
#[must_use]
pub fn test_request(operation: Operation, object: impl Into<String>) -> AccessRequest {
    AccessRequest::new(operation, object)
}

/// Parse a rule, panicking on malformed text.
///
/// # Panics
///
/// Panics if `text` is not a valid rule.
#[must_use]
pub fn test_policy(text: &str) -> Policy {
    match Policy::parse(text) {
        Ok(policy) => policy,
        Err(e) => panic!("invalid test rule {text:?}: {e}"),
    }
}

/// Build a rule store holding `rules` in order.
///
/// # Panics
///
/// Panics if any rule is malformed.
#[must_use]
pub fn test_store(rules: &[&str]) -> RuleStore {
    let store = RuleStore::new();
    for text in rules {
        if let Err(e) = store.append(test_policy(text)) {
            panic!("cannot append {text:?}: {e}");
        }
    }
    store
}

/// Write `content` to a `policies.conf` in a fresh temporary directory.
///
/// The directory lives as long as the returned guard.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[must_use]
pub fn write_policy_file(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => panic!("cannot create temp dir: {e}"),
    };
    let path = dir.path().join("policies.conf");
    if let Err(e) = std::fs::write(&path, content) {
        panic!("cannot write {}: {e}", path.display());
    }
    (dir, path)
}

//! `policies.conf` loader.
//!
//! The file groups rules by program:
//!
//! ```text
//! # rules for cat
//! @/bin/cat
//! =deny open /home/user/secret.txt
//! =ask open /etc/shadow
//!
//! @/usr/bin/python3
//! =deny bind any
//! ```
//!
//! `@<program>` sets the subject for the `=<rule>` lines that follow.
//! Loading is all or nothing: one bad line rejects the whole file.

use std::path::Path;

use crate::error::{PolicyError, PolicyResult};
use crate::policy::Policy;

/// Parse the contents of a policy file.
///
/// # Errors
///
/// Returns [`PolicyError::Conf`] naming the first bad line.
pub fn parse_policy_file(content: &str) -> PolicyResult<Vec<Policy>> {
    let mut program: Option<&str> = None;
    let mut policies = Vec::new();

    for (i, raw) in content.lines().enumerate() {
        let line_no = i.saturating_add(1);
        let line = raw.trim();
        let conf_err = |reason: String| PolicyError::Conf {
            line: line_no,
            reason,
        };

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('@') {
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(conf_err(format!("invalid program name '{name}'")));
            }
            program = Some(name);
        } else if let Some(rule) = line.strip_prefix('=') {
            let subject =
                program.ok_or_else(|| conf_err("rule before any '@program' line".to_owned()))?;
            let policy = Policy::parse(&format!("{subject} {rule}"))
                .map_err(|e| conf_err(e.to_string()))?;
            policies.push(policy);
        } else {
            return Err(conf_err(format!(
                "expected '@program' or '=rule', got '{line}'"
            )));
        }
    }

    Ok(policies)
}

/// Read and parse a policy file.
///
/// # Errors
///
/// Returns [`PolicyError::Io`] if the file cannot be read, or
/// [`PolicyError::Conf`] naming the first bad line.
pub fn load_policy_file(path: &Path) -> PolicyResult<Vec<Policy>> {
    let content = std::fs::read_to_string(path).map_err(|e| PolicyError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let policies = parse_policy_file(&content)?;
    tracing::debug!(path = %path.display(), count = policies.len(), "policy file parsed");
    Ok(policies)
}
